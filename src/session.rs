//! Who is using the map.
//!
//! The engine receives the current user through [`SessionContext`] instead of
//! reading a global, so tests and hosts can swap the session in and out.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: String,
    pub is_admin: bool,
}

pub trait SessionContext: Send + Sync {
    fn current_user(&self) -> Option<AuthenticatedUser>;

    /// Whether the current user may create, edit and delete hotspots.
    fn can_administer(&self) -> bool {
        self.current_user().is_some_and(|u| u.is_admin)
    }
}

/// No one signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousSession;

impl SessionContext for AnonymousSession {
    fn current_user(&self) -> Option<AuthenticatedUser> {
        None
    }
}

/// A fixed user, for hosts that authenticate once up front.
#[derive(Debug, Clone)]
pub struct StaticSession {
    user: AuthenticatedUser,
}

impl StaticSession {
    pub fn new(user: AuthenticatedUser) -> Self {
        Self { user }
    }
}

impl SessionContext for StaticSession {
    fn current_user(&self) -> Option<AuthenticatedUser> {
        Some(self.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_cannot_administer() {
        assert!(AnonymousSession.current_user().is_none());
        assert!(!AnonymousSession.can_administer());
    }

    #[test]
    fn test_static_session_admin_flag() {
        let admin = StaticSession::new(AuthenticatedUser {
            id: "1".into(),
            name: "Ana".into(),
            is_admin: true,
        });
        assert!(admin.can_administer());

        let viewer = StaticSession::new(AuthenticatedUser {
            id: "2".into(),
            name: "Rui".into(),
            is_admin: false,
        });
        assert!(!viewer.can_administer());
        assert_eq!(viewer.current_user().unwrap().name, "Rui");
    }
}
