//! Hotspot persistence collaborator.
//!
//! The engine only needs the raw records; how they are stored is up to the
//! [`HotspotStore`] implementation. [`MemoryStore`] keeps them in process, and
//! the `http` feature adds a client for a hosted row store.

use log::debug;
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use thiserror::Error;

use crate::normalize::parse_maps_url;
use crate::{GeoPoint, LatLng};

/// Outcome of a failed store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Worth trying again later (rate limit, server hiccup, network).
    #[error("store temporarily unavailable: {0}")]
    Retryable(String),
    #[error("store request failed: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Retryable(_))
    }
}

/// Fields an administrator fills in to create or edit a hotspot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HotspotDraft {
    pub name: String,
    pub client: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub password_2g: Option<String>,
    pub password_5g: Option<String>,
}

impl HotspotDraft {
    /// Prefill a draft from an existing point, for editing.
    pub fn from_point(point: &GeoPoint) -> Self {
        Self {
            name: point.payload.name.clone(),
            client: point.payload.client.clone(),
            lat: point.lat,
            lng: point.lng,
            password_2g: point.payload.password_2g.clone(),
            password_5g: point.payload.password_5g.clone(),
        }
    }

    /// Take the coordinates from a shared map link. Returns `None` if the link
    /// carries no usable coordinate.
    pub fn with_map_link(mut self, url: &str) -> Option<Self> {
        let LatLng { lat, lng } = parse_maps_url(url)?;
        self.lat = lat;
        self.lng = lng;
        Some(self)
    }

    pub fn coords(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Record body as the row store expects it. Coordinates are stored as text.
    pub fn to_record(&self) -> Value {
        json!({
            "NOME-WIFI": self.name,
            "NOME-CLIENTE": self.client,
            "SENHA-WIFI-2G": self.password_2g,
            "SENHA-WIFI-5G": self.password_5g,
            "LATITUDE": self.lat.to_string(),
            "LONGITUDE": self.lng.to_string(),
        })
    }

    /// Reject drafts that would normalize away.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Fatal("hotspot name is required".into()));
        }
        if !self.coords().is_valid() {
            return Err(StoreError::Fatal(format!(
                "invalid coordinates ({}, {})",
                self.lat, self.lng
            )));
        }
        Ok(())
    }
}

/// List, create, update and delete raw hotspot records.
pub trait HotspotStore {
    fn list(&self) -> Result<Vec<Value>, StoreError>;

    /// Returns the stored record, including its new primary key.
    fn create(&self, draft: &HotspotDraft) -> Result<Value, StoreError>;

    fn update(&self, key: &str, draft: &HotspotDraft) -> Result<Value, StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store; keys are assigned sequentially.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<Vec<Value>>,
    next_key: RefCell<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records. Numeric `Id`s advance the key
    /// counter so new records never collide with them.
    pub fn with_records(records: Vec<Value>) -> Self {
        let max_key = records
            .iter()
            .filter_map(|r| r.get(PRIMARY_KEY).and_then(Value::as_u64))
            .max()
            .unwrap_or(0);
        Self {
            records: RefCell::new(records),
            next_key: RefCell::new(max_key),
        }
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.records.borrow().iter().position(|r| key_of(r).as_deref() == Some(key))
    }
}

const PRIMARY_KEY: &str = "Id";

fn key_of(record: &Value) -> Option<String> {
    match record.get(PRIMARY_KEY)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl HotspotStore for MemoryStore {
    fn list(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self.records.borrow().clone())
    }

    fn create(&self, draft: &HotspotDraft) -> Result<Value, StoreError> {
        draft.validate()?;
        let key = {
            let mut next = self.next_key.borrow_mut();
            *next += 1;
            *next
        };

        let mut record = draft.to_record();
        if let Value::Object(fields) = &mut record {
            fields.insert(PRIMARY_KEY.into(), json!(key));
        }
        self.records.borrow_mut().push(record.clone());
        debug!("[MemoryStore] Created hotspot {}", key);
        Ok(record)
    }

    fn update(&self, key: &str, draft: &HotspotDraft) -> Result<Value, StoreError> {
        draft.validate()?;
        let index = self
            .position(key)
            .ok_or_else(|| StoreError::Fatal(format!("no hotspot with key {key}")))?;

        let mut records = self.records.borrow_mut();
        let mut merged: Map<String, Value> = match &records[index] {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        if let Value::Object(patch) = draft.to_record() {
            merged.extend(patch);
        }
        records[index] = Value::Object(merged);
        Ok(records[index].clone())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let index = self
            .position(key)
            .ok_or_else(|| StoreError::Fatal(format!("no hotspot with key {key}")))?;
        self.records.borrow_mut().remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn draft(name: &str, lat: f64, lng: f64) -> HotspotDraft {
        HotspotDraft {
            name: name.into(),
            lat,
            lng,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_assigns_keys_and_normalizes() {
        let store = MemoryStore::new();
        let a = store.create(&draft("Lobby", -20.3, -40.3)).unwrap();
        let b = store.create(&draft("Bar", -20.4, -40.4)).unwrap();
        assert_eq!(a["Id"], json!(1));
        assert_eq!(b["Id"], json!(2));
        assert_eq!(a["LATITUDE"], json!("-20.3"));

        let points = normalize(&store.list().unwrap());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].payload.name, "Lobby");
        assert_eq!(points[1].id.as_str(), "2");
    }

    #[test]
    fn test_seeded_keys_do_not_collide() {
        let store = MemoryStore::with_records(vec![json!({ "Id": 41, "LATITUDE": 1.0, "LONGITUDE": 1.0 })]);
        let created = store.create(&draft("New", 2.0, 2.0)).unwrap();
        assert_eq!(created["Id"], json!(42));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_update_merges_fields() {
        let store = MemoryStore::with_records(vec![json!({ "Id": 1, "NOME-WIFI": "Old", "EXTRA": true, "LATITUDE": 1.0, "LONGITUDE": 1.0 })]);
        let updated = store.update("1", &draft("New", 2.0, 3.0)).unwrap();
        assert_eq!(updated["NOME-WIFI"], json!("New"));
        assert_eq!(updated["EXTRA"], json!(true));
        assert_eq!(updated["LONGITUDE"], json!("3"));
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let store = MemoryStore::new();
        let err = store.delete("9").unwrap_err();
        assert!(!err.is_retryable());
        assert!(store.update("9", &draft("x", 1.0, 1.0)).is_err());
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        store.create(&draft("A", 1.0, 1.0)).unwrap();
        store.delete("1").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_invalid_draft_rejected() {
        let store = MemoryStore::new();
        assert!(store.create(&draft("", 1.0, 1.0)).is_err());
        assert!(store.create(&draft("A", 91.0, 1.0)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_draft_from_map_link() {
        let d = draft("A", 0.0, 0.0)
            .with_map_link("https://www.google.com/maps/@-20.3155,-40.3128,17z")
            .unwrap();
        assert_eq!(d.coords(), LatLng::new(-20.3155, -40.3128));
        assert!(draft("A", 0.0, 0.0).with_map_link("https://example.com").is_none());
    }

    #[test]
    fn test_draft_from_point_roundtrips_payload() {
        let points = normalize(&[json!({ "Id": 3, "NOME-WIFI": "Cafe", "SENHA-WIFI-5G": "pw", "LATITUDE": 1.5, "LONGITUDE": 2.5 })]);
        let d = HotspotDraft::from_point(&points[0]);
        assert_eq!(d.name, "Cafe");
        assert_eq!(d.password_5g.as_deref(), Some("pw"));
        assert_eq!(d.coords(), LatLng::new(1.5, 2.5));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            StoreError::Retryable("429".into()).to_string(),
            "store temporarily unavailable: 429"
        );
    }
}
