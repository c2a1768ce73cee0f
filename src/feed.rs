//! Live position feed.
//!
//! A thin layer over a `tokio::sync::watch` channel. Only the newest sample is
//! kept: a subscriber that falls behind skips straight to the latest position
//! instead of replaying the backlog. Dropping the [`PositionFeed`] closes every
//! subscription.

use log::debug;
use tokio::sync::{mpsc, watch};

use crate::config::PositionOptions;
use crate::engine::LocatorEvent;
use crate::error::PositionError;
use crate::PositionSample;

/// Latest state of the position source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionUpdate {
    /// No fix yet.
    Pending,
    Sample(PositionSample),
    Unavailable(PositionError),
}

#[derive(Debug)]
pub struct PositionFeed {
    tx: watch::Sender<PositionUpdate>,
    options: PositionOptions,
}

impl PositionFeed {
    pub fn new(options: PositionOptions) -> Self {
        let (tx, _) = watch::channel(PositionUpdate::Pending);
        Self { tx, options }
    }

    /// Options the platform geolocation source should be started with.
    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    /// Publish a fix. Samples older than the current one are dropped; returns
    /// whether the sample was kept.
    pub fn publish(&self, sample: PositionSample) -> bool {
        self.tx.send_if_modified(|current| {
            if let PositionUpdate::Sample(prev) = current {
                if sample.timestamp_ms < prev.timestamp_ms {
                    debug!(
                        "[PositionFeed] Dropping out-of-order sample ({} < {})",
                        sample.timestamp_ms, prev.timestamp_ms
                    );
                    return false;
                }
            }
            *current = PositionUpdate::Sample(sample);
            true
        })
    }

    /// Report that no position is available.
    pub fn fail(&self, error: PositionError) {
        debug!("[PositionFeed] {}", error);
        self.tx.send_replace(PositionUpdate::Unavailable(error));
    }

    pub fn latest(&self) -> PositionUpdate {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> PositionSubscription {
        PositionSubscription { rx: self.tx.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of a [`PositionFeed`].
#[derive(Debug)]
pub struct PositionSubscription {
    rx: watch::Receiver<PositionUpdate>,
}

impl PositionSubscription {
    /// Wait for the next change. Returns `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<PositionUpdate> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    pub fn latest(&self) -> PositionUpdate {
        *self.rx.borrow()
    }

    /// Stop listening.
    pub fn unsubscribe(self) {}
}

/// Pump position changes into an engine event queue until either side closes.
///
/// When the feed itself goes away a final
/// [`LocatorEvent::PositionUnsubscribed`] is sent.
pub async fn forward_positions(
    mut subscription: PositionSubscription,
    events: mpsc::UnboundedSender<LocatorEvent>,
) {
    while let Some(update) = subscription.next().await {
        let event = match update {
            PositionUpdate::Pending => continue,
            PositionUpdate::Sample(sample) => LocatorEvent::PositionUpdated(sample),
            PositionUpdate::Unavailable(err) => LocatorEvent::PositionFailed(err),
        };
        if events.send(event).is_err() {
            debug!("[PositionFeed] Event queue closed, stopping");
            return;
        }
    }
    let _ = events.send(LocatorEvent::PositionUnsubscribed);
}
