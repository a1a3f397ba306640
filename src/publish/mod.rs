//! Change publication: recompute read views and emit only the ones whose
//! serialized payload differs from what this publisher last sent.

/// Canonical read views.
pub mod views;

use hashbrown::HashMap;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{error::CoreResult, store::Store, txn};

pub use views::{CourtsView, Entry, PeopleView, View, WaitersView, default_views};

/// One `(topic, payload)` pair written to the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// Logical topic.
    pub topic: String,
    /// Serialized view.
    pub payload: String,
}

/// Destination for publications.
pub trait NotificationSink {
    /// Writes one publication.
    fn publish(&mut self, publication: Publication) -> CoreResult<()>;
}

impl NotificationSink for Vec<Publication> {
    fn publish(&mut self, publication: Publication) -> CoreResult<()> {
        self.push(publication);
        Ok(())
    }
}

impl NotificationSink for broadcast::Sender<Publication> {
    fn publish(&mut self, publication: Publication) -> CoreResult<()> {
        // No subscribers is not an error.
        let _ = self.send(publication);
        Ok(())
    }
}

/// Topics touched by one publish cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Topics written to the sink.
    pub published: Vec<String>,
    /// Topics whose payload matched the memo.
    pub skipped: Vec<String>,
}

/// Owns the topic → last-published payload memo for one session.
pub struct Publisher {
    views: Vec<Box<dyn View>>,
    memo: HashMap<String, String>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    /// Publisher over [`default_views`].
    pub fn new() -> Self {
        Self::with_views(default_views())
    }

    /// Publisher over an explicit view list, evaluated in order.
    pub fn with_views(views: Vec<Box<dyn View>>) -> Self {
        Self {
            views,
            memo: HashMap::new(),
        }
    }

    /// Last-published payload for `topic`.
    pub fn last_published(&self, topic: &str) -> Option<&str> {
        self.memo.get(topic).map(String::as_str)
    }

    /// Number of memoized topics.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Forgets everything, so the next cycle republishes every topic.
    pub fn reset(&mut self) {
        self.memo.clear();
    }

    /// Recomputes every view and publishes the changed topics.
    ///
    /// The memo is replaced wholesale once all views succeed. If a view
    /// fails, the cycle stops there, the memo is left as it was, and topics
    /// already written to `sink` stay written.
    pub fn publish(
        &mut self,
        conn: &Connection,
        sink: &mut dyn NotificationSink,
    ) -> CoreResult<PublishReport> {
        let mut next: HashMap<String, String> = HashMap::with_capacity(self.memo.len());
        let mut report = PublishReport::default();

        for view in &self.views {
            let entries = view.entries(conn).inspect_err(|err| {
                debug!(view = view.name(), error = %err, "view failed; publish cycle aborted");
            })?;
            for Entry { topic, payload } in entries {
                let unchanged = self
                    .memo
                    .get(&topic)
                    .is_some_and(|previous| *previous == payload);
                if unchanged {
                    report.skipped.push(topic.clone());
                } else {
                    sink.publish(Publication {
                        topic: topic.clone(),
                        payload: payload.clone(),
                    })?;
                    report.published.push(topic.clone());
                }
                next.insert(topic, payload);
            }
        }

        self.memo = next;
        info!(
            published = report.published.len(),
            skipped = report.skipped.len(),
            "publish cycle complete"
        );
        Ok(report)
    }

    /// Runs [`Publisher::publish`] against a read snapshot of `store`.
    pub fn publish_store(
        &mut self,
        store: &Store,
        sink: &mut dyn NotificationSink,
    ) -> CoreResult<PublishReport> {
        txn::read(store, |conn| self.publish(conn, sink))
    }
}
