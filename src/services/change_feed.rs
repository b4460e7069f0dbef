//! Row-level change events.
//!
//! Services publish one event per successful write, keyed by table and row
//! id, so subscribers can patch the single affected row instead of reloading
//! a whole table.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub table: String,
    pub op: ChangeOp,
    pub row_id: String,
    /// Owner of the row, when it belongs to a single user.
    pub user_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<RowChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, table: &str, op: ChangeOp, row_id: impl ToString, user_id: Option<Uuid>) {
        // No subscribers is the normal idle state.
        let _ = self.sender.send(RowChange {
            table: table.to_string(),
            op,
            row_id: row_id.to_string(),
            user_id,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RowChange> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_row_keyed_events() {
        let feed = ChangeFeed::new(8);
        let mut rx = feed.subscribe();
        let user = Uuid::new_v4();

        feed.publish("transactions", ChangeOp::Insert, "tx-1", Some(user));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.table, "transactions");
        assert_eq!(event.op, ChangeOp::Insert);
        assert_eq!(event.row_id, "tx-1");
        assert_eq!(event.user_id, Some(user));
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let feed = ChangeFeed::default();
        feed.publish("profiles", ChangeOp::Update, Uuid::new_v4(), None);
    }
}
