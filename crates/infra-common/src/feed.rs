//! Change-feed port: row-level delta subscriptions.
//!
//! Both cores consume the durable store through the same shape: subscribe
//! with a filter, receive insert/update/delete deltas on a channel. The
//! implementation behind the trait (database change stream, bridge to a
//! hosted realtime service) is the host application's concern.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Row-level change delivered by a feed subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent<T> {
    /// A new row was inserted
    Insert { new: T },
    /// An existing row was updated
    Update { new: T, old: Option<T> },
    /// A row was deleted
    Delete { old: T },
}

impl<T> ChangeEvent<T> {
    /// The row this event is about: the new row for inserts and updates,
    /// the old row for deletes.
    pub fn row(&self) -> &T {
        match self {
            ChangeEvent::Insert { new } => new,
            ChangeEvent::Update { new, .. } => new,
            ChangeEvent::Delete { old } => old,
        }
    }
}

/// Server-side filter applied to a feed subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFilter {
    /// Deliver every change on the table
    All,
    /// Deliver changes where `column` equals `value`
    Eq { column: String, value: String },
}

impl FeedFilter {
    /// Filter on column equality
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        FeedFilter::Eq {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// A subscribable stream of row deltas for one logical table.
///
/// Subscriptions live until the receiver is dropped; senders must tolerate a
/// closed channel (the consumer tore down first).
#[async_trait]
pub trait ChangeFeed<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Open a filtered subscription
    async fn subscribe(&self, filter: FeedFilter) -> mpsc::Receiver<ChangeEvent<T>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn row_picks_the_surviving_side() {
        let insert = ChangeEvent::Insert { new: 1 };
        let update = ChangeEvent::Update {
            new: 2,
            old: Some(1),
        };
        let delete = ChangeEvent::Delete { old: 3 };

        assert_eq!(*insert.row(), 1);
        assert_eq!(*update.row(), 2);
        assert_eq!(*delete.row(), 3);
    }
}
