//! Batch partitioning and order-independent batch identity

use crate::types::{Cluster, Conversation, ConversationSummary};
use std::fmt;

/// An item that can be batched: exposes a stable string identifier
pub trait BatchItem {
    fn item_id(&self) -> &str;
}

impl BatchItem for Conversation {
    fn item_id(&self) -> &str {
        &self.chat_id
    }
}

impl BatchItem for ConversationSummary {
    fn item_id(&self) -> &str {
        &self.chat_id
    }
}

impl BatchItem for Cluster {
    fn item_id(&self) -> &str {
        &self.id
    }
}

/// Identity of a batch: the sorted identifiers of its members.
///
/// Sorting makes the key order-independent, so reprocessing the same set of
/// items in a different input order maps to the same key. Two batches share a
/// key only when they are identical in membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey(Vec<String>);

impl BatchKey {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        ids.sort();
        Self(ids)
    }

    pub fn from_items<T: BatchItem>(items: &[T]) -> Self {
        Self::from_ids(items.iter().map(|item| item.item_id().to_string()))
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// Split `items` into fixed-size batches, preserving input order.
///
/// The final batch may be smaller than `batch_size`. A `batch_size` of zero
/// is clamped to one.
pub fn partition_batches<T>(items: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let size = batch_size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter();
    loop {
        let batch: Vec<T> = iter.by_ref().take(size).collect();
        if batch.is_empty() {
            break;
        }
        batches.push(batch);
    }
    batches
}
