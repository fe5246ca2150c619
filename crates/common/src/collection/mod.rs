//! Collection membership
//!
//! Read-mostly view of which papers the user has saved. The exploration
//! engine only asks questions; mutations come from the surrounding system,
//! which is notified of every change through a broadcast feed.

use crate::errors::Result;
use crate::models::PaperId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Capacity of the change feed; slow subscribers see `Lagged` beyond it
const CHANGE_FEED_CAPACITY: usize = 256;

/// Membership lookups used when encoding nodes
#[async_trait]
pub trait CollectionMembership: Send + Sync {
    async fn is_member(&self, paper_id: &PaperId) -> Result<bool>;

    /// Members among `paper_ids`. Defaults to one lookup per id.
    async fn members_among(&self, paper_ids: &[PaperId]) -> Result<HashSet<PaperId>> {
        let mut members = HashSet::new();
        for id in paper_ids {
            if self.is_member(id).await? {
                members.insert(id.clone());
            }
        }
        Ok(members)
    }
}

/// Membership change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MembershipChange {
    Added { paper_id: PaperId },
    Removed { paper_id: PaperId },
}

/// In-process collection with a change feed
pub struct InMemoryCollection {
    members: RwLock<HashSet<PaperId>>,
    changes: broadcast::Sender<MembershipChange>,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            members: RwLock::new(HashSet::new()),
            changes,
        }
    }

    pub fn with_members<I: IntoIterator<Item = PaperId>>(ids: I) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            members: RwLock::new(ids.into_iter().collect()),
            changes,
        }
    }

    /// Subscribe to membership changes
    pub fn subscribe(&self) -> broadcast::Receiver<MembershipChange> {
        self.changes.subscribe()
    }

    /// Add a paper; returns false if it was already a member
    pub async fn add(&self, paper_id: PaperId) -> bool {
        let inserted = self.members.write().await.insert(paper_id.clone());
        if inserted {
            self.publish(MembershipChange::Added { paper_id });
        }
        inserted
    }

    /// Remove a paper; returns false if it was not a member
    pub async fn remove(&self, paper_id: &PaperId) -> bool {
        let removed = self.members.write().await.remove(paper_id);
        if removed {
            self.publish(MembershipChange::Removed { paper_id: paper_id.clone() });
        }
        removed
    }

    /// Replace the whole set after an external refresh, publishing the diff
    pub async fn refresh<I: IntoIterator<Item = PaperId>>(&self, ids: I) {
        let incoming: HashSet<PaperId> = ids.into_iter().collect();
        let mut members = self.members.write().await;

        for gone in members.difference(&incoming) {
            self.publish(MembershipChange::Removed { paper_id: gone.clone() });
        }
        for new in incoming.difference(&members) {
            self.publish(MembershipChange::Added { paper_id: new.clone() });
        }
        *members = incoming;
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    fn publish(&self, change: MembershipChange) {
        // No subscribers is fine
        if self.changes.send(change).is_err() {
            debug!("Membership change published without subscribers");
        }
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CollectionMembership for InMemoryCollection {
    async fn is_member(&self, paper_id: &PaperId) -> Result<bool> {
        Ok(self.members.read().await.contains(paper_id))
    }

    async fn members_among(&self, paper_ids: &[PaperId]) -> Result<HashSet<PaperId>> {
        let members = self.members.read().await;
        Ok(paper_ids.iter().filter(|id| members.contains(*id)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_publishes_once() {
        let collection = InMemoryCollection::new();
        let mut feed = collection.subscribe();
        let id = PaperId::from("W1");

        assert!(collection.add(id.clone()).await);
        assert!(!collection.add(id.clone()).await);
        assert!(collection.is_member(&id).await.unwrap());

        assert_eq!(feed.recv().await.unwrap(), MembershipChange::Added { paper_id: id });
        assert!(feed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refresh_publishes_diff() {
        let collection = InMemoryCollection::with_members([PaperId::from("W1"), PaperId::from("W2")]);
        let mut feed = collection.subscribe();

        collection.refresh([PaperId::from("W2"), PaperId::from("W3")]).await;

        let mut changes = vec![feed.recv().await.unwrap(), feed.recv().await.unwrap()];
        changes.sort_by_key(|c| format!("{:?}", c));
        assert_eq!(
            changes,
            vec![
                MembershipChange::Added { paper_id: PaperId::from("W3") },
                MembershipChange::Removed { paper_id: PaperId::from("W1") },
            ]
        );
        assert_eq!(collection.len().await, 2);
    }

    #[tokio::test]
    async fn test_members_among() {
        let collection = InMemoryCollection::with_members([PaperId::from("W1")]);
        let found = collection
            .members_among(&[PaperId::from("W1"), PaperId::from("W9")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains(&PaperId::from("W1")));
    }
}
