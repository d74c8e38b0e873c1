//! In-process [`BugStore`], used for local runs (`BUGS_STORE=memory`) and tests.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    database::{BugStore, Replace, StoreError},
    models::{Bug, BugId},
    query::BugQuery,
};

#[derive(Default)]
pub struct MemoryStore {
    bugs: RwLock<HashMap<BugId, Bug>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bugs(bugs: impl IntoIterator<Item = Bug>) -> Self {
        Self {
            bugs: RwLock::new(bugs.into_iter().map(|bug| (bug.id.clone(), bug)).collect()),
        }
    }
}

#[async_trait]
impl BugStore for MemoryStore {
    async fn insert(&self, bug: &Bug) -> Result<(), StoreError> {
        let mut bugs = self.bugs.write().await;

        if bugs.contains_key(&bug.id) {
            return Err(StoreError::Duplicate(bug.id.clone()));
        }
        bugs.insert(bug.id.clone(), bug.clone());

        Ok(())
    }

    async fn get(&self, id: &BugId) -> Result<Option<Bug>, StoreError> {
        Ok(self.bugs.read().await.get(id).cloned())
    }

    async fn find(&self, query: &BugQuery) -> Result<(Vec<Bug>, u64), StoreError> {
        Ok(query.select(self.all().await?))
    }

    async fn all(&self) -> Result<Vec<Bug>, StoreError> {
        Ok(self.bugs.read().await.values().cloned().collect())
    }

    async fn replace(&self, bug: &Bug, read_at: DateTime<Utc>) -> Result<Replace, StoreError> {
        let mut bugs = self.bugs.write().await;

        Ok(match bugs.get_mut(&bug.id) {
            None => Replace::Missing,
            Some(stored) if stored.updated_at != read_at => Replace::Stale,
            Some(stored) => {
                *stored = bug.clone();
                Replace::Replaced
            }
        })
    }

    async fn delete(&self, id: &BugId) -> Result<Option<Bug>, StoreError> {
        Ok(self.bugs.write().await.remove(id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{BugFields, Priority, Status};

    fn bug() -> Bug {
        Bug::create(
            BugFields {
                title: "Stored bug".to_string(),
                description: "Stored bug description".to_string(),
                status: Status::Open,
                priority: Priority::Low,
                assignee: None,
                reporter: "QA".to_string(),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let store = MemoryStore::new();
        let bug = bug();

        store.insert(&bug).await.unwrap();
        assert_eq!(store.get(&bug.id).await.unwrap(), Some(bug.clone()));

        assert_eq!(store.delete(&bug.id).await.unwrap(), Some(bug.clone()));
        assert_eq!(store.get(&bug.id).await.unwrap(), None);
        assert_eq!(store.delete(&bug.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let bug = bug();
        let store = MemoryStore::with_bugs([bug.clone()]);

        assert!(matches!(
            store.insert(&bug).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_requires_existing() {
        let store = MemoryStore::new();
        let bug = bug();

        assert_eq!(store.replace(&bug, bug.updated_at).await.unwrap(), Replace::Missing);
    }

    #[tokio::test]
    async fn test_replace_after_read() {
        let stored = bug();
        let store = MemoryStore::with_bugs([stored.clone()]);

        let mut edited = stored.clone();
        edited.status = Status::Resolved;
        edited.touch(Utc::now());

        assert_eq!(
            store.replace(&edited, stored.updated_at).await.unwrap(),
            Replace::Replaced
        );
        assert_eq!(store.get(&stored.id).await.unwrap(), Some(edited));
    }

    #[tokio::test]
    async fn test_racing_edits_do_not_overwrite() {
        let stored = bug();
        let store = MemoryStore::with_bugs([stored.clone()]);

        let mut status_change = stored.clone();
        status_change.status = Status::Resolved;
        status_change.touch(Utc::now());

        let mut rename = stored.clone();
        rename.title = "Renamed bug".to_string();
        rename.touch(Utc::now());

        assert_eq!(
            store.replace(&status_change, stored.updated_at).await.unwrap(),
            Replace::Replaced
        );
        assert_eq!(
            store.replace(&rename, stored.updated_at).await.unwrap(),
            Replace::Stale
        );

        let current = store.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(current.status, Status::Resolved);
        assert_eq!(current.title, stored.title);
    }
}
