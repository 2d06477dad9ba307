//! 内存记录存储
//!
//! 用于测试、基准测试和不落盘的试运行

use crate::error::{StoreError, StoreResult};
use crate::store::RecordStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// 内存记录存储
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入记录，不检查是否已存在
    pub async fn insert(&self, collection: &str, id: &str, record: Value) {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
    }

    /// 获取记录快照
    pub async fn get(&self, collection: &str, id: &str) -> Option<Value> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list(&self, collection: &str) -> StoreResult<Vec<String>> {
        let collections = self.collections.read().await;
        match collections.get(collection) {
            Some(records) if !records.is_empty() => Ok(records.keys().cloned().collect()),
            _ => Err(StoreError::EmptyCollection {
                collection: collection.to_string(),
            }),
        }
    }

    async fn read(&self, collection: &str, id: &str) -> StoreResult<Value> {
        self.get(collection, id)
            .await
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    async fn create(&self, collection: &str, id: &str, record: &Value) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        if records.contains_key(id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        records.insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, record: &Value) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        match collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
        {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(collection)
            .and_then(|records| records.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let store = MemoryRecordStore::new();
        assert!(store.update("checks", "x", &json!({})).await.is_err());

        store.insert("checks", "x", json!({"n": 1})).await;
        store.update("checks", "x", &json!({"n": 2})).await.unwrap();
        assert_eq!(store.get("checks", "x").await, Some(json!({"n": 2})));
    }

    #[tokio::test]
    async fn test_list_empty_collection_fails() {
        let store = MemoryRecordStore::new();
        assert!(matches!(
            store.list("checks").await,
            Err(StoreError::EmptyCollection { .. })
        ));

        store.create("checks", "x", &json!({})).await.unwrap();
        store.delete("checks", "x").await.unwrap();
        assert!(store.list("checks").await.is_err());
    }
}
