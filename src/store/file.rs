//! 文件记录存储
//!
//! 每个集合对应一个目录，每条记录是目录下的一个 `<id>.json` 文件

use crate::error::{StoreError, StoreResult};
use crate::store::RecordStore;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const RECORD_EXTENSION: &str = "json";

/// 基于目录的文件记录存储
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    /// 数据根目录
    base_dir: PathBuf,
}

impl FileRecordStore {
    /// 创建新的文件存储
    ///
    /// # 参数
    /// * `base_dir` - 数据根目录
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// 数据根目录
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.base_dir.join(collection)
    }

    fn record_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{id}.{RECORD_EXTENSION}"))
    }

    fn io_error(context: String, source: std::io::Error) -> StoreError {
        StoreError::Io { context, source }
    }

    fn not_found(collection: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn list(&self, collection: &str) -> StoreResult<Vec<String>> {
        let dir = self.collection_dir(collection);
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| Self::io_error(format!("读取集合目录 {}", dir.display()), e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error(format!("遍历集合目录 {}", dir.display()), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }

        if ids.is_empty() {
            return Err(StoreError::EmptyCollection {
                collection: collection.to_string(),
            });
        }

        ids.sort();
        debug!("集合 {} 中共有 {} 条记录", collection, ids.len());
        Ok(ids)
    }

    async fn read(&self, collection: &str, id: &str) -> StoreResult<Value> {
        let path = self.record_path(collection, id);
        let content = fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Self::not_found(collection, id)
            } else {
                Self::io_error(format!("读取记录 {}", path.display()), e)
            }
        })?;

        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            collection: collection.to_string(),
            id: id.to_string(),
            source,
        })
    }

    async fn create(&self, collection: &str, id: &str, record: &Value) -> StoreResult<()> {
        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Self::io_error(format!("创建集合目录 {}", dir.display()), e))?;

        let path = self.record_path(collection, id);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists {
                        collection: collection.to_string(),
                        id: id.to_string(),
                    }
                } else {
                    Self::io_error(format!("创建记录 {}", path.display()), e)
                }
            })?;

        let data = serde_json::to_vec(record).map_err(|source| StoreError::Corrupt {
            collection: collection.to_string(),
            id: id.to_string(),
            source,
        })?;
        file.write_all(&data)
            .await
            .map_err(|e| Self::io_error(format!("写入记录 {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| Self::io_error(format!("写入记录 {}", path.display()), e))?;

        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, record: &Value) -> StoreResult<()> {
        let path = self.record_path(collection, id);
        let data = serde_json::to_vec(record).map_err(|source| StoreError::Corrupt {
            collection: collection.to_string(),
            id: id.to_string(),
            source,
        })?;

        // 只覆盖已有记录，被删除的检查不会被重新写回
        let mut file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    Self::not_found(collection, id)
                } else {
                    Self::io_error(format!("打开记录 {}", path.display()), e)
                }
            })?;

        file.write_all(&data)
            .await
            .map_err(|e| Self::io_error(format!("写入记录 {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| Self::io_error(format!("写入记录 {}", path.display()), e))?;

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let path = self.record_path(collection, id);
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Self::not_found(collection, id)
            } else {
                Self::io_error(format!("删除记录 {}", path.display()), e)
            }
        })
    }
}
