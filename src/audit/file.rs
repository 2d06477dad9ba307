//! 文件审计日志
//!
//! 每个日志流对应 `<dir>/<stream>.log`，轮转时压缩为 `<archive>.gz.b64`

use crate::audit::LogSink;
use crate::error::LogSinkError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const LOG_EXTENSION: &str = ".log";
const ARCHIVE_EXTENSION: &str = ".gz.b64";
const STAGING_EXTENSION: &str = ".rotating";

/// 单次轮转的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// 成功压缩的日志
    pub rotated: Vec<String>,
    /// 处理失败的日志
    pub failed: Vec<String>,
}

/// 基于文件的审计日志
#[derive(Debug, Clone)]
pub struct FileLogSink {
    /// 日志目录
    base_dir: PathBuf,
}

impl FileLogSink {
    /// 创建新的文件日志
    ///
    /// # 参数
    /// * `base_dir` - 日志目录
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// 日志目录
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn log_path(&self, log_id: &str) -> PathBuf {
        self.base_dir.join(format!("{log_id}{LOG_EXTENSION}"))
    }

    fn archive_path(&self, archive_id: &str) -> PathBuf {
        self.base_dir.join(format!("{archive_id}{ARCHIVE_EXTENSION}"))
    }

    fn staging_path(&self, archive_id: &str) -> PathBuf {
        self.base_dir.join(format!("{archive_id}{STAGING_EXTENSION}"))
    }

    fn io_error(context: String, source: std::io::Error) -> LogSinkError {
        LogSinkError::Io { context, source }
    }

    /// 列出日志
    ///
    /// # 参数
    /// * `include_compressed` - 是否包含已压缩的归档
    ///
    /// # 返回
    /// * 去掉扩展名后的日志名称
    pub async fn list(&self, include_compressed: bool) -> Result<Vec<String>, LogSinkError> {
        let mut entries = fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| Self::io_error(format!("读取日志目录 {}", self.base_dir.display()), e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error(format!("遍历日志目录 {}", self.base_dir.display()), e))?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            if let Some(name) = file_name.strip_suffix(LOG_EXTENSION) {
                names.push(name.to_string());
            } else if include_compressed {
                if let Some(name) = file_name.strip_suffix(ARCHIVE_EXTENSION) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// 把一个日志压缩为归档文件，归档已存在时失败
    pub async fn compress(&self, log_id: &str, archive_id: &str) -> Result<(), LogSinkError> {
        self.compress_file(&self.log_path(log_id), log_id, archive_id).await
    }

    async fn compress_file(
        &self,
        source: &Path,
        log_id: &str,
        archive_id: &str,
    ) -> Result<(), LogSinkError> {
        let content = fs::read(source)
            .await
            .map_err(|e| Self::io_error(format!("读取日志 {}", source.display()), e))?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&content)
            .map_err(|e| Self::io_error(format!("压缩日志 {log_id}"), e))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Self::io_error(format!("压缩日志 {log_id}"), e))?;

        let destination = self.archive_path(archive_id);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .await
            .map_err(|e| Self::io_error(format!("创建归档 {}", destination.display()), e))?;
        file.write_all(STANDARD.encode(compressed).as_bytes())
            .await
            .map_err(|e| Self::io_error(format!("写入归档 {}", destination.display()), e))?;
        file.flush()
            .await
            .map_err(|e| Self::io_error(format!("写入归档 {}", destination.display()), e))?;

        Ok(())
    }

    /// 解压归档文件内容
    pub async fn decompress(&self, archive_id: &str) -> Result<String, LogSinkError> {
        let path = self.archive_path(archive_id);
        let encoded = fs::read_to_string(&path)
            .await
            .map_err(|e| Self::io_error(format!("读取归档 {}", path.display()), e))?;

        let compressed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| LogSinkError::InvalidArchive(format!("{archive_id}: {e}")))?;

        let mut content = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut content)
            .map_err(|e| LogSinkError::InvalidArchive(format!("{archive_id}: {e}")))?;

        Ok(content)
    }

    /// 清空日志文件
    pub async fn truncate(&self, log_id: &str) -> Result<(), LogSinkError> {
        let path = self.log_path(log_id);
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|e| Self::io_error(format!("打开日志 {}", path.display()), e))?;
        file.set_len(0)
            .await
            .map_err(|e| Self::io_error(format!("清空日志 {}", path.display()), e))
    }

    /// 压缩所有未压缩的日志
    ///
    /// 日志先改名为暂存文件再压缩，轮转期间的新写入落到新的日志文件中。
    /// 单个日志失败不影响其他日志。
    pub async fn rotate(&self) -> Result<RotationReport, LogSinkError> {
        let logs = self.list(false).await?;
        let mut report = RotationReport::default();

        for log_id in logs {
            let archive_id = format!("{}-{}", log_id, chrono::Utc::now().timestamp_millis());
            let result = self.rotate_one(&log_id, &archive_id).await;

            match result {
                Ok(()) => {
                    debug!("日志已轮转: {} -> {}", log_id, archive_id);
                    report.rotated.push(log_id);
                }
                Err(e) => {
                    warn!("日志轮转失败: {} - {}", log_id, e);
                    report.failed.push(log_id);
                }
            }
        }

        info!(
            "日志轮转完成，成功: {}，失败: {}",
            report.rotated.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

impl FileLogSink {
    async fn rotate_one(&self, log_id: &str, archive_id: &str) -> Result<(), LogSinkError> {
        let log_path = self.log_path(log_id);
        let staged = self.staging_path(archive_id);
        fs::rename(&log_path, &staged)
            .await
            .map_err(|e| Self::io_error(format!("暂存日志 {}", log_path.display()), e))?;

        match self.compress_file(&staged, log_id, archive_id).await {
            Ok(()) => fs::remove_file(&staged)
                .await
                .map_err(|e| Self::io_error(format!("删除暂存日志 {}", staged.display()), e)),
            Err(e) => {
                self.restore_staged(&staged, log_id).await;
                Err(e)
            }
        }
    }

    /// 压缩失败时把暂存内容追加回日志
    async fn restore_staged(&self, staged: &Path, log_id: &str) {
        let restored = async {
            let content = fs::read(staged).await?;
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.log_path(log_id))
                .await?;
            file.write_all(&content).await?;
            file.flush().await?;
            fs::remove_file(staged).await
        };

        if let Err(e) = restored.await {
            warn!("恢复暂存日志失败: {} - {}", staged.display(), e);
        }
    }
}

#[async_trait]
impl LogSink for FileLogSink {
    async fn append(&self, stream_id: &str, payload: &str) -> Result<(), LogSinkError> {
        let append_error = |source| LogSinkError::Append {
            stream: stream_id.to_string(),
            source,
        };

        fs::create_dir_all(&self.base_dir).await.map_err(append_error)?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(stream_id))
            .await
            .map_err(append_error)?;

        file.write_all(format!("{payload}\n").as_bytes())
            .await
            .map_err(append_error)?;
        file.flush().await.map_err(append_error)
    }
}
