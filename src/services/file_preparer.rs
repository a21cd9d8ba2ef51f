//! 导入文件准备服务 - 业务能力层
//!
//! 持有唯一的待导入文件，负责试运行预览；预览不落库，可以反复执行

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::ImportBackend;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{CommitBlockReason, CompleteSelection, PreviewResult, UploadedFile};

/// 导入文件准备服务
///
/// 职责：
/// - 同一时间只有一个文件
/// - 换文件即丢弃预览；预览结果与预览时的结构绑定
/// - 判定是否允许提交，不发起网络请求
pub struct ImportFilePreparer {
    backend: Arc<dyn ImportBackend>,
    file: Option<UploadedFile>,
    /// 预览结果及其对应的结构
    preview: Option<(CompleteSelection, PreviewResult)>,
}

impl ImportFilePreparer {
    pub fn new(backend: Arc<dyn ImportBackend>) -> Self {
        Self {
            backend,
            file: None,
            preview: None,
        }
    }

    /// 选择（或替换）文件，旧预览作废
    pub fn select_file(&mut self, file: UploadedFile) -> AppResult<()> {
        if file.bytes.is_empty() {
            return Err(ValidationError::EmptyFile(file.name).into());
        }
        info!("📄 已选择文件: {} ({} 字节)", file.name, file.size_bytes());
        self.file = Some(file);
        self.preview = None;
        Ok(())
    }

    /// 从磁盘读取文件并选中
    pub async fn load_file(&mut self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::io(path.display().to_string(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.select_file(UploadedFile::new(name, bytes))
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    /// 最近一次预览结果
    pub fn preview_result(&self) -> Option<&PreviewResult> {
        self.preview.as_ref().map(|(_, result)| result)
    }

    /// 试运行校验
    ///
    /// 行级错误作为结果返回，不会变成 `Err`
    pub async fn preview(&mut self, selection: &CompleteSelection) -> AppResult<&PreviewResult> {
        let file = self
            .file
            .as_ref()
            .ok_or(AppError::CommitBlocked {
                reason: CommitBlockReason::NoFile,
            })?;

        info!("🔍 正在预览 {} {}", file.name, selection);

        let result = self
            .backend
            .preview_import(file, selection)
            .await
            .map_err(|e| {
                warn!("预览请求失败: {}", e);
                AppError::PreviewFailed {
                    message: e.user_message(),
                }
            })?;

        if result.is_clean() {
            info!(
                "✓ 预览通过: 共 {} 行，已校验 {} 行",
                result.total_rows, result.processed_rows
            );
        } else {
            warn!(
                "⚠️ 预览发现 {} 个错误 (共 {} 行)",
                result.errors.len(),
                result.total_rows
            );
        }

        let (_, stored) = self.preview.insert((*selection, result));
        Ok(stored)
    }

    /// 是否允许用当前文件和结构提交
    pub fn can_commit(&self, selection: &CompleteSelection) -> bool {
        self.authorize_commit(selection).is_ok()
    }

    /// 返回可以提交的文件，否则说明原因
    pub fn authorize_commit(&self, selection: &CompleteSelection) -> AppResult<&UploadedFile> {
        let blocked = |reason| AppError::CommitBlocked { reason };

        let file = self.file.as_ref().ok_or(blocked(CommitBlockReason::NoFile))?;
        let (previewed_for, result) = self
            .preview
            .as_ref()
            .ok_or(blocked(CommitBlockReason::NotPreviewed))?;

        if previewed_for != selection {
            return Err(blocked(CommitBlockReason::StalePreview));
        }
        if !result.is_clean() {
            return Err(blocked(CommitBlockReason::PreviewHasErrors(
                result.errors.len(),
            )));
        }
        Ok(file)
    }

    /// 清空文件和预览
    pub fn clear(&mut self) {
        self.file = None;
        self.preview = None;
    }
}
