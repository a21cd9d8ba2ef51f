//! 导入相关的数据模型

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display};

/// 用户选中的导入文件
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

/// 行级错误
///
/// 没有行号的是文件级错误（例如缺少列）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    #[serde(default)]
    pub row: Option<u32>,
    #[serde(alias = "message")]
    pub error: String,
}

impl Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "第 {} 行: {}", row, self.error),
            None => write!(f, "文件: {}", self.error),
        }
    }
}

/// 预览（试运行）结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewResult {
    #[serde(default)]
    pub total_rows: u32,
    #[serde(default)]
    pub processed_rows: u32,
    #[serde(default)]
    pub errors: Vec<RowError>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, alias = "preview_data")]
    pub sample_rows: Vec<Value>,
}

impl PreviewResult {
    /// 没有行级错误才允许提交
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// 导入后创建的记录（学生或家长），仅用于展示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "full_name")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 导入最终结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResults {
    #[serde(default)]
    pub total_rows: u32,
    #[serde(default)]
    pub successful_imports: u32,
    #[serde(default)]
    pub created_students: Vec<ImportedRecord>,
    #[serde(default)]
    pub created_parents: Vec<ImportedRecord>,
    #[serde(default)]
    pub errors: Vec<RowError>,
}

/// 提交接口的响应
///
/// 有 `job_id` 表示后端支持真实进度跟踪
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitResponse {
    pub job_id: Option<String>,
    pub results: ImportResults,
}

impl CommitResponse {
    /// 兼容扁平结构和 `{"results": {...}}` 两种写法
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let job_id = value
            .get("job_id")
            .or_else(|| value.get("jobId"))
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        let results = match value.get("results") {
            Some(nested @ Value::Object(_)) => serde_json::from_value(nested.clone())?,
            _ => serde_json::from_value(value)?,
        };

        Ok(Self { job_id, results })
    }
}

/// 进度接口的响应
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub current_status: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Option<ImportResults>,
}

/// 一次导入任务的可观察状态
///
/// 不变式：`progress_percent` 只增不减；`completed` 与 `error` 互斥，
/// 任一被设置后状态不再变化
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportJob {
    pub job_id: Option<String>,
    pub progress_percent: u8,
    pub status_message: String,
    pub completed: bool,
    pub error: Option<String>,
    pub results: Option<ImportResults>,
}

impl ImportJob {
    pub fn new(job_id: Option<String>, status_message: impl Into<String>) -> Self {
        Self {
            job_id,
            status_message: status_message.into(),
            ..Default::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.completed || self.error.is_some()
    }

    /// 推进进度；低于当前值的百分比会被忽略
    ///
    /// 返回状态是否发生变化
    pub fn advance(&mut self, percent: u8, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let percent = percent.min(100).max(self.progress_percent);
        let message = message.into();
        let changed = percent != self.progress_percent || message != self.status_message;
        self.progress_percent = percent;
        self.status_message = message;
        changed
    }

    pub fn complete(&mut self, results: ImportResults, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.progress_percent = 100;
        self.status_message = message.into();
        self.completed = true;
        self.results = Some(results);
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let message = message.into();
        self.status_message = message.clone();
        self.error = Some(message);
        true
    }
}

/// 提交被拦截的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitBlockReason {
    NoFile,
    NotPreviewed,
    /// 预览时的结构与提交时不同
    StalePreview,
    PreviewHasErrors(usize),
}

impl Display for CommitBlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitBlockReason::NoFile => write!(f, "尚未选择文件"),
            CommitBlockReason::NotPreviewed => write!(f, "请先预览文件"),
            CommitBlockReason::StalePreview => write!(f, "预览已过期，请重新预览"),
            CommitBlockReason::PreviewHasErrors(n) => {
                write!(f, "预览发现 {} 个错误，请修正后重新上传", n)
            }
        }
    }
}
