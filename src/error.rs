use thiserror::Error;

use crate::models::{CommitBlockReason, StructureField};
use crate::workflow::WizardStage;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 结构选择或文件校验失败（阻止进入下一步）
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),

    /// 依赖的上级字段尚未选择
    #[error("请先选择{needed}，才能{action}")]
    DependencyMissing {
        needed: StructureField,
        action: &'static str,
    },

    /// 模板下载失败（不自动重试）
    #[error("模板不可用: {message}")]
    TemplateUnavailable { message: String },

    /// 预览请求本身失败（行级错误不走这里）
    #[error("预览失败: {message}")]
    PreviewFailed { message: String },

    /// 没有一次干净的预览，不允许提交
    #[error("无法提交导入: {reason}")]
    CommitBlocked { reason: CommitBlockReason },

    /// 提交请求传输失败
    #[error("提交导入失败: {message}")]
    CommitTransport { message: String },

    /// 服务端任务报告失败
    #[error("导入任务失败: {message}")]
    Job { message: String },

    /// 轮询次数用尽仍未结束
    #[error("导入任务超时: 已轮询 {polls} 次仍未结束")]
    JobTimeout { polls: u32 },

    /// 已有导入正在进行
    #[error("已有导入正在进行中")]
    CommitAlreadyInProgress,

    /// 跟踪被取消（重置或视图销毁）
    #[error("导入跟踪已取消")]
    Cancelled,

    /// 当前阶段不允许该操作
    #[error("当前阶段 {stage} 不允许执行: {action}")]
    InvalidStage {
        action: &'static str,
        stage: WizardStage,
    },

    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 文件读写错误
    #[error("文件错误 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 结构选择缺少字段
    #[error("请选择: {}", join_fields(.0))]
    MissingFields(Vec<StructureField>),

    #[error("未知的教育阶段: {0}")]
    UnknownLevel(i64),

    #[error("年级 {grade} 不属于教育阶段 {level}")]
    GradeNotInLevel { grade: i64, level: i64 },

    #[error("班级 {class} 不属于年级 {grade}")]
    ClassNotInGrade { class: i64, grade: i64 },

    #[error("未知的学年: {0}")]
    UnknownAcademicYear(i64),

    /// 上传文件为空
    #[error("文件为空: {0}")]
    EmptyFile(String),
}

fn join_fields(fields: &[StructureField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("、")
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// JSON 解析失败
    #[error("JSON解析失败 ({endpoint}): {source}")]
    JsonParseFailed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// 面向用户的错误信息：优先使用服务端返回的文本
    pub fn user_message(&self) -> String {
        match self {
            ApiError::BadResponse { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: &'static str,
    },

    /// 配置文件解析失败
    #[error("配置文件 {path} 解析失败: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// HTTP 客户端构建失败
    #[error("HTTP 客户端构建失败: {0}")]
    HttpClient(#[source] reqwest::Error),
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建文件读写错误
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// 面向用户的简短信息（服务端给出的文本原样展示）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Api(e) => e.user_message(),
            AppError::Job { message }
            | AppError::CommitTransport { message }
            | AppError::TemplateUnavailable { message }
            | AppError::PreviewFailed { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
