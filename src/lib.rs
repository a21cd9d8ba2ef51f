//! # Student Import
//!
//! 学校管理系统的学生批量导入客户端：把上传的表格变成经过校验、已落库的学生与家长记录
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 对外部系统的全部调用
//! - `ImportBackend` - 导入流程依赖的后端能力（trait）
//! - `SchoolApiClient` - 基于 reqwest 的实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务只做一件事
//! - `EducationalStructureResolver` - 阶段 → 年级 → 班级 + 学年
//! - `TemplateProvisioner` - 下载导入模板
//! - `ImportFilePreparer` - 持有文件、试运行预览
//! - `ImportCommitter` - 正式导入
//! - `ProgressTracker` - 轮询或节奏化展示进度
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次导入"的完整流程
//! - `ImportSession` - 一次向导运行的全部状态
//! - `WizardController` - 向导状态机（结构 → 模板 → 上传 → 结果）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/import_runner` - 命令行运行器，按配置驱动向导
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ImportBackend, SchoolApiClient, TemplateDownload};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{
    CompleteSelection, EducationalStructureSelection, ImportJob, ImportResults, PreviewResult,
    UploadedFile,
};
pub use orchestrator::App;
pub use services::{CommitPhase, TrackerSettings};
pub use workflow::{UploadStep, WizardController, WizardStage};
