//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 把向导接到命令行：读取配置、驱动各个步骤、输出统计。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (一次命令行运行)
//!     ↓
//! workflow::WizardController (向导状态机)
//!     ↓
//! services (能力层：结构 / 模板 / 预览 / 提交 / 进度)
//!     ↓
//! clients (基础设施：ImportBackend / SchoolApiClient)
//! ```
//!
//! ## 设计原则
//!
//! 1. **向下依赖**：编排层 → workflow → services → clients
//! 2. **无业务逻辑**：只做调度和输出，不做校验判断

pub mod import_runner;

pub use import_runner::App;
