//! 导入会话
//!
//! 封装"这一次向导运行"的全部状态，由 `WizardController` 独占；
//! 重置时整体替换

use std::fmt::{self, Display};
use std::sync::Arc;

use crate::clients::ImportBackend;
use crate::models::{EducationalStructureSelection, ImportResults};
use crate::services::{ImportCommitter, ImportFilePreparer, TrackerSettings};

/// 上传阶段的子状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    /// 等待选择文件
    SelectFile,
    /// 已有预览结果
    Preview,
}

/// 向导阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStage {
    Structure,
    Template,
    Upload(UploadStep),
    Results,
}

impl Display for WizardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardStage::Structure => write!(f, "选择结构"),
            WizardStage::Template => write!(f, "下载模板"),
            WizardStage::Upload(UploadStep::SelectFile) => write!(f, "上传文件"),
            WizardStage::Upload(UploadStep::Preview) => write!(f, "预览"),
            WizardStage::Results => write!(f, "导入结果"),
        }
    }
}

/// 导入会话
pub struct ImportSession {
    pub stage: WizardStage,
    pub selection: EducationalStructureSelection,
    pub preparer: ImportFilePreparer,
    pub committer: ImportCommitter,
    pub results: Option<ImportResults>,
}

impl ImportSession {
    pub fn new(backend: Arc<dyn ImportBackend>, settings: TrackerSettings) -> Self {
        Self {
            stage: WizardStage::Structure,
            selection: EducationalStructureSelection::default(),
            preparer: ImportFilePreparer::new(backend.clone()),
            committer: ImportCommitter::new(backend, settings),
            results: None,
        }
    }
}
