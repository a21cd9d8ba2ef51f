//! 批量导入向导 - 流程层
//!
//! 核心职责：定义一次学生批量导入的完整流程
//!
//! 流程顺序：
//! 1. 选择结构（阶段 → 年级 → 班级 + 学年）
//! 2. 下载模板（可跳过）
//! 3. 上传文件 → 预览 → 提交 → 跟踪进度
//! 4. 查看结果
//!
//! 只能向前推进；`reset` 在任意阶段可用，清空全部数据回到第一步

use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::clients::ImportBackend;
use crate::error::{AppError, AppResult};
use crate::models::{
    CompleteSelection, EducationalStructureSelection, ImportJob, ImportResults, PreviewResult,
    SchoolClass, UploadedFile,
};
use crate::services::{
    CommitPhase, EducationalStructureResolver, TemplateFile, TemplateProvisioner,
    TrackerSettings,
};
use crate::workflow::import_session::{ImportSession, UploadStep, WizardStage};

/// 批量导入向导
///
/// - 独占 `ImportSession`，子服务只拿到需要的那部分
/// - 同一时间最多一个提交
/// - 被销毁时停止进度跟踪
pub struct WizardController {
    backend: Arc<dyn ImportBackend>,
    settings: TrackerSettings,
    resolver: EducationalStructureResolver,
    templates: TemplateProvisioner,
    session: ImportSession,
}

impl WizardController {
    pub fn new(backend: Arc<dyn ImportBackend>, settings: TrackerSettings) -> Self {
        Self {
            resolver: EducationalStructureResolver::new(backend.clone()),
            templates: TemplateProvisioner::new(backend.clone()),
            session: ImportSession::new(backend.clone(), settings),
            backend,
            settings,
        }
    }

    // ========== 状态查询 ==========

    pub fn stage(&self) -> WizardStage {
        self.session.stage
    }

    pub fn selection(&self) -> &EducationalStructureSelection {
        &self.session.selection
    }

    /// 结构目录（阶段、年级、学年、已加载的班级）
    pub fn resolver(&self) -> &EducationalStructureResolver {
        &self.resolver
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.session.preparer.file()
    }

    pub fn preview_result(&self) -> Option<&PreviewResult> {
        self.session.preparer.preview_result()
    }

    pub fn commit_phase(&self) -> CommitPhase {
        self.session.committer.phase()
    }

    /// 最近一次提交失败的提示
    pub fn last_error(&self) -> Option<&str> {
        self.session.committer.last_error()
    }

    pub fn results(&self) -> Option<&ImportResults> {
        self.session.results.as_ref()
    }

    // ========== 第一步：结构选择 ==========

    pub async fn load_catalog(&mut self) -> AppResult<()> {
        self.require("加载结构目录", self.stage() == WizardStage::Structure)?;
        self.resolver.load_catalog().await
    }

    pub fn select_level(&mut self, level_id: i64) -> AppResult<()> {
        self.require("选择教育阶段", self.stage() == WizardStage::Structure)?;
        self.resolver
            .select_level(&mut self.session.selection, level_id)
    }

    pub fn select_grade(&mut self, grade_id: i64) -> AppResult<()> {
        self.require("选择年级", self.stage() == WizardStage::Structure)?;
        self.resolver
            .select_grade(&mut self.session.selection, grade_id)
    }

    pub async fn load_classes(&mut self) -> AppResult<&[SchoolClass]> {
        self.require("加载班级", self.stage() == WizardStage::Structure)?;
        self.resolver.load_classes(&self.session.selection).await
    }

    pub fn select_class(&mut self, class_id: i64) -> AppResult<()> {
        self.require("选择班级", self.stage() == WizardStage::Structure)?;
        self.resolver
            .select_class(&mut self.session.selection, class_id)
    }

    pub fn select_academic_year(&mut self, academic_year_id: i64) -> AppResult<()> {
        self.require("选择学年", self.stage() == WizardStage::Structure)?;
        self.resolver
            .select_academic_year(&mut self.session.selection, academic_year_id)
    }

    /// 确认结构选择，进入模板步骤
    pub fn confirm_structure(&mut self) -> AppResult<CompleteSelection> {
        self.require("确认结构", self.stage() == WizardStage::Structure)?;
        let selection = self.resolver.validate(&self.session.selection)?;
        info!("✓ 结构已确认 {}", selection);
        self.session.stage = WizardStage::Template;
        Ok(selection)
    }

    // ========== 第二步：模板 ==========

    pub async fn download_template(&self) -> AppResult<TemplateFile> {
        self.require("下载模板", self.stage() == WizardStage::Template)?;
        let selection = self.complete_selection()?;
        self.templates.provision(&selection).await
    }

    /// 进入上传步骤（模板可以不下载）
    pub fn proceed_to_upload(&mut self) -> AppResult<()> {
        self.require("进入上传", self.stage() == WizardStage::Template)?;
        self.session.stage = WizardStage::Upload(UploadStep::SelectFile);
        Ok(())
    }

    // ========== 第三步：上传、预览、提交 ==========

    /// 选择（或替换）文件；旧的预览随之失效
    pub fn select_file(&mut self, file: UploadedFile) -> AppResult<()> {
        self.require_upload_idle("选择文件")?;
        self.session.preparer.select_file(file)?;
        self.session.stage = WizardStage::Upload(UploadStep::SelectFile);
        Ok(())
    }

    pub async fn load_file(&mut self, path: impl AsRef<Path>) -> AppResult<()> {
        self.require_upload_idle("选择文件")?;
        self.session.preparer.load_file(path).await?;
        self.session.stage = WizardStage::Upload(UploadStep::SelectFile);
        Ok(())
    }

    /// 试运行校验
    pub async fn preview(&mut self) -> AppResult<&PreviewResult> {
        self.require_upload_idle("预览")?;
        let selection = self.complete_selection()?;
        let result = self.session.preparer.preview(&selection).await?;
        self.session.stage = WizardStage::Upload(UploadStep::Preview);
        Ok(result)
    }

    /// 提交按钮是否可用
    pub fn can_commit(&self) -> bool {
        if self.stage() != WizardStage::Upload(UploadStep::Preview)
            || self.commit_phase().is_in_flight()
        {
            return false;
        }
        match self.session.selection.validate() {
            Ok(selection) => self.session.preparer.can_commit(&selection),
            Err(_) => false,
        }
    }

    /// 正式导入
    ///
    /// 未通过预览时直接拒绝，不发起请求
    pub async fn commit(&mut self) -> AppResult<ImportJob> {
        if self.commit_phase().is_in_flight() {
            return Err(AppError::CommitAlreadyInProgress);
        }
        self.require("提交导入", matches!(self.stage(), WizardStage::Upload(_)))?;

        let selection = self.complete_selection()?;
        let file = self.session.preparer.authorize_commit(&selection)?;
        self.session.committer.commit(file, &selection).await
    }

    /// 订阅进度（提交后才有）
    pub fn progress(&self) -> Option<watch::Receiver<ImportJob>> {
        self.session.committer.subscribe()
    }

    pub fn current_job(&self) -> Option<ImportJob> {
        self.session.committer.job()
    }

    /// 等待导入结束；成功后进入结果步骤
    ///
    /// 失败时停留在上传步骤，可以直接重试提交
    pub async fn await_results(&mut self) -> AppResult<&ImportResults> {
        self.require("等待导入结果", matches!(self.stage(), WizardStage::Upload(_)))?;

        match self.session.committer.wait().await {
            Ok(results) => {
                info!(
                    "🎉 导入完成: 成功 {}/{}",
                    results.successful_imports, results.total_rows
                );
                self.session.stage = WizardStage::Results;
                Ok(self.session.results.insert(results))
            }
            Err(e) => {
                warn!("⚠️ 导入失败，可在当前步骤重试: {}", e);
                Err(e)
            }
        }
    }

    // ========== 重置 ==========

    /// 停止跟踪并清空所有数据，回到第一步
    pub fn reset(&mut self) {
        self.session.committer.cancel();
        self.resolver.clear();
        self.session = ImportSession::new(self.backend.clone(), self.settings);
        info!("🔄 向导已重置");
    }

    // ========== 辅助方法 ==========

    fn complete_selection(&self) -> AppResult<CompleteSelection> {
        Ok(self.session.selection.validate()?)
    }

    fn require(&self, action: &'static str, allowed: bool) -> AppResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(AppError::InvalidStage {
                action,
                stage: self.stage(),
            })
        }
    }

    /// 上传步骤内、且没有正在进行的提交
    fn require_upload_idle(&self, action: &'static str) -> AppResult<()> {
        self.require(action, matches!(self.stage(), WizardStage::Upload(_)))?;
        if self.commit_phase().is_in_flight() {
            return Err(AppError::CommitAlreadyInProgress);
        }
        Ok(())
    }
}
