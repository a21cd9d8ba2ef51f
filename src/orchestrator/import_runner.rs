//! 命令行导入运行器 - 编排层
//!
//! ## 职责
//!
//! 按配置驱动一次完整的向导运行，是二进制程序的入口。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建 API 客户端和向导
//! 2. **结构选择**：按配置选择阶段、年级、班级、学年
//! 3. **模板下载**：可选，保存到配置目录
//! 4. **预览与提交**：预览有错误时停止，否则提交并输出进度
//! 5. **结果输出**：统计信息与报告文件
//!
//! Ctrl-C 会重置向导，停止进度跟踪。

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::clients::SchoolApiClient;
use crate::config::Config;
use crate::models::ImportJob;
use crate::services::TrackerSettings;
use crate::utils::logging;
use crate::workflow::WizardController;

const TOTAL_STEPS: usize = 4;
const MAX_ERRORS_SHOWN: usize = 20;

/// 应用主结构
pub struct App {
    config: Config,
    wizard: WizardController,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        logging::init_report_file(&config.report_file)?;
        logging::log_startup(&config.api_base_url);

        let client = SchoolApiClient::new(&config)?;
        let wizard = WizardController::new(Arc::new(client), TrackerSettings::from(&config));

        Ok(Self { config, wizard })
    }

    /// 运行应用主逻辑
    pub async fn run(&mut self) -> Result<()> {
        // ========== 第 1 步：结构选择 ==========
        logging::log_stage(1, TOTAL_STEPS, "选择教育结构");
        self.select_structure().await?;

        // ========== 第 2 步：模板 ==========
        logging::log_stage(2, TOTAL_STEPS, "导入模板");
        if self.config.download_template {
            let template = self.wizard.download_template().await?;
            let path = template.save_to(&self.config.template_output_dir).await?;
            info!("💾 模板已保存: {}", path.display());
        } else {
            info!("跳过模板下载");
        }
        self.wizard.proceed_to_upload()?;

        // ========== 第 3 步：上传、预览、提交 ==========
        logging::log_stage(3, TOTAL_STEPS, "上传与预览");
        let Some(import_file) = self.config.import_file.clone() else {
            warn!("⚠️ 未配置 IMPORT_FILE，流程结束");
            return Ok(());
        };

        self.wizard
            .load_file(&import_file)
            .await
            .with_context(|| format!("无法读取导入文件: {}", import_file))?;

        let preview = self.wizard.preview().await?;
        logging::log_preview(preview, MAX_ERRORS_SHOWN);

        if !self.wizard.can_commit() {
            warn!("⚠️ 预览未通过，请修正文件后重新运行");
            return Ok(());
        }

        let job = self.wizard.commit().await?;
        info!("📤 导入已提交: {}", job.status_message);

        if let Some(progress) = self.wizard.progress() {
            tokio::spawn(log_progress(progress));
        }

        let outcome = tokio::select! {
            outcome = self.wizard.await_results() => Some(outcome.map(|r| r.clone())),
            _ = tokio::signal::ctrl_c() => None,
        };

        let results = match outcome {
            Some(outcome) => outcome?,
            None => {
                warn!("🛑 收到中断信号，已取消导入跟踪");
                self.wizard.reset();
                return Ok(());
            }
        };

        // ========== 第 4 步：结果 ==========
        logging::log_stage(4, TOTAL_STEPS, "导入结果");
        logging::append_results_to_report(&self.config.report_file, &results)?;
        logging::print_final_stats(&results, &self.config.report_file);

        Ok(())
    }

    /// 按配置完成结构选择
    async fn select_structure(&mut self) -> Result<()> {
        self.wizard.load_catalog().await?;

        if let Some(level_id) = self.config.level_id {
            self.wizard.select_level(level_id)?;
        }
        if let Some(grade_id) = self.config.grade_id {
            self.wizard.select_grade(grade_id)?;
            let classes = self.wizard.load_classes().await?;
            info!("年级 #{} 下共 {} 个班级", grade_id, classes.len());
        }
        if let Some(class_id) = self.config.class_id {
            self.wizard.select_class(class_id)?;
        }

        let academic_year_id = self.config.academic_year_id.or_else(|| {
            self.wizard
                .resolver()
                .current_academic_year()
                .map(|year| year.id)
        });
        if let Some(academic_year_id) = academic_year_id {
            self.wizard.select_academic_year(academic_year_id)?;
        }

        self.wizard.confirm_structure()?;
        Ok(())
    }
}

/// 输出进度直到任务结束
async fn log_progress(mut progress: watch::Receiver<ImportJob>) {
    while progress.changed().await.is_ok() {
        let job = progress.borrow_and_update().clone();
        info!("⏳ [{:>3}%] {}", job.progress_percent, job.status_message);
        if job.is_terminal() {
            break;
        }
    }
}
