//! 进度跟踪服务 - 业务能力层
//!
//! 两种互斥的策略，在提交时选定后不再切换：
//! - 轮询：后端返回了任务ID，按固定间隔查询任务状态
//! - 节奏化完成：后端同步返回了结果但没有任务ID，按固定阶段推进进度条，
//!   最后展示已经拿到的结果
//!
//! 跟踪在独立任务中运行，状态只通过 `watch` 通道对外发布。
//! 取消令牌在每个挂起点都会被检查，取消后不会再发布任何更新。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::ImportBackend;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{ImportJob, ImportResults, JobStatus};

/// 节奏化完成的固定阶段：(百分比, 提示)
pub const PACED_PHASES: [(u8, &str); 5] = [
    (10, "正在验证文件格式..."),
    (30, "正在解析学生数据..."),
    (50, "正在创建学生档案..."),
    (70, "正在创建家长档案..."),
    (90, "正在关联班级与学年..."),
];

const SUBMITTED_MESSAGE: &str = "导入已提交，等待处理...";
const COMPLETED_MESSAGE: &str = "导入完成";

/// 跟踪参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// 节奏化完成时每个阶段的停留时间
    pub simulation_step: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_polls: 600,
            simulation_step: Duration::from_millis(600),
        }
    }
}

impl From<&Config> for TrackerSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls.max(1),
            simulation_step: Duration::from_millis(config.simulation_step_ms),
        }
    }
}

/// 跟踪策略
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingStrategy {
    /// 轮询任务状态；`fallback` 为提交响应中的结果，任务完成但未回传结果时使用
    Polling {
        job_id: String,
        fallback: ImportResults,
    },
    /// 结果已知，只负责控制展示节奏
    PacedCompletion { results: ImportResults },
}

impl TrackingStrategy {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            TrackingStrategy::Polling { job_id, .. } => Some(job_id),
            TrackingStrategy::PacedCompletion { .. } => None,
        }
    }

    pub fn is_polling(&self) -> bool {
        matches!(self, TrackingStrategy::Polling { .. })
    }
}

/// 正在运行的跟踪任务
pub struct TrackerHandle {
    cancel: CancellationToken,
    progress: watch::Receiver<ImportJob>,
    task: Option<JoinHandle<AppResult<ImportResults>>>,
}

impl TrackerHandle {
    /// 订阅进度
    pub fn subscribe(&self) -> watch::Receiver<ImportJob> {
        self.progress.clone()
    }

    /// 当前进度快照
    pub fn snapshot(&self) -> ImportJob {
        self.progress.borrow().clone()
    }

    /// 立即停止跟踪；返回后不会再有任何进度更新
    pub fn cancel(&self) {
        self.cancel.cancel();
        // 读锁会等待正在写入的发布结束，之后的发布都能看到取消
        drop(self.progress.borrow());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 等待跟踪结束
    ///
    /// 等待本身可以被丢弃（超时、`select!`），跟踪任务不受影响，之后可以再次等待
    pub async fn outcome(&mut self) -> AppResult<ImportResults> {
        let task = self.task.as_mut().ok_or(AppError::Cancelled)?;
        let joined = task.await;
        self.task = None;
        match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(AppError::Cancelled),
            Err(e) => Err(AppError::Job {
                message: format!("进度跟踪任务异常退出: {}", e),
            }),
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 进度跟踪服务
pub struct ProgressTracker {
    backend: Arc<dyn ImportBackend>,
    settings: TrackerSettings,
}

impl ProgressTracker {
    pub fn new(backend: Arc<dyn ImportBackend>, settings: TrackerSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> TrackerSettings {
        self.settings
    }

    /// 启动跟踪任务
    pub fn spawn(&self, strategy: TrackingStrategy) -> TrackerHandle {
        let job = ImportJob::new(strategy.job_id().map(str::to_string), SUBMITTED_MESSAGE);
        let (tx, rx) = watch::channel(job);
        let cancel = CancellationToken::new();

        let run = TrackerRun {
            backend: self.backend.clone(),
            settings: self.settings,
            cancel: cancel.clone(),
            tx,
        };
        let task = tokio::spawn(run.execute(strategy));

        TrackerHandle {
            cancel,
            progress: rx,
            task: Some(task),
        }
    }
}

/// 跟踪任务内部状态
struct TrackerRun {
    backend: Arc<dyn ImportBackend>,
    settings: TrackerSettings,
    cancel: CancellationToken,
    tx: watch::Sender<ImportJob>,
}

impl TrackerRun {
    async fn execute(self, strategy: TrackingStrategy) -> AppResult<ImportResults> {
        match strategy {
            TrackingStrategy::Polling { job_id, fallback } => self.poll(&job_id, fallback).await,
            TrackingStrategy::PacedCompletion { results } => self.pace(results).await,
        }
    }

    /// 轮询任务状态，请求严格串行
    async fn poll(&self, job_id: &str, fallback: ImportResults) -> AppResult<ImportResults> {
        info!("📡 开始轮询导入任务 {}", job_id);

        for attempt in 1..=self.settings.max_polls {
            self.pause(self.settings.poll_interval).await?;

            let status = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
                status = self.backend.job_status(job_id) => status,
            };

            match status {
                Ok(status) => {
                    if let Some(outcome) = self.apply_status(status, &fallback)? {
                        return outcome;
                    }
                }
                Err(e) => {
                    // 单次失败不终止跟踪
                    warn!(
                        "⚠️ 查询任务 {} 进度失败 (第 {}/{} 次): {}",
                        job_id, attempt, self.settings.max_polls, e
                    );
                }
            }
        }

        let message = format!(
            "任务 {} 在 {} 次轮询后仍未结束",
            job_id, self.settings.max_polls
        );
        self.publish(|job| job.fail(message))?;
        Err(AppError::JobTimeout {
            polls: self.settings.max_polls,
        })
    }

    /// 处理一次状态响应；返回 `Some` 表示任务已终结
    fn apply_status(
        &self,
        status: JobStatus,
        fallback: &ImportResults,
    ) -> AppResult<Option<AppResult<ImportResults>>> {
        let percent = status.progress.clamp(0.0, 100.0).round() as u8;
        debug!(
            "任务进度: {}% {} completed={} error={:?}",
            percent, status.current_status, status.completed, status.error
        );

        if let Some(message) = status.error.filter(|m| !m.trim().is_empty()) {
            warn!("❌ 导入任务报告失败: {}", message);
            let published = message.clone();
            self.publish(|job| job.fail(published))?;
            return Ok(Some(Err(AppError::Job { message })));
        }

        if status.completed {
            let results = status.results.unwrap_or_else(|| fallback.clone());
            info!(
                "✓ 导入任务完成: 成功 {}/{}",
                results.successful_imports, results.total_rows
            );
            let published = results.clone();
            self.publish(|job| job.complete(published, COMPLETED_MESSAGE))?;
            return Ok(Some(Ok(results)));
        }

        let message = if status.current_status.is_empty() {
            self.tx.borrow().status_message.clone()
        } else {
            status.current_status
        };
        self.publish(|job| job.advance(percent, message))?;
        Ok(None)
    }

    /// 按固定阶段推进，最后用已知结果完成
    async fn pace(&self, results: ImportResults) -> AppResult<ImportResults> {
        info!("⏳ 后端未返回任务ID，按固定节奏展示进度");

        for (percent, message) in PACED_PHASES {
            self.publish(|job| job.advance(percent, message))?;
            self.pause(self.settings.simulation_step).await?;
        }

        let published = results.clone();
        self.publish(|job| job.complete(published, COMPLETED_MESSAGE))?;
        Ok(results)
    }

    /// 可取消的等待
    async fn pause(&self, duration: Duration) -> AppResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// 发布一次更新；已取消则拒绝
    ///
    /// 取消状态在持有写锁时检查，与 [`TrackerHandle::cancel`] 不会交错
    fn publish(&self, update: impl FnOnce(&mut ImportJob) -> bool) -> AppResult<()> {
        let mut cancelled = false;
        self.tx.send_if_modified(|job| {
            if self.cancel.is_cancelled() {
                cancelled = true;
                return false;
            }
            update(job)
        });
        if cancelled {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}
