//! 导入提交服务 - 业务能力层
//!
//! 发起正式导入，并把结果交给进度跟踪
//!
//! 每次提交的状态机：
//! `Idle → Submitting → {Tracking | Simulating} → {Completed | Failed}`

use std::fmt::{self, Display};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::clients::ImportBackend;
use crate::error::{AppError, AppResult};
use crate::models::{CompleteSelection, ImportJob, ImportResults, UploadedFile};
use crate::services::progress_tracker::{
    ProgressTracker, TrackerHandle, TrackerSettings, TrackingStrategy,
};

/// 提交阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    Idle,
    Submitting,
    /// 有任务ID，轮询中
    Tracking,
    /// 无任务ID，按节奏展示已知结果
    Simulating,
    Completed,
    Failed,
}

impl CommitPhase {
    /// 是否有提交正在进行
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            CommitPhase::Submitting | CommitPhase::Tracking | CommitPhase::Simulating
        )
    }
}

impl Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommitPhase::Idle => "空闲",
            CommitPhase::Submitting => "提交中",
            CommitPhase::Tracking => "跟踪中",
            CommitPhase::Simulating => "进度展示中",
            CommitPhase::Completed => "已完成",
            CommitPhase::Failed => "失败",
        };
        f.write_str(label)
    }
}

/// 提交请求期间的阶段守卫
///
/// 请求未返回就被丢弃时，阶段回到 `Failed`，允许直接重试
struct SubmitGuard<'a> {
    phase: &'a mut CommitPhase,
    last_error: &'a mut Option<String>,
    armed: bool,
}

impl<'a> SubmitGuard<'a> {
    fn begin(phase: &'a mut CommitPhase, last_error: &'a mut Option<String>) -> Self {
        *phase = CommitPhase::Submitting;
        Self {
            phase,
            last_error,
            armed: true,
        }
    }

    /// 请求已返回，由调用方接管阶段
    fn finish(mut self) {
        self.armed = false;
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("⚠️ 提交请求被中断，服务端是否已受理未知");
            *self.phase = CommitPhase::Failed;
            *self.last_error = Some(SUBMIT_INTERRUPTED.to_string());
        }
    }
}

const SUBMIT_INTERRUPTED: &str = "提交请求被中断";

/// 导入提交服务
///
/// 职责：
/// - 同一时间最多一个提交
/// - 持有当前任务的跟踪句柄
/// - 失败后清空本地提交状态，允许直接重试
pub struct ImportCommitter {
    backend: Arc<dyn ImportBackend>,
    tracker: ProgressTracker,
    phase: CommitPhase,
    active: Option<TrackerHandle>,
    last_error: Option<String>,
}

impl ImportCommitter {
    pub fn new(backend: Arc<dyn ImportBackend>, settings: TrackerSettings) -> Self {
        Self {
            tracker: ProgressTracker::new(backend.clone(), settings),
            backend,
            phase: CommitPhase::Idle,
            active: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> CommitPhase {
        self.phase
    }

    /// 最近一次失败的提示信息
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 发起正式导入
    ///
    /// 立即返回初始任务快照，最终结果通过 [`wait`](Self::wait) 获得
    pub async fn commit(
        &mut self,
        file: &UploadedFile,
        selection: &CompleteSelection,
    ) -> AppResult<ImportJob> {
        if self.phase.is_in_flight() {
            warn!("已有导入正在进行 ({})，拒绝新的提交", self.phase);
            return Err(AppError::CommitAlreadyInProgress);
        }

        self.last_error = None;
        info!("📤 正在提交导入: {} {}", file.name, selection);

        let guard = SubmitGuard::begin(&mut self.phase, &mut self.last_error);
        let submitted = self.backend.commit_import(file, selection).await;
        guard.finish();

        let response = match submitted {
            Ok(response) => response,
            Err(e) => {
                let message = e.user_message();
                error!("❌ 提交导入失败: {}", e);
                self.fail(message.clone());
                return Err(AppError::CommitTransport { message });
            }
        };

        let strategy = match response.job_id {
            Some(job_id) => {
                info!("✓ 后端已创建导入任务 {}", job_id);
                self.phase = CommitPhase::Tracking;
                TrackingStrategy::Polling {
                    job_id,
                    fallback: response.results,
                }
            }
            None => {
                self.phase = CommitPhase::Simulating;
                TrackingStrategy::PacedCompletion {
                    results: response.results,
                }
            }
        };

        let handle = self.tracker.spawn(strategy);
        let snapshot = handle.snapshot();
        self.active = Some(handle);
        Ok(snapshot)
    }

    /// 订阅当前任务的进度
    pub fn subscribe(&self) -> Option<watch::Receiver<ImportJob>> {
        self.active.as_ref().map(TrackerHandle::subscribe)
    }

    /// 当前任务快照
    pub fn job(&self) -> Option<ImportJob> {
        self.active.as_ref().map(TrackerHandle::snapshot)
    }

    /// 等待当前任务结束
    pub async fn wait(&mut self) -> AppResult<ImportResults> {
        let outcome = match self.active.as_mut() {
            Some(handle) => handle.outcome().await,
            None => return Err(AppError::Cancelled),
        };

        match outcome {
            Ok(results) => {
                self.phase = CommitPhase::Completed;
                self.active = None;
                Ok(results)
            }
            Err(e) => {
                error!("❌ 导入未完成: {}", e);
                self.fail(e.user_message());
                Err(e)
            }
        }
    }

    /// 立即停止跟踪并回到空闲
    pub fn cancel(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel();
            info!("🛑 已取消导入进度跟踪");
        }
        self.phase = CommitPhase::Idle;
        self.last_error = None;
    }

    fn fail(&mut self, message: String) {
        if let Some(handle) = self.active.take() {
            handle.cancel();
        }
        self.phase = CommitPhase::Failed;
        self.last_error = Some(message);
    }
}
