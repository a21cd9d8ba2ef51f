//! 测试用的内存后端
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use student_import::error::ApiError;
use student_import::models::{
    AcademicYear, CommitResponse, CompleteSelection, EducationLevel, Grade, ImportResults,
    ImportedRecord, JobStatus, Page, PreviewResult, RowError, SchoolClass, UploadedFile,
};
use student_import::{AppError, AppResult, ImportBackend, TemplateDownload, TrackerSettings, WizardController};

/// 提交接口的行为
#[derive(Debug, Clone)]
pub enum CommitMode {
    /// 返回任务ID，进度靠轮询
    WithJob(String),
    /// 同步返回结果，没有任务ID
    Synchronous,
    /// 传输失败
    Fail(String),
}

/// 一次轮询的脚本
#[derive(Debug, Clone)]
pub enum PollScript {
    Status(JobStatus),
    Fail,
}

pub fn running(progress: f64, message: &str) -> PollScript {
    PollScript::Status(JobStatus {
        progress,
        current_status: message.to_string(),
        ..Default::default()
    })
}

pub fn finished(successful: u32) -> PollScript {
    PollScript::Status(JobStatus {
        progress: 100.0,
        current_status: "完成".to_string(),
        completed: true,
        results: Some(ImportResults {
            total_rows: successful,
            successful_imports: successful,
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn failed(message: &str) -> PollScript {
    PollScript::Status(JobStatus {
        progress: 40.0,
        error: Some(message.to_string()),
        ..Default::default()
    })
}

struct FakeState {
    commit_mode: CommitMode,
    polls: VecDeque<PollScript>,
    last_status: JobStatus,
    template_error: Option<String>,
    content_disposition: Option<String>,
    persisted_students: u32,
}

/// 内存后端
///
/// 文件内容按行当作数据行，包含 `BAD` 的行会产生行级错误
pub struct FakeBackend {
    state: Mutex<FakeState>,
    poll_latency: Mutex<Duration>,
    commit_latency: Mutex<Duration>,
    pub preview_calls: AtomicUsize,
    pub commit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub template_calls: AtomicUsize,
    polls_in_flight: AtomicUsize,
    pub max_polls_in_flight: AtomicUsize,
}

impl FakeBackend {
    pub fn new(commit_mode: CommitMode) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                commit_mode,
                polls: VecDeque::new(),
                last_status: JobStatus {
                    current_status: "排队中".to_string(),
                    ..Default::default()
                },
                template_error: None,
                content_disposition: None,
                persisted_students: 0,
            }),
            poll_latency: Mutex::new(Duration::ZERO),
            commit_latency: Mutex::new(Duration::ZERO),
            preview_calls: AtomicUsize::new(0),
            commit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            template_calls: AtomicUsize::new(0),
            polls_in_flight: AtomicUsize::new(0),
            max_polls_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn script_polls(&self, polls: impl IntoIterator<Item = PollScript>) {
        self.state.lock().unwrap().polls.extend(polls);
    }

    pub fn set_commit_mode(&self, mode: CommitMode) {
        self.state.lock().unwrap().commit_mode = mode;
    }

    pub fn set_template_error(&self, message: &str) {
        self.state.lock().unwrap().template_error = Some(message.to_string());
    }

    pub fn set_content_disposition(&self, header: &str) {
        self.state.lock().unwrap().content_disposition = Some(header.to_string());
    }

    pub fn set_poll_latency(&self, latency: Duration) {
        *self.poll_latency.lock().unwrap() = latency;
    }

    pub fn set_commit_latency(&self, latency: Duration) {
        *self.commit_latency.lock().unwrap() = latency;
    }

    pub fn persisted_students(&self) -> u32 {
        self.state.lock().unwrap().persisted_students
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn validate(file: &UploadedFile) -> PreviewResult {
        let text = String::from_utf8_lossy(&file.bytes);
        let rows: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let errors = rows
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains("BAD"))
            .map(|(i, _)| RowError {
                row: Some(i as u32 + 2),
                error: "缺少学生姓名".to_string(),
            })
            .collect();
        PreviewResult {
            total_rows: rows.len() as u32,
            processed_rows: rows.len() as u32,
            errors,
            warnings: Vec::new(),
            sample_rows: rows.iter().take(3).map(|l| json!({ "raw": l })).collect(),
        }
    }
}

#[async_trait]
impl ImportBackend for FakeBackend {
    async fn education_levels(&self) -> AppResult<Page<EducationLevel>> {
        Ok(Page::from_items(vec![
            EducationLevel {
                id: 1,
                name: "小学".to_string(),
                grades: vec![
                    Grade { id: 3, name: "三年级".to_string() },
                    Grade { id: 4, name: "四年级".to_string() },
                ],
            },
            EducationLevel {
                id: 2,
                name: "初中".to_string(),
                grades: vec![Grade { id: 8, name: "初二".to_string() }],
            },
        ]))
    }

    async fn academic_years(&self) -> AppResult<Page<AcademicYear>> {
        Ok(Page::from_items(vec![
            AcademicYear { id: 2024, name: "2024-2025".to_string(), is_current: true },
            AcademicYear { id: 2025, name: "2025-2026".to_string(), is_current: false },
        ]))
    }

    async fn classes_for_grade(&self, grade_id: i64) -> AppResult<Page<SchoolClass>> {
        let all = vec![
            SchoolClass { id: 7, name: "三年级一班".to_string(), grade_id: Some(3) },
            SchoolClass { id: 9, name: "三年级二班".to_string(), grade_id: Some(3) },
            SchoolClass { id: 11, name: "四年级一班".to_string(), grade_id: Some(4) },
        ];
        Ok(Page::from_items(
            all.into_iter().filter(|c| c.grade_id == Some(grade_id)).collect(),
        ))
    }

    async fn download_template(
        &self,
        _selection: &CompleteSelection,
    ) -> AppResult<TemplateDownload> {
        self.template_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.template_error {
            return Err(ApiError::BadResponse {
                endpoint: "students/import/template/".to_string(),
                status: 500,
                message: message.clone(),
            }
            .into());
        }
        Ok(TemplateDownload {
            bytes: b"name,parent\n".to_vec(),
            content_disposition: state.content_disposition.clone(),
        })
    }

    async fn preview_import(
        &self,
        file: &UploadedFile,
        _selection: &CompleteSelection,
    ) -> AppResult<PreviewResult> {
        self.preview_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::validate(file))
    }

    async fn commit_import(
        &self,
        file: &UploadedFile,
        _selection: &CompleteSelection,
    ) -> AppResult<CommitResponse> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.commit_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let preview = Self::validate(file);
        let mut state = self.state.lock().unwrap();

        match state.commit_mode.clone() {
            CommitMode::Fail(message) => Err(ApiError::BadResponse {
                endpoint: "students/import/".to_string(),
                status: 502,
                message,
            }
            .into()),
            CommitMode::WithJob(job_id) => {
                state.persisted_students += preview.total_rows;
                Ok(CommitResponse {
                    job_id: Some(job_id),
                    results: ImportResults {
                        total_rows: preview.total_rows,
                        ..Default::default()
                    },
                })
            }
            CommitMode::Synchronous => {
                state.persisted_students += preview.total_rows;
                let created_students = (0..preview.total_rows)
                    .map(|i| ImportedRecord {
                        id: Some(i as i64 + 1),
                        name: Some(format!("学生{}", i + 1)),
                        extra: Map::new(),
                    })
                    .collect();
                Ok(CommitResponse {
                    job_id: None,
                    results: ImportResults {
                        total_rows: preview.total_rows,
                        successful_imports: preview.total_rows,
                        created_students,
                        ..Default::default()
                    },
                })
            }
        }
    }

    async fn job_status(&self, _job_id: &str) -> AppResult<JobStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.polls_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_polls_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let latency = *self.poll_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.polls_in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        match state.polls.pop_front() {
            Some(PollScript::Status(status)) => {
                state.last_status = status.clone();
                Ok(status)
            }
            Some(PollScript::Fail) => Err(AppError::Api(ApiError::BadResponse {
                endpoint: "students/import/progress".to_string(),
                status: 503,
                message: "Service Unavailable".to_string(),
            })),
            None => Ok(state.last_status.clone()),
        }
    }
}

pub fn settings() -> TrackerSettings {
    TrackerSettings {
        poll_interval: Duration::from_secs(1),
        max_polls: 10,
        simulation_step: Duration::from_millis(600),
    }
}

/// 50 行干净数据
pub fn clean_file(rows: usize) -> UploadedFile {
    let body: String = (0..rows).map(|i| format!("学生{},家长{}\n", i, i)).collect();
    UploadedFile::new("students.xlsx", body.into_bytes())
}

/// 第二行有错误的文件
pub fn file_with_error() -> UploadedFile {
    UploadedFile::new(
        "students.xlsx",
        "学生1,家长1\nBAD,家长2\n学生3,家长3\n".as_bytes().to_vec(),
    )
}

/// 选好 {阶段 1, 年级 3, 班级 7, 学年 2024} 并进入上传步骤
pub async fn wizard_at_upload(backend: Arc<FakeBackend>) -> WizardController {
    let mut wizard = WizardController::new(backend, settings());
    wizard.load_catalog().await.unwrap();
    wizard.select_level(1).unwrap();
    wizard.select_grade(3).unwrap();
    wizard.load_classes().await.unwrap();
    wizard.select_class(7).unwrap();
    wizard.select_academic_year(2024).unwrap();
    wizard.confirm_structure().unwrap();
    wizard.proceed_to_upload().unwrap();
    wizard
}
