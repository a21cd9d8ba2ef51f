//! 导入后端接口
//!
//! 导入流程依赖的全部外部能力都在这里声明，流程代码不直接接触 HTTP

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    AcademicYear, CommitResponse, CompleteSelection, EducationLevel, JobStatus, Page,
    PreviewResult, SchoolClass, UploadedFile,
};

/// 模板下载的原始响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDownload {
    pub bytes: Vec<u8>,
    /// `Content-Disposition` 响应头（如果有）
    pub content_disposition: Option<String>,
}

/// 导入后端
///
/// 预览与提交在服务端是同一个接口，只靠 `preview` 标志区分
#[async_trait]
pub trait ImportBackend: Send + Sync {
    /// 教育阶段列表（内嵌年级）
    async fn education_levels(&self) -> AppResult<Page<EducationLevel>>;

    /// 学年列表
    async fn academic_years(&self) -> AppResult<Page<AcademicYear>>;

    /// 按年级查询班级
    async fn classes_for_grade(&self, grade_id: i64) -> AppResult<Page<SchoolClass>>;

    /// 下载与结构对应的导入模板
    async fn download_template(&self, selection: &CompleteSelection)
        -> AppResult<TemplateDownload>;

    /// 试运行校验，不落库
    async fn preview_import(
        &self,
        file: &UploadedFile,
        selection: &CompleteSelection,
    ) -> AppResult<PreviewResult>;

    /// 正式导入
    async fn commit_import(
        &self,
        file: &UploadedFile,
        selection: &CompleteSelection,
    ) -> AppResult<CommitResponse>;

    /// 查询任务进度
    async fn job_status(&self, job_id: &str) -> AppResult<JobStatus>;
}
