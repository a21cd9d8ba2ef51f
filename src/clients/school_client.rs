/// 学校管理 API 客户端
///
/// 封装所有与导入相关的 HTTP 调用
use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clients::backend::{ImportBackend, TemplateDownload};
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, ConfigError};
use crate::models::{
    AcademicYear, CommitResponse, CompleteSelection, EducationLevel, JobStatus, Page,
    PreviewResult, SchoolClass, UploadedFile,
};
use crate::utils::logging::truncate_text;

const LEVELS_PATH: &str = "academic/education-levels/";
const ACADEMIC_YEARS_PATH: &str = "academic/academic-years/";
const CLASSES_PATH: &str = "academic/classes/";
const TEMPLATE_PATH: &str = "students/import/template/";
const IMPORT_PATH: &str = "students/import/";
const PROGRESS_PATH: &str = "students/import/progress";

/// 跟随 `next` 翻页的上限
const MAX_PAGES: usize = 100;

/// 学校管理 API 客户端
pub struct SchoolApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl SchoolApiClient {
    /// 创建新的客户端
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.authorized(self.http.request(method, self.url(path)))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// 发送请求并解析 JSON 响应
    async fn send_json(&self, endpoint: &str, request: RequestBuilder) -> AppResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        debug!("{} -> {} ({} 字节)", endpoint, status, body.len());

        if !status.is_success() {
            return Err(ApiError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: extract_server_message(&body)
                    .unwrap_or_else(|| status.to_string()),
            }
            .into());
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|source| {
            ApiError::JsonParseFailed {
                endpoint: endpoint.to_string(),
                source,
            }
            .into()
        })
    }

    /// 分页的 `next` 可能是绝对地址，也可能是相对地址
    fn next_url(&self, next: &str) -> Option<Url> {
        Url::parse(&format!("{}/", self.base_url))
            .and_then(|base| base.join(next))
            .ok()
    }

    /// 读取集合，并跟随 `next` 读完所有分页
    async fn get_all<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> AppResult<Page<T>> {
        let mut page: Page<T> = self.get_page(endpoint, request).await?;
        let mut fetched = 1;

        while let Some(next) = page.next.clone() {
            if fetched >= MAX_PAGES {
                warn!("⚠️ {} 分页超过 {} 页，后续数据未加载", endpoint, MAX_PAGES);
                break;
            }
            let Some(url) = self.next_url(&next) else {
                warn!("⚠️ {} 返回了无法解析的分页地址: {}", endpoint, next);
                break;
            };
            debug!("{} 读取下一页: {}", endpoint, url);
            let request = self.authorized(self.http.get(url));
            let more = self.get_page(endpoint, request).await?;
            page.append(more);
            fetched += 1;
        }

        Ok(page)
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> AppResult<Page<T>> {
        let value = self.send_json(endpoint, request).await?;
        Page::from_value(value).map_err(|source| {
            ApiError::JsonParseFailed {
                endpoint: endpoint.to_string(),
                source,
            }
            .into()
        })
    }

    /// 构建导入表单（预览与提交共用）
    fn import_form(file: &UploadedFile, selection: &CompleteSelection, preview: bool) -> Form {
        let part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        let mut form = Form::new().part("file", part);
        for (key, value) in selection.as_params() {
            form = form.text(key, value);
        }
        form.text("preview", preview.to_string())
    }

    async fn post_import(
        &self,
        file: &UploadedFile,
        selection: &CompleteSelection,
        preview: bool,
    ) -> AppResult<Value> {
        debug!(
            "提交导入表单: 文件 {} ({} 字节), 结构 {}, preview={}",
            file.name,
            file.size_bytes(),
            selection,
            preview
        );
        let request = self
            .request(Method::POST, IMPORT_PATH)
            .multipart(Self::import_form(file, selection, preview));
        self.send_json(IMPORT_PATH, request).await
    }
}

#[async_trait]
impl ImportBackend for SchoolApiClient {
    async fn education_levels(&self) -> AppResult<Page<EducationLevel>> {
        self.get_all(LEVELS_PATH, self.request(Method::GET, LEVELS_PATH))
            .await
    }

    async fn academic_years(&self) -> AppResult<Page<AcademicYear>> {
        self.get_all(
            ACADEMIC_YEARS_PATH,
            self.request(Method::GET, ACADEMIC_YEARS_PATH),
        )
        .await
    }

    async fn classes_for_grade(&self, grade_id: i64) -> AppResult<Page<SchoolClass>> {
        let request = self
            .request(Method::GET, CLASSES_PATH)
            .query(&[("grade", grade_id)]);
        self.get_all(CLASSES_PATH, request).await
    }

    async fn download_template(
        &self,
        selection: &CompleteSelection,
    ) -> AppResult<TemplateDownload> {
        let response = self
            .request(Method::GET, TEMPLATE_PATH)
            .query(&selection.as_params())
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(TEMPLATE_PATH, e))?;

        let status = response.status();
        let content_disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::api_request_failed(TEMPLATE_PATH, e))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(ApiError::BadResponse {
                endpoint: TEMPLATE_PATH.to_string(),
                status: status.as_u16(),
                message: extract_server_message(&body).unwrap_or_else(|| status.to_string()),
            }
            .into());
        }

        Ok(TemplateDownload {
            bytes: bytes.to_vec(),
            content_disposition,
        })
    }

    async fn preview_import(
        &self,
        file: &UploadedFile,
        selection: &CompleteSelection,
    ) -> AppResult<PreviewResult> {
        let value = self.post_import(file, selection, true).await?;
        serde_json::from_value(value).map_err(|source| {
            ApiError::JsonParseFailed {
                endpoint: IMPORT_PATH.to_string(),
                source,
            }
            .into()
        })
    }

    async fn commit_import(
        &self,
        file: &UploadedFile,
        selection: &CompleteSelection,
    ) -> AppResult<CommitResponse> {
        let value = self.post_import(file, selection, false).await?;
        CommitResponse::from_value(value).map_err(|source| {
            ApiError::JsonParseFailed {
                endpoint: IMPORT_PATH.to_string(),
                source,
            }
            .into()
        })
    }

    async fn job_status(&self, job_id: &str) -> AppResult<JobStatus> {
        let path = format!("{}/{}/", PROGRESS_PATH, job_id);
        let value = self
            .send_json(&path, self.request(Method::GET, &path))
            .await?;
        serde_json::from_value(value).map_err(|source| {
            ApiError::JsonParseFailed {
                endpoint: path,
                source,
            }
            .into()
        })
    }
}

/// 从错误响应体中提取服务端的错误信息
///
/// 依次尝试 `error`、`detail`、`message` 字段；非 JSON 时截断原文
pub fn extract_server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ["error", "detail", "message"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
            .or_else(|| Some(truncate_text(trimmed, 200))),
        Err(_) => Some(truncate_text(trimmed, 200)),
    }
}
