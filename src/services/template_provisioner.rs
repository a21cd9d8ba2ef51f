//! 模板下载服务 - 业务能力层
//!
//! 单次请求/响应，不跟踪任务，不自动重试

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::ImportBackend;
use crate::error::{AppError, AppResult};
use crate::models::CompleteSelection;

static EXTENDED_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\*\s*=\s*(?:UTF-8|utf-8)?''([^;]+)"#).expect("静态正则")
});

static PLAIN_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]*)"|([^;]+))"#).expect("静态正则")
});

/// 下载得到的模板文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl TemplateFile {
    /// 保存到目录，返回完整路径
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> AppResult<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::io(dir.display().to_string(), e))?;

        // 只取最后一段，文件不会写到目录之外
        let file_name = safe_file_name(&self.file_name)
            .unwrap_or_else(|| fallback_template_name(chrono::Local::now().date_naive()));
        let path = dir.join(file_name);
        tokio::fs::write(&path, &self.bytes)
            .await
            .map_err(|e| AppError::io(path.display().to_string(), e))?;
        Ok(path)
    }
}

/// 模板下载服务
pub struct TemplateProvisioner {
    backend: Arc<dyn ImportBackend>,
}

impl TemplateProvisioner {
    pub fn new(backend: Arc<dyn ImportBackend>) -> Self {
        Self { backend }
    }

    /// 下载与所选结构对应的模板
    pub async fn provision(&self, selection: &CompleteSelection) -> AppResult<TemplateFile> {
        let download = self
            .backend
            .download_template(selection)
            .await
            .map_err(|e| {
                warn!("模板下载失败 {}: {}", selection, e);
                AppError::TemplateUnavailable {
                    message: e.user_message(),
                }
            })?;

        let file_name = download
            .content_disposition
            .as_deref()
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| fallback_template_name(chrono::Local::now().date_naive()));

        info!("✓ 模板已下载: {} ({} 字节)", file_name, download.bytes.len());

        Ok(TemplateFile {
            file_name,
            bytes: download.bytes,
        })
    }
}

/// 从 `Content-Disposition` 中解析文件名
///
/// `filename*=UTF-8''...` 优先于 `filename=`
///
/// 只保留路径的最后一段；`..`、空名等无法使用时返回 `None`
pub fn filename_from_disposition(header: &str) -> Option<String> {
    if let Some(cap) = EXTENDED_FILENAME.captures(header) {
        let name = percent_decode(cap[1].trim().trim_matches('"'));
        if let Some(name) = safe_file_name(&name) {
            return Some(name);
        }
    }

    let cap = PLAIN_FILENAME.captures(header)?;
    let name = cap.get(1).or_else(|| cap.get(2))?.as_str();
    safe_file_name(name)
}

/// 去掉目录部分（`/` 与 `\\` 都视为分隔符）
fn safe_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(|c| c == '/' || c == '\\').next()?.trim();
    match last {
        "" | "." | ".." => None,
        _ => Some(last.to_string()),
    }
}

/// 没有响应头时的文件名，包含当天日期
pub fn fallback_template_name(today: NaiveDate) -> String {
    format!("student_import_template_{}.xlsx", today.format("%Y-%m-%d"))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_filename() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="plantilla_1_3_7.xlsx""#).as_deref(),
            Some("plantilla_1_3_7.xlsx")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=template.xlsx; size=10").as_deref(),
            Some("template.xlsx")
        );
    }

    #[test]
    fn test_extended_filename_wins() {
        let header = "attachment; filename=\"fallback.xlsx\"; filename*=UTF-8''%E5%AD%A6%E7%94%9F.xlsx";
        assert_eq!(
            filename_from_disposition(header).as_deref(),
            Some("学生.xlsx")
        );
    }

    #[test]
    fn test_no_filename() {
        assert_eq!(filename_from_disposition("attachment"), None);
        assert_eq!(filename_from_disposition(r#"attachment; filename="""#), None);
    }

    #[test]
    fn test_fallback_name_has_date() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        assert_eq!(
            fallback_template_name(date),
            "student_import_template_2024-09-01.xlsx"
        );
    }

    #[test]
    fn test_disposition_path_is_stripped() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../escaped.xlsx""#).as_deref(),
            Some("escaped.xlsx")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=/etc/cron.d/x.xlsx").as_deref(),
            Some("x.xlsx")
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="..\\..\\win.xlsx""#).as_deref(),
            Some("win.xlsx")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''..%2F..%2Fx.xlsx").as_deref(),
            Some("x.xlsx")
        );
        assert_eq!(filename_from_disposition(r#"attachment; filename="..""#), None);
        assert_eq!(filename_from_disposition(r#"attachment; filename="dir/""#), None);
    }

    #[tokio::test]
    async fn test_save_to_stays_inside_directory() {
        let root = std::env::temp_dir().join(format!("student_import_tpl_{}", std::process::id()));
        let dir = root.join("templates");
        let template = TemplateFile {
            file_name: "../escaped.xlsx".to_string(),
            bytes: b"name\n".to_vec(),
        };

        let path = template.save_to(&dir).await.unwrap();
        assert_eq!(path, dir.join("escaped.xlsx"));
        assert!(path.exists());
        assert!(!root.join("escaped.xlsx").exists());

        let _ = std::fs::remove_dir_all(&root);
    }
}
