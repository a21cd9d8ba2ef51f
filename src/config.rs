use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AppResult, ConfigError};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "import.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 学校管理 API 配置 ---
    pub api_base_url: String,
    pub api_token: Option<String>,
    /// 单个请求超时（秒）
    pub request_timeout_secs: u64,
    // --- 进度跟踪 ---
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 最大轮询次数，超过即视为任务超时
    pub max_polls: u32,
    /// 模拟进度每个阶段的停留时间（毫秒）
    pub simulation_step_ms: u64,
    // --- 导入流程 ---
    /// 是否先下载模板
    pub download_template: bool,
    /// 模板保存目录
    pub template_output_dir: String,
    /// 待导入的表格文件
    pub import_file: Option<String>,
    pub level_id: Option<i64>,
    pub grade_id: Option<i64>,
    pub class_id: Option<i64>,
    pub academic_year_id: Option<i64>,
    /// 导入报告文件
    pub report_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            api_token: None,
            request_timeout_secs: 60,
            poll_interval_ms: 1000,
            max_polls: 600,
            simulation_step_ms: 600,
            download_template: false,
            template_output_dir: "templates".to_string(),
            import_file: None,
            level_id: None,
            grade_id: None,
            class_id: None,
            academic_year_id: None,
            report_file: "import_report.txt".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载配置：先读 TOML 文件（如果存在），再用环境变量覆盖
    ///
    /// 配置文件路径取 `IMPORT_CONFIG`，未设置时使用当前目录下的 `import.toml`
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("IMPORT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    /// 从 TOML 文件读取，缺省字段取默认值
    pub fn from_toml_file(path: &str) -> AppResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| crate::error::AppError::io(path, e))?;
        Ok(Self::from_toml_str(&content, path)?)
    }

    pub fn from_toml_str(content: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_string(),
            source,
        })
    }

    /// 只从环境变量构建
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(self) -> AppResult<Self> {
        Ok(Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(self.api_base_url),
            api_token: std::env::var("API_TOKEN").ok().or(self.api_token),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", self.request_timeout_secs)?,
            poll_interval_ms: env_parse("POLL_INTERVAL_MS", self.poll_interval_ms)?,
            max_polls: env_parse("MAX_POLLS", self.max_polls)?,
            simulation_step_ms: env_parse("SIMULATION_STEP_MS", self.simulation_step_ms)?,
            download_template: env_parse("DOWNLOAD_TEMPLATE", self.download_template)?,
            template_output_dir: std::env::var("TEMPLATE_OUTPUT_DIR")
                .unwrap_or(self.template_output_dir),
            import_file: std::env::var("IMPORT_FILE").ok().or(self.import_file),
            level_id: env_parse_opt("LEVEL_ID", self.level_id)?,
            grade_id: env_parse_opt("GRADE_ID", self.grade_id)?,
            class_id: env_parse_opt("CLASS_ID", self.class_id)?,
            academic_year_id: env_parse_opt("ACADEMIC_YEAR_ID", self.academic_year_id)?,
            report_file: std::env::var("REPORT_FILE").unwrap_or(self.report_file),
            verbose_logging: env_parse("VERBOSE_LOGGING", self.verbose_logging)?,
        })
    }
}

fn env_parse<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>(),
            }),
        Err(_) => Ok(default),
    }
}

fn env_parse_opt<T: FromStr>(var_name: &str, default: Option<T>) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>(),
            }),
        Err(_) => Ok(default),
    }
}
