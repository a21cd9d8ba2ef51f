/// 日志工具模块
///
/// 提供日志格式化和导入报告输出的辅助函数
use std::fs;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{ImportResults, PreviewResult};

/// 初始化导入报告文件
///
/// # 参数
/// - `report_path`: 报告文件路径
pub fn init_report_file(report_path: &str) -> AppResult<()> {
    let header = format!(
        "{}\n学生批量导入报告 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(report_path, header).map_err(|e| AppError::io(report_path, e))
}

/// 追加导入结果到报告文件
pub fn append_results_to_report(report_path: &str, results: &ImportResults) -> AppResult<()> {
    use std::io::Write;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(report_path)
        .map_err(|e| AppError::io(report_path, e))?;

    let mut body = format!(
        "总行数: {}\n成功导入: {}\n新建学生: {}\n新建家长: {}\n",
        results.total_rows,
        results.successful_imports,
        results.created_students.len(),
        results.created_parents.len()
    );
    for student in &results.created_students {
        body.push_str(&format!(
            "  学生 #{} {}\n",
            student.id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            student.name.as_deref().unwrap_or("")
        ));
    }
    for row_error in &results.errors {
        body.push_str(&format!("  {}\n", row_error));
    }

    file.write_all(body.as_bytes())
        .map_err(|e| AppError::io(report_path, e))
}

/// 记录程序启动信息
pub fn log_startup(api_base_url: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 学生批量导入");
    info!("🌐 API 地址: {}", api_base_url);
    info!("{}", "=".repeat(60));
}

/// 记录进入新的向导步骤
pub fn log_stage(step: usize, total: usize, name: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📦 第 {}/{} 步: {}", step, total, name);
    info!("{}", "─".repeat(60));
}

/// 打印预览结果
///
/// # 参数
/// - `preview`: 预览结果
/// - `max_rows`: 最多展示多少条行级错误
pub fn log_preview(preview: &PreviewResult, max_rows: usize) {
    info!(
        "📋 预览: 共 {} 行，已校验 {} 行，错误 {} 个，警告 {} 个",
        preview.total_rows,
        preview.processed_rows,
        preview.errors.len(),
        preview.warnings.len()
    );
    for row_error in preview.errors.iter().take(max_rows) {
        warn!("  {}", truncate_text(&row_error.to_string(), 80));
    }
    if preview.errors.len() > max_rows {
        warn!("  ... 另有 {} 个错误", preview.errors.len() - max_rows);
    }
    for warning in preview.warnings.iter().take(max_rows) {
        info!("  提示: {}", truncate_text(warning, 80));
    }
}

/// 打印最终统计信息
pub fn print_final_stats(results: &ImportResults, report_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 导入完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", results.successful_imports, results.total_rows);
    info!("👨‍🎓 新建学生: {}", results.created_students.len());
    info!("👪 新建家长: {}", results.created_parents.len());
    info!("❌ 错误: {}", results.errors.len());
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", report_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
