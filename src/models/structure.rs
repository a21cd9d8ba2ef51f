//! 教育结构模型
//!
//! 教育阶段 → 年级 → 班级，加上学年，构成每条导入记录所挂靠的上下文

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::error::ValidationError;

/// 结构选择中的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureField {
    Level,
    Grade,
    Class,
    AcademicYear,
}

impl StructureField {
    /// 字段在校验信息中的顺序
    pub const ALL: [StructureField; 4] = [
        StructureField::Level,
        StructureField::Grade,
        StructureField::Class,
        StructureField::AcademicYear,
    ];
}

impl Display for StructureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StructureField::Level => "教育阶段",
            StructureField::Grade => "年级",
            StructureField::Class => "班级",
            StructureField::AcademicYear => "学年",
        };
        f.write_str(label)
    }
}

/// 年级
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub id: i64,
    pub name: String,
}

/// 教育阶段（内嵌年级）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationLevel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub grades: Vec<Grade>,
}

/// 班级
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: i64,
    pub name: String,
    /// 部分接口不回传所属年级
    #[serde(default, alias = "grade")]
    pub grade_id: Option<i64>,
}

/// 学年
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYear {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_current: bool,
}

/// 用户正在编辑的结构选择
///
/// 各字段可以为空；只有 [`validate`](Self::validate) 通过后才能用于模板、预览和提交
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EducationalStructureSelection {
    pub level_id: Option<i64>,
    pub grade_id: Option<i64>,
    pub class_id: Option<i64>,
    pub academic_year_id: Option<i64>,
}

impl EducationalStructureSelection {
    /// 列出尚未填写的字段
    pub fn missing_fields(&self) -> Vec<StructureField> {
        StructureField::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }

    fn get(&self, field: StructureField) -> Option<i64> {
        match field {
            StructureField::Level => self.level_id,
            StructureField::Grade => self.grade_id,
            StructureField::Class => self.class_id,
            StructureField::AcademicYear => self.academic_year_id,
        }
    }

    /// 校验四个字段齐全
    pub fn validate(&self) -> Result<CompleteSelection, ValidationError> {
        match (
            self.level_id,
            self.grade_id,
            self.class_id,
            self.academic_year_id,
        ) {
            (Some(level_id), Some(grade_id), Some(class_id), Some(academic_year_id)) => {
                Ok(CompleteSelection {
                    level_id,
                    grade_id,
                    class_id,
                    academic_year_id,
                })
            }
            _ => Err(ValidationError::MissingFields(self.missing_fields())),
        }
    }
}

/// 已校验的完整结构选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompleteSelection {
    pub level_id: i64,
    pub grade_id: i64,
    pub class_id: i64,
    pub academic_year_id: i64,
}

impl CompleteSelection {
    /// 作为查询参数/表单字段的键值对
    pub fn as_params(&self) -> [(&'static str, String); 4] {
        [
            ("level", self.level_id.to_string()),
            ("grade", self.grade_id.to_string()),
            ("class", self.class_id.to_string()),
            ("academic_year", self.academic_year_id.to_string()),
        ]
    }
}

impl Display for CompleteSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[阶段#{} 年级#{} 班级#{} 学年#{}]",
            self.level_id, self.grade_id, self.class_id, self.academic_year_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reports_every_missing_field() {
        let selection = EducationalStructureSelection {
            level_id: Some(1),
            grade_id: None,
            class_id: Some(7),
            academic_year_id: None,
        };

        assert_eq!(
            selection.validate(),
            Err(ValidationError::MissingFields(vec![
                StructureField::Grade,
                StructureField::AcademicYear
            ]))
        );
    }

    #[test]
    fn test_validate_complete() {
        let selection = EducationalStructureSelection {
            level_id: Some(1),
            grade_id: Some(3),
            class_id: Some(7),
            academic_year_id: Some(2024),
        };

        let complete = selection.validate().unwrap();
        assert_eq!(complete.class_id, 7);
        assert_eq!(complete.as_params()[3], ("academic_year", "2024".to_string()));
    }
}
