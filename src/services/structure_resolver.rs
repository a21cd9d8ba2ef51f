//! 教育结构解析服务 - 业务能力层
//!
//! 只负责"选出导入目标上下文"能力：阶段 → 年级 → 班级 + 学年

use std::sync::Arc;
use tracing::{debug, info};

use crate::clients::ImportBackend;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{
    AcademicYear, CompleteSelection, EducationLevel, EducationalStructureSelection, Grade,
    SchoolClass, StructureField,
};

/// 教育结构解析服务
///
/// 职责：
/// - 持有阶段/学年目录，班级按年级按需加载
/// - 修改上级字段时清空下级字段
/// - 不持有选择本身，选择归 `ImportSession` 所有
pub struct EducationalStructureResolver {
    backend: Arc<dyn ImportBackend>,
    levels: Vec<EducationLevel>,
    academic_years: Vec<AcademicYear>,
    /// (年级ID, 该年级的班级)
    classes: Option<(i64, Vec<SchoolClass>)>,
}

impl EducationalStructureResolver {
    pub fn new(backend: Arc<dyn ImportBackend>) -> Self {
        Self {
            backend,
            levels: Vec::new(),
            academic_years: Vec::new(),
            classes: None,
        }
    }

    /// 加载教育阶段（含年级）和学年
    pub async fn load_catalog(&mut self) -> AppResult<()> {
        let (levels, years) = futures::future::try_join(
            self.backend.education_levels(),
            self.backend.academic_years(),
        )
        .await?;

        info!(
            "✓ 已加载 {} 个教育阶段，{} 个学年",
            levels.items.len(),
            years.items.len()
        );

        self.levels = levels.items;
        self.academic_years = years.items;
        self.classes = None;
        Ok(())
    }

    pub fn levels(&self) -> &[EducationLevel] {
        &self.levels
    }

    pub fn academic_years(&self) -> &[AcademicYear] {
        &self.academic_years
    }

    /// 当前学年（如果后端标记了）
    pub fn current_academic_year(&self) -> Option<&AcademicYear> {
        self.academic_years.iter().find(|y| y.is_current)
    }

    /// 已选阶段下的年级
    pub fn grades(&self, selection: &EducationalStructureSelection) -> &[Grade] {
        selection
            .level_id
            .and_then(|id| self.find_level(id))
            .map(|level| level.grades.as_slice())
            .unwrap_or(&[])
    }

    /// 已加载的班级（仅当属于当前所选年级时返回）
    pub fn classes(&self, selection: &EducationalStructureSelection) -> &[SchoolClass] {
        match (&self.classes, selection.grade_id) {
            (Some((grade_id, classes)), Some(selected)) if *grade_id == selected => classes,
            _ => &[],
        }
    }

    /// 按需加载所选年级的班级
    pub async fn load_classes(
        &mut self,
        selection: &EducationalStructureSelection,
    ) -> AppResult<&[SchoolClass]> {
        let grade_id = selection.grade_id.ok_or(AppError::DependencyMissing {
            needed: StructureField::Grade,
            action: "加载班级",
        })?;

        let cached = matches!(&self.classes, Some((id, _)) if *id == grade_id);
        if !cached {
            let page = self.backend.classes_for_grade(grade_id).await?;
            // 后端可能忽略过滤参数，这里再按年级过滤一次
            let classes: Vec<SchoolClass> = page
                .items
                .into_iter()
                .filter(|c| c.grade_id.map_or(true, |g| g == grade_id))
                .collect();
            debug!("年级 #{} 下有 {} 个班级", grade_id, classes.len());
            self.classes = Some((grade_id, classes));
        }

        Ok(self.classes(selection))
    }

    /// 选择教育阶段；清空年级和班级
    pub fn select_level(
        &mut self,
        selection: &mut EducationalStructureSelection,
        level_id: i64,
    ) -> AppResult<()> {
        if self.find_level(level_id).is_none() {
            return Err(ValidationError::UnknownLevel(level_id).into());
        }
        selection.level_id = Some(level_id);
        selection.grade_id = None;
        selection.class_id = None;
        self.classes = None;
        Ok(())
    }

    /// 选择年级；年级必须属于已选阶段，清空班级
    pub fn select_grade(
        &mut self,
        selection: &mut EducationalStructureSelection,
        grade_id: i64,
    ) -> AppResult<()> {
        let level_id = selection.level_id.ok_or(AppError::DependencyMissing {
            needed: StructureField::Level,
            action: "选择年级",
        })?;

        if !self.grades(selection).iter().any(|g| g.id == grade_id) {
            return Err(ValidationError::GradeNotInLevel {
                grade: grade_id,
                level: level_id,
            }
            .into());
        }

        selection.grade_id = Some(grade_id);
        selection.class_id = None;
        self.classes = None;
        Ok(())
    }

    /// 选择班级；必须先加载所选年级的班级
    pub fn select_class(
        &mut self,
        selection: &mut EducationalStructureSelection,
        class_id: i64,
    ) -> AppResult<()> {
        let grade_id = selection.grade_id.ok_or(AppError::DependencyMissing {
            needed: StructureField::Grade,
            action: "选择班级",
        })?;

        if !matches!(&self.classes, Some((id, _)) if *id == grade_id) {
            return Err(AppError::DependencyMissing {
                needed: StructureField::Class,
                action: "选择班级（请先加载班级列表）",
            });
        }

        if !self.classes(selection).iter().any(|c| c.id == class_id) {
            return Err(ValidationError::ClassNotInGrade {
                class: class_id,
                grade: grade_id,
            }
            .into());
        }

        selection.class_id = Some(class_id);
        Ok(())
    }

    /// 选择学年
    pub fn select_academic_year(
        &self,
        selection: &mut EducationalStructureSelection,
        academic_year_id: i64,
    ) -> AppResult<()> {
        if !self.academic_years.iter().any(|y| y.id == academic_year_id) {
            return Err(ValidationError::UnknownAcademicYear(academic_year_id).into());
        }
        selection.academic_year_id = Some(academic_year_id);
        Ok(())
    }

    /// 校验选择完整
    pub fn validate(&self, selection: &EducationalStructureSelection) -> AppResult<CompleteSelection> {
        Ok(selection.validate()?)
    }

    /// 丢弃按需加载的班级
    pub fn clear(&mut self) {
        self.classes = None;
    }

    fn find_level(&self, level_id: i64) -> Option<&EducationLevel> {
        self.levels.iter().find(|l| l.id == level_id)
    }
}
