pub mod import;
pub mod page;
pub mod structure;

pub use import::{
    CommitBlockReason, CommitResponse, ImportJob, ImportResults, ImportedRecord, JobStatus,
    PreviewResult, RowError, UploadedFile,
};
pub use page::Page;
pub use structure::{
    AcademicYear, CompleteSelection, EducationLevel, EducationalStructureSelection, Grade,
    SchoolClass, StructureField,
};
