pub mod committer;
pub mod file_preparer;
pub mod progress_tracker;
pub mod structure_resolver;
pub mod template_provisioner;

pub use committer::{CommitPhase, ImportCommitter};
pub use file_preparer::ImportFilePreparer;
pub use progress_tracker::{
    ProgressTracker, TrackerHandle, TrackerSettings, TrackingStrategy, PACED_PHASES,
};
pub use structure_resolver::EducationalStructureResolver;
pub use template_provisioner::{TemplateFile, TemplateProvisioner};
