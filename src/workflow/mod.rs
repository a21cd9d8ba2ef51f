pub mod import_session;
pub mod wizard;

pub use import_session::{ImportSession, UploadStep, WizardStage};
pub use wizard::WizardController;
