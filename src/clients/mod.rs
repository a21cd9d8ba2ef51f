pub mod backend;
pub mod school_client;

pub use backend::{ImportBackend, TemplateDownload};
pub use school_client::SchoolApiClient;
