pub mod config;
pub mod extractor;
pub mod launcher;
pub mod layout;
pub mod manifest;
pub mod pipeline;
pub mod request;
pub mod resume;

pub use config::DatasetConfig;
pub use request::{IngestionRequest, Lighting};
