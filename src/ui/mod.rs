pub mod menu;
pub mod progress;

pub use progress::ExtractionSpinner;
