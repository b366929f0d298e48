pub mod annotations;
pub mod brands;
pub mod config;
pub mod correlate;
pub mod crop;
pub mod engine;
pub mod error;
pub mod progress;
pub mod report;
pub mod visualize;

pub use annotations::{BoxRecord, ImageRecord, PointRecord};
pub use brands::BrandSet;
pub use config::AppConfig;
pub use correlate::{Correlation, Correlator, MatchPolicy};
pub use engine::{Pipeline, PipelineResult};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
