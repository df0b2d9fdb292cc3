pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod inferencer;
pub mod logging;
pub mod model;
pub mod ranking;
pub mod response;
pub mod service;

pub use catalog::{LesionClass, explain};
pub use config::ClassifierConfig;
pub use error::ClassifierError;
pub use model::{ModelContext, ModelHandle};
pub use ranking::{ClassScore, RankedPrediction, rank};
pub use response::{InferenceResult, format_failure, format_success};
pub use service::ClassifierService;
