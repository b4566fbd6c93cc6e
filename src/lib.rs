pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::FeatureConfig;
pub use error::{FeatureError, MalformedKind};
pub use services::{load_matches, EloEngine, FeaturePipeline, FeatureTable, TrainingSet};
