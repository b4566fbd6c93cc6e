pub mod context_features;
pub mod data_loader;
pub mod dataset_export;
pub mod elo_calculator;
pub mod feature_pipeline;
pub mod rolling_stats;
pub mod team_timeline;
pub mod training_set;

pub use context_features::*;
pub use data_loader::*;
pub use dataset_export::*;
pub use elo_calculator::*;
pub use feature_pipeline::*;
pub use rolling_stats::*;
pub use team_timeline::*;
pub use training_set::*;
