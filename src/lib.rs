pub mod artifacts;
pub mod cli;
pub mod dataset_builder;
pub mod error;
pub mod feature_extractor;
pub mod layout;
pub mod parquet_io;
pub mod pipeline;
pub mod rating_engine;
pub mod rating_weights;
pub mod raw_input;
pub mod schema;
pub mod season;
pub mod season_aggregator;
pub mod synthetic;

pub use error::{PipelineError, Result};
pub use season::{Season, SeasonRange};
