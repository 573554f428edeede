pub mod progress_aggregator;

pub use progress_aggregator::{JobEvent, ProgressAggregator};
