pub mod aggregator;
pub mod store;
pub mod types;

pub use aggregator::{model_breakdown, record_usage, RecordedUsage, TokenUsage};
pub use store::StatsStore;
pub use types::*;
