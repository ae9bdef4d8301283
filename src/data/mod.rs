pub mod clickhouse;
pub mod snapshot;
pub mod types;
pub mod window;

use async_trait::async_trait;
use crate::error::ForecastResult;
use types::{Observation, TimeWindow};

/// Read side of `total_load_data`.
#[async_trait]
pub trait LoadSource: Send + Sync {
    /// Rows with `timestamp` inside `window`, ascending.
    async fn query(&self, window: &TimeWindow) -> ForecastResult<Vec<Observation>>;
}
