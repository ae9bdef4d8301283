use chrono::{Duration, NaiveDateTime};
use polars::prelude::DataFrame;
use tracing::info;
use crate::data::types::TimeWindow;
use crate::data::LoadSource;
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::types::ForecastEvent;
use crate::invocation::{invoke_forecast, FunctionInvoker};
use crate::table;

/// History from `anchor - lookback_days` onwards, outer-joined with the
/// forecasts for every event.
pub async fn build_report(
    source: &dyn LoadSource,
    invoker: &dyn FunctionInvoker,
    anchor: NaiveDateTime,
    lookback_days: u32,
    events: &[ForecastEvent],
) -> ForecastResult<DataFrame> {
    let start = Duration::try_days(i64::from(lookback_days))
        .and_then(|d| anchor.checked_sub_signed(d))
        .ok_or_else(|| {
            ForecastError::InvalidRequest(format!("{} days before {} is out of range", lookback_days, anchor))
        })?;

    let history = table::from_observations(&source.query(&TimeWindow::since(start)).await?)?;
    info!("History since {}: {} rows", start, history.height());

    let mut forecasts = Vec::with_capacity(events.len());
    for event in events {
        forecasts.push(invoke_forecast(invoker, event).await?);
    }

    let merged = table::outer_join(&history, &table::concat(&forecasts)?)?;
    info!("Merged table: {} rows, {} columns", merged.height(), merged.width());

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::data::types::parse_timestamp;
    use crate::forecast::handler::tests::{seeded_store, FakeModel};
    use crate::forecast::handler::ForecastHandler;
    use crate::invocation::LocalInvoker;
    use crate::table::tests::{cell, names, timestamps, ts};

    fn event(init: &str) -> ForecastEvent {
        ForecastEvent {
            initialization_timestamp: parse_timestamp(init).unwrap(),
            frequency: 15,
            context_length: 4,
            prediction_length: 4,
            quantile_levels: None,
        }
    }

    #[tokio::test]
    async fn test_report_merges_history_and_overlapping_forecasts() {
        // seeded rows run 22:00 .. 00:45
        let store = Arc::new(seeded_store());
        let handler = ForecastHandler::new(store.clone(), Arc::new(FakeModel::new()));
        let invoker = LocalInvoker::new(Arc::new(handler));

        let anchor = parse_timestamp("2025-08-19 00:00:00").unwrap();
        // 23:30 .. 00:15 and 00:00 .. 00:45 overlap on 00:00 and 00:15
        let events = [event("2025-08-18 23:30:00"), event("2025-08-19 00:00:00")];

        let df = build_report(store.as_ref(), &invoker, anchor, 1, &events).await.unwrap();

        assert_eq!(names(&df), vec!["timestamp", "total_load", "mean", "0.1", "0.5", "0.9"]);
        // 12 history rows, all forecast steps already inside that span
        assert_eq!(df.height(), 12);

        let stamps = timestamps(&df);
        let unique: std::collections::BTreeSet<_> = stamps.iter().collect();
        assert_eq!(unique.len(), stamps.len());
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));

        // overlapping steps collapse into one row, the later forecast's
        assert_eq!(cell(&df, ts("2025-08-19 00:00:00"), "mean"), Some(107.0));
        assert_eq!(cell(&df, ts("2025-08-19 00:00:00"), "total_load"), Some(108.0));
        // first forecast only: context 22:30..23:15, last value 105, step 0
        assert_eq!(cell(&df, ts("2025-08-18 23:30:00"), "mean"), Some(105.0));
        // history only
        assert_eq!(cell(&df, ts("2025-08-18 22:00:00"), "mean"), None);
    }

    #[tokio::test]
    async fn test_report_without_events_is_history() {
        let store = Arc::new(seeded_store());
        let handler = ForecastHandler::new(store.clone(), Arc::new(FakeModel::new()));
        let invoker = LocalInvoker::new(Arc::new(handler));

        let anchor = parse_timestamp("2025-08-19 00:00:00").unwrap();
        let df = build_report(store.as_ref(), &invoker, anchor, 0, &[]).await.unwrap();

        // 00:00 .. 00:45
        assert_eq!(df.height(), 4);
        assert_eq!(names(&df), vec!["timestamp", "total_load"]);
    }
}
