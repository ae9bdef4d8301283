use chrono::{Duration, NaiveDateTime};
use crate::data::types::{format_timestamp, TimeWindow};
use crate::error::{ForecastError, ForecastResult};

/// `initialization_timestamp - frequency_minutes * context_length` minutes.
pub fn lower_bound(
    initialization_timestamp: NaiveDateTime,
    frequency_minutes: u32,
    context_length: u32,
) -> ForecastResult<NaiveDateTime> {
    if frequency_minutes == 0 {
        return Err(ForecastError::InvalidRequest("frequency must be positive".to_string()));
    }
    if context_length == 0 {
        return Err(ForecastError::InvalidRequest("context_length must be positive".to_string()));
    }

    let span = i64::from(frequency_minutes) * i64::from(context_length);
    Duration::try_minutes(span)
        .and_then(|d| initialization_timestamp.checked_sub_signed(d))
        .ok_or_else(|| {
            ForecastError::InvalidRequest(format!(
                "context span of {} minutes before {} is out of range",
                span, initialization_timestamp
            ))
        })
}

/// The context window `[lower_bound, initialization_timestamp)` fed to the model.
pub fn context_window(
    initialization_timestamp: NaiveDateTime,
    frequency_minutes: u32,
    context_length: u32,
) -> ForecastResult<TimeWindow> {
    let start = lower_bound(initialization_timestamp, frequency_minutes, context_length)?;
    Ok(TimeWindow::new(start, initialization_timestamp))
}

/// Reject anything that is not a plain (optionally schema-qualified) identifier,
/// since the name is spliced into the query text.
pub fn validate_table_name(table: &str) -> ForecastResult<()> {
    let is_identifier = |part: &str| {
        let mut chars = part.chars();
        chars
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    // `table` or `schema.table`, each part non-empty
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() <= 2 && parts.iter().all(|p| is_identifier(*p)) {
        Ok(())
    } else {
        Err(ForecastError::InvalidRequest(format!("invalid table name: {:?}", table)))
    }
}

/// Range query over `table`, ascending on timestamp.
pub fn render_window_query(table: &str, window: &TimeWindow) -> ForecastResult<String> {
    validate_table_name(table)?;

    let mut sql = format!(
        "SELECT timestamp, total_load FROM {} WHERE timestamp >= toDateTime('{}')",
        table,
        format_timestamp(&window.start)
    );
    if let Some(end) = window.end {
        sql.push_str(&format!(" AND timestamp < toDateTime('{}')", format_timestamp(&end)));
    }
    sql.push_str(" ORDER BY timestamp ASC");

    Ok(sql)
}
