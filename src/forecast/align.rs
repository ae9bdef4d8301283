use chrono::{Duration, NaiveDateTime};
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::types::{Prediction, TimestampedForecast};

/// `t_i = initialization_timestamp + i * frequency_minutes` for `i < prediction_length`.
pub fn forecast_timestamps(
    initialization_timestamp: NaiveDateTime,
    frequency_minutes: u32,
    prediction_length: u32,
) -> ForecastResult<Vec<NaiveDateTime>> {
    if frequency_minutes == 0 {
        return Err(ForecastError::InvalidRequest("frequency must be positive".to_string()));
    }

    (0..i64::from(prediction_length))
        .map(|i| {
            Duration::try_minutes(i * i64::from(frequency_minutes))
                .and_then(|offset| initialization_timestamp.checked_add_signed(offset))
                .ok_or_else(|| {
                    ForecastError::InvalidRequest(format!(
                        "forecast step {} after {} is out of range",
                        i, initialization_timestamp
                    ))
                })
        })
        .collect()
}

/// Zip generated timestamps onto the prediction by position.
///
/// Step order is taken on trust from the model; only the lengths are checked.
pub fn attach_timestamps(
    prediction: Prediction,
    initialization_timestamp: NaiveDateTime,
    frequency_minutes: u32,
    prediction_length: u32,
) -> ForecastResult<TimestampedForecast> {
    let timestamp = forecast_timestamps(initialization_timestamp, frequency_minutes, prediction_length)?;

    if let Some((name, values)) = prediction.iter().find(|(_, v)| v.len() != timestamp.len()) {
        return Err(ForecastError::ForecastParse(format!(
            "series {:?} has {} values, expected {}",
            name,
            values.len(),
            timestamp.len()
        )));
    }

    Ok(TimestampedForecast { timestamp, prediction })
}
