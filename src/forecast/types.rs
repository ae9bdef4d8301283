use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::data::types::{timestamp, timestamp_list};
use crate::error::{ForecastError, ForecastResult};

pub const MEAN_KEY: &str = "mean";

/// Used when an event does not name its quantiles.
pub const DEFAULT_QUANTILE_LEVELS: [f64; 3] = [0.1, 0.5, 0.9];

/// Series name the model uses for a quantile level, e.g. `0.1` -> `"0.1"`.
pub fn quantile_key(level: f64) -> String {
    format!("{}", level)
}

/// A forecast request, as received by the handler and sent by the invoker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEvent {
    #[serde(with = "timestamp")]
    pub initialization_timestamp: NaiveDateTime,
    /// Minutes between samples.
    pub frequency: u32,
    pub context_length: u32,
    pub prediction_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantile_levels: Option<Vec<f64>>,
}

impl ForecastEvent {
    pub fn quantile_levels(&self) -> Vec<f64> {
        self.quantile_levels
            .clone()
            .unwrap_or_else(|| DEFAULT_QUANTILE_LEVELS.to_vec())
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.frequency == 0 {
            return Err(ForecastError::InvalidRequest("frequency must be positive".to_string()));
        }
        if self.context_length == 0 {
            return Err(ForecastError::InvalidRequest("context_length must be positive".to_string()));
        }
        if self.prediction_length == 0 {
            return Err(ForecastError::InvalidRequest("prediction_length must be positive".to_string()));
        }
        if let Some(bad) = self.quantile_levels().into_iter().find(|q| !(*q > 0.0 && *q < 1.0)) {
            return Err(ForecastError::InvalidRequest(format!(
                "quantile level {} is outside (0, 1)",
                bad
            )));
        }
        Ok(())
    }
}

/// Series returned by the model for one input: `"mean"` plus one entry per
/// quantile, each indexed by forecast step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prediction {
    series: BTreeMap<String, Vec<f64>>,
}

impl Prediction {
    #[cfg(test)]
    pub fn new(series: BTreeMap<String, Vec<f64>>) -> Self {
        Self { series }
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn mean(&self) -> Option<&[f64]> {
        self.get(MEAN_KEY)
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// `mean` first, then quantiles ascending, then anything else by name.
    pub fn series_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.series.keys().map(String::as_str).collect();
        names.sort_by(|a, b| {
            let rank = |name: &str| -> (u8, f64) {
                if name == MEAN_KEY {
                    (0, 0.0)
                } else if let Ok(level) = name.parse::<f64>() {
                    (1, level)
                } else {
                    (2, 0.0)
                }
            };
            let (ra, la) = rank(a);
            let (rb, lb) = rank(b);
            ra.cmp(&rb)
                .then(la.total_cmp(&lb))
                .then_with(|| a.cmp(b))
        });
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.series.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// A prediction with its forecast-step timestamps attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedForecast {
    #[serde(with = "timestamp_list")]
    pub timestamp: Vec<NaiveDateTime>,
    #[serde(flatten)]
    pub prediction: Prediction,
}

/// What the function runtime hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}
