use std::sync::Arc;
use tracing::{info, warn};
use crate::data::window::context_window;
use crate::data::LoadSource;
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::align::attach_timestamps;
use crate::forecast::endpoint::{InferenceClient, InferenceRequest};
use crate::forecast::types::{quantile_key, ForecastEvent, HandlerResponse, TimestampedForecast};

/// Query the context window, ask the model, attach timestamps.
pub struct ForecastHandler {
    source: Arc<dyn LoadSource>,
    model: Arc<dyn InferenceClient>,
}

impl ForecastHandler {
    pub fn new(source: Arc<dyn LoadSource>, model: Arc<dyn InferenceClient>) -> Self {
        Self { source, model }
    }

    pub async fn forecast(&self, event: &ForecastEvent) -> ForecastResult<TimestampedForecast> {
        event.validate()?;

        let window = context_window(event.initialization_timestamp, event.frequency, event.context_length)?;
        info!(
            "Context window [{}, {}) for {} steps at {}min",
            window.start, event.initialization_timestamp, event.context_length, event.frequency
        );

        let rows = self.source.query(&window).await?;
        if rows.is_empty() {
            warn!("Context window is empty, sending an empty target");
        }

        let target: Vec<f64> = rows.iter().map(|r| r.total_load).collect();
        let request = InferenceRequest::new(target, event.prediction_length, event.quantile_levels());
        let prediction = self.model.predict(&request).await?;
        for level in &request.parameters.quantile_levels {
            if prediction.get(&quantile_key(*level)).is_none() {
                warn!("Model returned no series for quantile {}", level);
            }
        }

        let forecast = attach_timestamps(
            prediction,
            event.initialization_timestamp,
            event.frequency,
            event.prediction_length,
        )?;
        info!(
            "Forecast ready: {} steps, {} series",
            forecast.timestamp.len(),
            forecast.prediction.series_count()
        );

        Ok(forecast)
    }

    /// Function-runtime entry point: the forecast JSON-encoded in a 200 envelope.
    pub async fn handle(&self, event: &ForecastEvent) -> ForecastResult<HandlerResponse> {
        let forecast = self.forecast(event).await?;
        let body = serde_json::to_string(&forecast)
            .map_err(|e| ForecastError::ForecastParse(format!("cannot encode forecast: {}", e)))?;

        Ok(HandlerResponse { status_code: 200, body })
    }
}
