use async_trait::async_trait;
use polars::prelude::DataFrame;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::handler::ForecastHandler;
use crate::forecast::types::{ForecastEvent, HandlerResponse, TimestampedForecast};
use crate::table;

/// Runs the forecast handler somewhere and hands back its envelope.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, event: &ForecastEvent) -> ForecastResult<HandlerResponse>;
}

/// Payload a function runtime returns in place of the handler's result
/// when the handler raised.
#[derive(Debug, Deserialize)]
struct FunctionErrorPayload {
    #[serde(rename = "errorMessage")]
    error_message: String,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
}

/// Synchronous (`RequestResponse`) invoke over HTTP, on the
/// `/2015-03-31/functions/{name}/invocations` path.
pub struct HttpFunctionInvoker {
    client: Client,
    base_url: String,
    function_name: String,
    api_key: Option<String>,
}

impl HttpFunctionInvoker {
    pub fn new(base_url: String, function_name: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            function_name,
            api_key,
        }
    }

    pub fn invoke_url(&self) -> ForecastResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ForecastError::Invocation(format!("bad function url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ForecastError::Invocation(format!("function url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["2015-03-31", "functions", self.function_name.as_str(), "invocations"]);
        Ok(url)
    }
}

#[async_trait]
impl FunctionInvoker for HttpFunctionInvoker {
    async fn invoke(&self, event: &ForecastEvent) -> ForecastResult<HandlerResponse> {
        let url = self.invoke_url()?;
        info!("Invoking function {} for {}", self.function_name, event.initialization_timestamp);

        let mut builder = self.client
            .post(url)
            .header("X-Amz-Invocation-Type", "RequestResponse")
            .json(event);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ForecastError::Invocation(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ForecastError::Invocation(format!("failed to read function payload: {}", e)))?;

        if !status.is_success() {
            return Err(ForecastError::Invocation(format!(
                "function invoke returned {}: {}",
                status,
                body.trim()
            )));
        }

        decode_function_payload(&body)
    }
}

/// A 200 invoke may still carry a function error instead of the envelope.
fn decode_function_payload(body: &str) -> ForecastResult<HandlerResponse> {
    if let Ok(failure) = serde_json::from_str::<FunctionErrorPayload>(body) {
        return Err(ForecastError::Invocation(format!(
            "function raised {}: {}",
            failure.error_type.as_deref().unwrap_or("an error"),
            failure.error_message
        )));
    }

    serde_json::from_str(body).map_err(|e| {
        ForecastError::Invocation(format!("function payload is not a handler response: {} ({})", body.trim(), e))
    })
}

/// Runs the handler in-process; same contract as a remote function.
pub struct LocalInvoker {
    handler: Arc<ForecastHandler>,
}

impl LocalInvoker {
    pub fn new(handler: Arc<ForecastHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl FunctionInvoker for LocalInvoker {
    async fn invoke(&self, event: &ForecastEvent) -> ForecastResult<HandlerResponse> {
        self.handler.handle(event).await
    }
}

/// Decode a handler envelope into the timestamped forecast it carries.
pub fn decode_handler_response(response: &HandlerResponse) -> ForecastResult<TimestampedForecast> {
    if response.status_code != 200 {
        return Err(ForecastError::Invocation(format!(
            "function reported status {}: {}",
            response.status_code, response.body
        )));
    }

    serde_json::from_str(&response.body)
        .map_err(|e| ForecastError::Invocation(format!("undecodable forecast body: {}", e)))
}

/// Invoke the forecast function and return its forecast as a frame.
pub async fn invoke_forecast(
    invoker: &dyn FunctionInvoker,
    event: &ForecastEvent,
) -> ForecastResult<DataFrame> {
    let response = invoker.invoke(event).await?;
    let forecast = decode_handler_response(&response)?;
    let df = table::from_forecast(&forecast)?;

    info!(
        "Forecast from {}: {} rows, columns {:?}",
        event.initialization_timestamp,
        df.height(),
        df.get_column_names()
    );
    Ok(df)
}
