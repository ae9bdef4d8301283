use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::types::Prediction;

/// Body sent to the model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub inputs: Vec<InferenceInput>,
    pub parameters: InferenceParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceInput {
    pub target: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceParameters {
    pub prediction_length: u32,
    pub quantile_levels: Vec<f64>,
}

impl InferenceRequest {
    /// Single-series request; an empty `target` is passed through untouched.
    pub fn new(target: Vec<f64>, prediction_length: u32, quantile_levels: Vec<f64>) -> Self {
        Self {
            inputs: vec![InferenceInput { target }],
            parameters: InferenceParameters {
                prediction_length,
                quantile_levels,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    predictions: Option<Vec<Prediction>>,
}

/// Pull `predictions[0]` out of an endpoint response body.
pub fn parse_inference_response(body: &str) -> ForecastResult<Prediction> {
    let response: InferenceResponse = serde_json::from_str(body)
        .map_err(|e| ForecastError::ForecastParse(format!("response is not a prediction payload: {}", e)))?;

    let prediction = response
        .predictions
        .ok_or_else(|| ForecastError::ForecastParse("response has no predictions".to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| ForecastError::ForecastParse("predictions array is empty".to_string()))?;

    if prediction.mean().is_none() {
        return Err(ForecastError::ForecastParse("prediction has no mean series".to_string()));
    }

    Ok(prediction)
}

/// The managed model endpoint.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn predict(&self, request: &InferenceRequest) -> ForecastResult<Prediction>;
}

/// Bedrock-runtime style `InvokeModel` over HTTPS.
pub struct HttpInferenceClient {
    client: Client,
    base_url: String,
    model_id: String,
    api_key: Option<String>,
}

impl HttpInferenceClient {
    pub fn new(base_url: String, model_id: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model_id,
            api_key,
        }
    }

    /// `{base_url}/model/{model_id}/invoke`, the model id kept as one segment.
    pub fn invoke_url(&self) -> ForecastResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ForecastError::EndpointInvocation(format!("bad endpoint url {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ForecastError::EndpointInvocation(format!("endpoint url {} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["model", self.model_id.as_str(), "invoke"]);
        Ok(url)
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn predict(&self, request: &InferenceRequest) -> ForecastResult<Prediction> {
        let url = self.invoke_url()?;
        info!(
            "Invoking model {} with {} context values",
            self.model_id,
            request.inputs.iter().map(|i| i.target.len()).sum::<usize>()
        );

        let mut builder = self.client
            .post(url)
            .header("Accept", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ForecastError::EndpointInvocation(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ForecastError::EndpointInvocation(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ForecastError::EndpointInvocation(format!(
                "model endpoint returned {}: {}",
                status,
                body.trim()
            )));
        }

        debug!("Model response: {} bytes", body.len());
        parse_inference_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    #[test]
    fn test_request_shape() {
        let request = InferenceRequest::new(vec![1.0, 2.5], 2, vec![0.1, 0.5, 0.9]);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "inputs": [{"target": [1.0, 2.5]}],
                "parameters": {"prediction_length": 2, "quantile_levels": [0.1, 0.5, 0.9]}
            })
        );
    }

    #[test]
    fn test_empty_target_is_sent() {
        let request = InferenceRequest::new(vec![], 4, vec![0.5]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["inputs"][0]["target"], serde_json::json!([]));
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"predictions":[{"mean":[10.0,11.0],"0.1":[8.0,9.0],"0.5":[10.0,11.0],"0.9":[12.0,13.0]}]}"#;
        let prediction = parse_inference_response(body).unwrap();

        assert_eq!(prediction.mean(), Some(&[10.0, 11.0][..]));
        assert_eq!(prediction.get("0.9"), Some(&[12.0, 13.0][..]));
        assert_eq!(prediction.series_count(), 4);
    }

    #[test]
    fn test_parse_response_errors() {
        for body in [
            "not json",
            r#"{}"#,
            r#"{"predictions":[]}"#,
            r#"{"predictions":[{"0.5":[1.0]}]}"#,
            r#"{"predictions":[{"mean":"oops"}]}"#,
        ] {
            let err = parse_inference_response(body).unwrap_err();
            assert!(matches!(err, ForecastError::ForecastParse(_)), "body {}", body);
        }
    }

    #[test]
    fn test_invoke_url_encodes_model_arn() {
        let client = HttpInferenceClient::new(
            "https://bedrock-runtime.us-east-1.amazonaws.com".to_string(),
            "arn:aws:sagemaker:us-east-1:123456789012:endpoint/chronos-bolt-base".to_string(),
            None,
        );
        let url = client.invoke_url().unwrap();

        assert_eq!(url.path_segments().unwrap().count(), 3);
        assert!(url.path().starts_with("/model/arn:aws:sagemaker"));
        assert!(url.path().contains("endpoint%2Fchronos-bolt-base"));
        assert!(url.path().ends_with("/invoke"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let client = HttpInferenceClient::new("http://127.0.0.1:9".to_string(), "m".to_string(), None);
        let err = client
            .predict(&InferenceRequest::new(vec![1.0], 1, vec![0.5]))
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::EndpointInvocation(_)));
    }

    #[tokio::test]
    async fn test_endpoint_server_error() {
        let url = serve_once("500 Internal Server Error", r#"{"message":"ModelError"}"#).await;
        let client = HttpInferenceClient::new(url, "chronos-bolt-base".to_string(), None);

        let err = client
            .predict(&InferenceRequest::new(vec![1.0], 1, vec![0.5]))
            .await
            .unwrap_err();
        match err {
            ForecastError::EndpointInvocation(msg) => assert!(msg.contains("500"), "{}", msg),
            other => panic!("expected EndpointInvocation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prediction_over_http() {
        let url = serve_once("200 OK", r#"{"predictions":[{"mean":[3.0],"0.5":[3.0]}]}"#).await;
        let client = HttpInferenceClient::new(url, "chronos-bolt-base".to_string(), Some("k".to_string()));

        let prediction = client
            .predict(&InferenceRequest::new(vec![1.0, 2.0], 1, vec![0.5]))
            .await
            .unwrap();
        assert_eq!(prediction.mean(), Some(&[3.0][..]));
    }
}
