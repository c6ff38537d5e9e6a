use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tripwise_core::config::BookingConfig;

const ERROR_BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response body was not valid json: {0}")]
    Decode(String),
}

/// One GET against the provider API. `path` is relative to the configured base url.
#[derive(Clone, Debug, PartialEq)]
pub struct BookingRequest {
    pub path: &'static str,
    pub params: Vec<(&'static str, String)>,
    pub timeout: Duration,
}

impl BookingRequest {
    pub fn new(path: &'static str, timeout: Duration) -> Self {
        Self { path, params: Vec::new(), timeout }
    }

    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    /// Adds the parameter only when a value is present; absent values are omitted
    /// rather than sent empty.
    pub fn optional_param(self, key: &'static str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(name, _)| *name == key).map(|(_, value)| value.as_str())
    }
}

#[async_trait]
pub trait BookingTransport: Send + Sync {
    async fn get_json(&self, request: &BookingRequest) -> Result<Value, TransportError>;
}

pub struct HttpBookingTransport {
    client: Client,
    base_url: String,
    api_host: String,
    api_key: SecretString,
}

impl HttpBookingTransport {
    pub fn new(config: &BookingConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|error| TransportError::Request(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_host: config.api_host.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl BookingTransport for HttpBookingTransport {
    async fn get_json(&self, request: &BookingRequest) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(
            event_name = "booking.http.request",
            path = request.path,
            params = ?request.params,
            "sending provider request"
        );

        let response = self
            .client
            .get(&url)
            .header("x-rapidapi-host", &self.api_host)
            .header("x-rapidapi-key", self.api_key.expose_secret())
            .query(&request.params)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
            });
        }

        response.json::<Value>().await.map_err(|error| TransportError::Decode(error.to_string()))
    }
}

/// Reads a provider id that may arrive as either a JSON string or a number.
pub(crate) fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Length of the array at `pointer`, 0 when it is missing or not an array.
pub(crate) fn array_len(payload: &Value, pointer: &str) -> usize {
    payload.pointer(pointer).and_then(Value::as_array).map_or(0, Vec::len)
}

/// `status: false` is how the provider reports a refused request inside a 200 body.
pub(crate) fn rejection_message(payload: &Value) -> Option<String> {
    match payload.get("status") {
        Some(Value::Bool(false)) => Some(
            payload
                .get("message")
                .and_then(|message| match message {
                    Value::String(text) => Some(text.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .unwrap_or_else(|| "no message".to_string()),
        ),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{array_len, id_to_string, rejection_message, BookingRequest};

    #[test]
    fn optional_params_are_omitted_when_absent() {
        let request = BookingRequest::new("/flights/searchFlights", Duration::from_secs(30))
            .param("fromId", "WAW.AIRPORT")
            .optional_param("returnDate", None::<String>)
            .optional_param("children", Some("8,15"));

        assert_eq!(request.params.len(), 2);
        assert_eq!(request.param_value("children"), Some("8,15"));
        assert_eq!(request.param_value("returnDate"), None);
    }

    #[test]
    fn ids_are_read_from_strings_and_numbers() {
        assert_eq!(id_to_string(&json!("CDG.AIRPORT")).as_deref(), Some("CDG.AIRPORT"));
        assert_eq!(id_to_string(&json!(-372490)).as_deref(), Some("-372490"));
        assert_eq!(id_to_string(&json!("")), None);
        assert_eq!(id_to_string(&json!(null)), None);
    }

    #[test]
    fn array_len_counts_offers_and_tolerates_missing_data() {
        let payload = json!({"data": {"hotels": [{}, {}], "flightOffers": {"not": "array"}}});
        assert_eq!(array_len(&payload, "/data/hotels"), 2);
        assert_eq!(array_len(&payload, "/data/flightOffers"), 0);
        assert_eq!(array_len(&json!({"status": true}), "/data/hotels"), 0);
    }

    #[test]
    fn only_explicit_false_status_is_a_rejection() {
        assert_eq!(
            rejection_message(&json!({"status": false, "message": "quota exceeded"})).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            rejection_message(&json!({"status": false})).as_deref(),
            Some("no message")
        );
        assert_eq!(rejection_message(&json!({"status": true, "data": {}})), None);
        assert_eq!(rejection_message(&json!({"data": {}})), None);
    }
}
