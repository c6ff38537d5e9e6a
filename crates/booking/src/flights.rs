use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use tripwise_core::config::BookingConfig;
use tripwise_core::domain::flight::FlightQuery;

use crate::retry::RetryPolicy;
use crate::transport::{
    array_len, id_to_string, rejection_message, BookingRequest, BookingTransport,
};
use crate::ProviderError;

const SEARCH_DESTINATION_PATH: &str = "/flights/searchDestination";
const SEARCH_FLIGHTS_PATH: &str = "/flights/searchFlights";

#[async_trait]
pub trait FlightProvider: Send + Sync {
    /// Maps an IATA code or place name to the provider's location id.
    async fn resolve_location(&self, text: &str, language: Option<&str>) -> Option<String>;

    /// Resolves both endpoints, then runs one search under the retry policy and
    /// returns the raw payload.
    async fn search(&self, query: &FlightQuery) -> Result<Value, ProviderError>;
}

type LocationKey = (String, Option<String>);

pub struct BookingFlightProvider {
    transport: Arc<dyn BookingTransport>,
    retry: RetryPolicy,
    request_timeout: Duration,
    location_timeout: Duration,
    locations: RwLock<HashMap<LocationKey, String>>,
}

impl BookingFlightProvider {
    pub fn new(
        transport: Arc<dyn BookingTransport>,
        retry: RetryPolicy,
        request_timeout: Duration,
        location_timeout: Duration,
    ) -> Self {
        Self { transport, retry, request_timeout, location_timeout, locations: RwLock::default() }
    }

    pub fn from_config(transport: Arc<dyn BookingTransport>, config: &BookingConfig) -> Self {
        Self::new(
            transport,
            RetryPolicy::from_config(config),
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.location_timeout_secs),
        )
    }

    fn search_request(&self, query: &FlightQuery, from_id: &str, to_id: &str) -> BookingRequest {
        BookingRequest::new(SEARCH_FLIGHTS_PATH, self.request_timeout)
            .param("fromId", from_id)
            .param("toId", to_id)
            .param("departDate", query.departure_date.as_str())
            .param("adults", query.adults.to_string())
            .param("sort", query.sort_option.as_str())
            .param("cabinClass", query.cabin_class.as_str())
            .param("currency_code", query.currency_code.as_str())
            .param("pageNo", "1")
            .optional_param("returnDate", query.return_date.clone())
            .optional_param("children", query.children.clone())
            .optional_param("stops", query.stops.map(|stops| stops.as_str()))
    }
}

#[async_trait]
impl FlightProvider for BookingFlightProvider {
    async fn resolve_location(&self, text: &str, language: Option<&str>) -> Option<String> {
        let key = (text.to_string(), language.map(str::to_string));
        if let Some(cached) = self.locations.read().await.get(&key) {
            debug!(event_name = "booking.location.cache_hit", place = text, "location cached");
            return Some(cached.clone());
        }

        let request = BookingRequest::new(SEARCH_DESTINATION_PATH, self.location_timeout)
            .param("query", text)
            .optional_param("languagecode", language);

        let payload = match self.transport.get_json(&request).await {
            Ok(payload) => payload,
            Err(error) => {
                warn!(
                    event_name = "booking.location.lookup_failed",
                    place = text,
                    error = %error,
                    "flight location lookup failed"
                );
                return None;
            }
        };

        let location_id = pick_location(&payload)?;
        self.locations.write().await.insert(key, location_id.clone());
        Some(location_id)
    }

    async fn search(&self, query: &FlightQuery) -> Result<Value, ProviderError> {
        let language = query.language_code.as_deref();
        let Some(from_id) = self.resolve_location(&query.origin, language).await else {
            return Err(ProviderError::LocationNotFound { place: query.origin.clone() });
        };
        let Some(to_id) = self.resolve_location(&query.destination, language).await else {
            return Err(ProviderError::LocationNotFound { place: query.destination.clone() });
        };

        let request = self.search_request(query, &from_id, &to_id);
        info!(
            event_name = "booking.search.started",
            operation = "flights.search",
            origin = %query.origin,
            destination = %query.destination,
            departure_date = %query.departure_date,
            "searching flights"
        );

        let transport = &self.transport;
        let request = &request;
        let payload = self
            .retry
            .execute("flights.search", move || transport.get_json(request))
            .await?;

        if let Some(message) = rejection_message(&payload) {
            warn!(
                event_name = "booking.search.rejected",
                operation = "flights.search",
                message = %message,
                "flight search returned status false"
            );
            return Err(ProviderError::Rejected { operation: "flights.search", message });
        }

        let offers = array_len(&payload, "/data/flightOffers");
        debug!(
            event_name = "booking.search.completed",
            operation = "flights.search",
            offers,
            "flight search completed"
        );
        Ok(payload)
    }
}

/// Prefers an `AIRPORT` entry, otherwise the first entry with an id.
fn pick_location(payload: &Value) -> Option<String> {
    let entries = payload.get("data").and_then(Value::as_array)?;
    let airport = entries
        .iter()
        .find(|entry| entry.get("type").and_then(Value::as_str) == Some("AIRPORT"))
        .and_then(|entry| entry.get("id").and_then(id_to_string));

    airport.or_else(|| entries.first().and_then(|entry| entry.get("id")).and_then(id_to_string))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tripwise_core::domain::flight::{FlightQuery, StopOption};

    use super::{BookingFlightProvider, FlightProvider, SEARCH_DESTINATION_PATH, SEARCH_FLIGHTS_PATH};
    use crate::retry::RetryPolicy;
    use crate::transport::testing::ScriptedTransport;
    use crate::transport::TransportError;
    use crate::ProviderError;

    fn provider(transport: Arc<ScriptedTransport>) -> BookingFlightProvider {
        BookingFlightProvider::new(
            transport,
            RetryPolicy { max_retries: 3, delay: Duration::ZERO },
            Duration::from_secs(30),
            Duration::from_secs(15),
        )
    }

    fn lookup(id: &str) -> Result<serde_json::Value, TransportError> {
        Ok(json!({"status": true, "data": [
            {"id": format!("{id}_CITY"), "type": "CITY"},
            {"id": format!("{id}.AIRPORT"), "type": "AIRPORT"}
        ]}))
    }

    fn offers() -> Result<serde_json::Value, TransportError> {
        Ok(json!({"status": true, "data": {"flightOffers": [{"token": "a"}]}}))
    }

    fn unavailable() -> Result<serde_json::Value, TransportError> {
        Err(TransportError::Status { status: 502, body: "bad gateway".to_string() })
    }

    #[tokio::test]
    async fn resolution_prefers_airports_and_is_memoized() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![lookup("CDG")]));
        let provider = provider(transport.clone());

        let first = provider.resolve_location("CDG", None).await;
        let second = provider.resolve_location("CDG", None).await;

        assert_eq!(first.as_deref(), Some("CDG.AIRPORT"));
        assert_eq!(second, first);
        assert_eq!(transport.calls_to(SEARCH_DESTINATION_PATH).await, 1);
    }

    #[tokio::test]
    async fn resolution_falls_back_to_first_entry() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![Ok(json!({
            "data": [{"id": "PAR_CITY", "type": "CITY"}, {"id": "IDF", "type": "REGION"}]
        }))]));

        let resolved = provider(transport).resolve_location("Paris", Some("pl")).await;
        assert_eq!(resolved.as_deref(), Some("PAR_CITY"));
    }

    #[tokio::test]
    async fn failed_lookups_are_not_cached() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![
            Ok(json!({"data": []})),
            lookup("LHR"),
        ]));
        let provider = provider(transport.clone());

        assert_eq!(provider.resolve_location("LHR", None).await, None);
        assert_eq!(provider.resolve_location("LHR", None).await.as_deref(), Some("LHR.AIRPORT"));
        assert_eq!(transport.calls_to(SEARCH_DESTINATION_PATH).await, 2);
    }

    #[tokio::test]
    async fn cache_is_keyed_by_language() {
        let transport =
            Arc::new(ScriptedTransport::with_script(vec![lookup("WAW"), lookup("WAW")]));
        let provider = provider(transport.clone());

        provider.resolve_location("WAW", None).await;
        provider.resolve_location("WAW", Some("en-gb")).await;

        let requests = transport.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].param_value("languagecode"), Some("en-gb"));
    }

    #[tokio::test]
    async fn search_survives_two_failures() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![
            lookup("WAW"),
            lookup("CDG"),
            unavailable(),
            unavailable(),
            offers(),
        ]));

        let payload = provider(transport.clone())
            .search(&FlightQuery::new("CDG", "2024-01-11"))
            .await
            .expect("third attempt succeeds");

        assert_eq!(payload["data"]["flightOffers"][0]["token"], "a");
        assert_eq!(transport.calls_to(SEARCH_FLIGHTS_PATH).await, 3);
    }

    #[tokio::test]
    async fn false_status_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![
            lookup("WAW"),
            lookup("CDG"),
            Ok(json!({"status": false, "message": "Invalid date"})),
            offers(),
        ]));

        let result = provider(transport.clone()).search(&FlightQuery::new("CDG", "2024-01-11")).await;

        assert_eq!(
            result,
            Err(ProviderError::Rejected {
                operation: "flights.search",
                message: "Invalid date".to_string()
            })
        );
        assert_eq!(transport.calls_to(SEARCH_FLIGHTS_PATH).await, 1);
    }

    #[tokio::test]
    async fn unknown_destination_skips_search() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![
            lookup("WAW"),
            Ok(json!({"data": []})),
        ]));

        let result = provider(transport.clone()).search(&FlightQuery::new("XXX", "2024-01-11")).await;

        assert_eq!(result, Err(ProviderError::LocationNotFound { place: "XXX".to_string() }));
        assert_eq!(transport.calls_to(SEARCH_FLIGHTS_PATH).await, 0);
    }

    #[tokio::test]
    async fn request_carries_required_and_present_optional_params() {
        let transport =
            Arc::new(ScriptedTransport::with_script(vec![lookup("WAW"), lookup("BCN"), offers()]));
        let mut query = FlightQuery::new("BCN", "2024-03-01");
        query.adults = 2;
        query.stops = Some(StopOption::NonStop);

        provider(transport.clone()).search(&query).await.expect("search succeeds");

        let requests = transport.requests().await;
        let search = requests.last().expect("search request recorded");
        assert_eq!(search.param_value("fromId"), Some("WAW.AIRPORT"));
        assert_eq!(search.param_value("toId"), Some("BCN.AIRPORT"));
        assert_eq!(search.param_value("departDate"), Some("2024-03-01"));
        assert_eq!(search.param_value("adults"), Some("2"));
        assert_eq!(search.param_value("sort"), Some("CHEAPEST"));
        assert_eq!(search.param_value("cabinClass"), Some("ECONOMY"));
        assert_eq!(search.param_value("currency_code"), Some("PLN"));
        assert_eq!(search.param_value("pageNo"), Some("1"));
        assert_eq!(search.param_value("stops"), Some("0"));
        assert_eq!(search.param_value("returnDate"), None);
        assert_eq!(search.param_value("children"), None);
        assert_eq!(search.timeout, Duration::from_secs(30));
    }
}
