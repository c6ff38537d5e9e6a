use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use tripwise_core::config::BookingConfig;
use tripwise_core::domain::hotel::HotelQuery;

use crate::retry::RetryPolicy;
use crate::transport::{
    array_len, id_to_string, rejection_message, BookingRequest, BookingTransport,
};
use crate::ProviderError;

const SEARCH_DESTINATION_PATH: &str = "/hotels/searchDestination";
const SEARCH_HOTELS_PATH: &str = "/hotels/searchHotels";
const PREFERRED_DEST_TYPES: &[&str] = &["CITY", "REGION", "DISTRICT"];
const FALLBACK_SEARCH_TYPE: &str = "CITY";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDestination {
    pub dest_id: String,
    pub search_type: String,
}

#[async_trait]
pub trait HotelProvider: Send + Sync {
    async fn resolve_destination(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Option<ResolvedDestination>;

    async fn search(&self, query: &HotelQuery) -> Result<Value, ProviderError>;
}

type DestinationKey = (String, Option<String>);

pub struct BookingHotelProvider {
    transport: Arc<dyn BookingTransport>,
    retry: RetryPolicy,
    request_timeout: Duration,
    location_timeout: Duration,
    destinations: RwLock<HashMap<DestinationKey, ResolvedDestination>>,
}

impl BookingHotelProvider {
    pub fn new(
        transport: Arc<dyn BookingTransport>,
        retry: RetryPolicy,
        request_timeout: Duration,
        location_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            retry,
            request_timeout,
            location_timeout,
            destinations: RwLock::default(),
        }
    }

    pub fn from_config(transport: Arc<dyn BookingTransport>, config: &BookingConfig) -> Self {
        Self::new(
            transport,
            RetryPolicy::from_config(config),
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.location_timeout_secs),
        )
    }

    fn search_request(&self, query: &HotelQuery, destination: &ResolvedDestination) -> BookingRequest {
        BookingRequest::new(SEARCH_HOTELS_PATH, self.request_timeout)
            .param("dest_id", destination.dest_id.as_str())
            .param("search_type", destination.search_type.as_str())
            .param("arrival_date", query.arrival_date.as_str())
            .param("departure_date", query.departure_date.as_str())
            .param("adults", query.adults.to_string())
            .param("room_qty", query.room_qty.to_string())
            .param("page_number", query.page_number.to_string())
            .param("units", query.units.as_str())
            .param("temperature_unit", query.temperature_unit.as_str())
            .param("languagecode", query.language_code.as_str())
            .param("currency_code", query.currency_code.as_str())
            .optional_param("children_age", query.children_age.clone())
            .optional_param("price_min", positive_amount(query.price_min))
            .optional_param("price_max", positive_amount(query.price_max))
            .optional_param("sort_by", query.sort_by.clone())
            .optional_param("categories_filter", query.categories_filter.clone())
            .optional_param("location", query.location.clone())
    }
}

#[async_trait]
impl HotelProvider for BookingHotelProvider {
    async fn resolve_destination(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Option<ResolvedDestination> {
        let key = (text.to_string(), language.map(str::to_string));
        if let Some(cached) = self.destinations.read().await.get(&key) {
            debug!(event_name = "booking.location.cache_hit", place = text, "destination cached");
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
                    "hotel destination lookup failed"
                );
                return None;
            }
        };

        let destination = pick_destination(&payload)?;
        self.destinations.write().await.insert(key, destination.clone());
        Some(destination)
    }

    async fn search(&self, query: &HotelQuery) -> Result<Value, ProviderError> {
        let Some(destination) = self.resolve_destination(&query.destination, None).await else {
            return Err(ProviderError::LocationNotFound { place: query.destination.clone() });
        };

        let request = self.search_request(query, &destination);
        info!(
            event_name = "booking.search.started",
            operation = "hotels.search",
            destination = %query.destination,
            arrival_date = %query.arrival_date,
            departure_date = %query.departure_date,
            "searching hotels"
        );

        let transport = &self.transport;
        let request = &request;
        let payload =
            self.retry.execute("hotels.search", move || transport.get_json(request)).await?;

        if let Some(message) = rejection_message(&payload) {
            warn!(
                event_name = "booking.search.rejected",
                operation = "hotels.search",
                message = %message,
                "hotel search returned status false"
            );
            return Err(ProviderError::Rejected { operation: "hotels.search", message });
        }

        let offers = array_len(&payload, "/data/hotels");
        debug!(
            event_name = "booking.search.completed",
            operation = "hotels.search",
            offers,
            "hotel search completed"
        );
        Ok(payload)
    }
}

/// Prefers city-like destinations over single properties, otherwise the first entry.
fn pick_destination(payload: &Value) -> Option<ResolvedDestination> {
    let entries = payload.get("data").and_then(Value::as_array)?;

    let preferred = entries.iter().find_map(|entry| {
        let dest_type = dest_type(entry)?;
        if !PREFERRED_DEST_TYPES.contains(&dest_type.as_str()) {
            return None;
        }
        let dest_id = entry.get("dest_id").and_then(id_to_string)?;
        Some(ResolvedDestination { dest_id, search_type: dest_type })
    });
    if preferred.is_some() {
        return preferred;
    }

    let first = entries.first()?;
    let dest_id = first.get("dest_id").and_then(id_to_string)?;
    let search_type = dest_type(first).unwrap_or_else(|| FALLBACK_SEARCH_TYPE.to_string());
    Some(ResolvedDestination { dest_id, search_type })
}

fn dest_type(entry: &Value) -> Option<String> {
    entry
        .get("dest_type")
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_ascii_uppercase)
}

fn positive_amount(value: Option<f64>) -> Option<String> {
    value.filter(|amount| *amount > 0.0).map(|amount| amount.to_string())
}
