use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;
use tripwise_core::domain::offer::{
    EssentialFlightOffer, EssentialHotelOffer, MAX_ESSENTIAL_OFFERS,
};

pub const UNKNOWN_AIRLINE: &str = "Unknown";
pub const UNKNOWN_HOTEL: &str = "Unknown Hotel";
pub const LABEL_MAX_CHARS: usize = 100;

const FLIGHT_OFFERS_POINTER: &str = "/data/flightOffers";
const HOTELS_POINTER: &str = "/data/hotels";

/// Ordered lookups; the first pointer that yields a usable value wins.
const HOTEL_NAME_POINTERS: &[&str] = &["/property/name", "/name"];
const HOTEL_PRICE_POINTERS: &[&str] =
    &["/property/priceBreakdown/grossPrice", "/priceBreakdown/grossPrice"];
const HOTEL_SCORE_POINTERS: &[&str] = &["/property/reviewScore", "/reviewScore"];
const HOTEL_LABEL_POINTERS: &[&str] = &["/accessibilityLabel", "/property/accessibilityLabel"];

pub fn reduce_flights(payload: &Value) -> Vec<EssentialFlightOffer> {
    let Some(items) = payload.pointer(FLIGHT_OFFERS_POINTER).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let offer = reduce_flight(item);
            if offer.is_none() {
                debug!(event_name = "agent.reducer.skipped", kind = "flight", index, "skipping malformed offer");
            }
            offer
        })
        .take(MAX_ESSENTIAL_OFFERS)
        .collect()
}

/// `nights` divides the stay price; values below one are treated as one.
pub fn reduce_hotels(payload: &Value, nights: u32) -> Vec<EssentialHotelOffer> {
    let Some(items) = payload.pointer(HOTELS_POINTER).and_then(Value::as_array) else {
        return Vec::new();
    };
    let nights = f64::from(nights.max(1));

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let offer = reduce_hotel(item, nights);
            if offer.is_none() {
                debug!(event_name = "agent.reducer.skipped", kind = "hotel", index, "skipping malformed offer");
            }
            offer
        })
        .take(MAX_ESSENTIAL_OFFERS)
        .collect()
}

fn reduce_flight(item: &Value) -> Option<EssentialFlightOffer> {
    let price = normalize_price(item.pointer("/priceBreakdown/total")?)?;
    let segment = item.pointer("/segments/0")?;
    let legs = segment.get("legs").and_then(Value::as_array).filter(|legs| !legs.is_empty())?;
    let first_leg = legs.first()?;
    let last_leg = legs.last()?;

    Some(EssentialFlightOffer {
        price,
        airline: text_at(first_leg, "/carriersData/0/name")
            .unwrap_or_else(|| UNKNOWN_AIRLINE.to_string()),
        departure_time: text_at(first_leg, "/departureTime").unwrap_or_default(),
        arrival_time: text_at(last_leg, "/arrivalTime").unwrap_or_default(),
        origin_airport: text_at(first_leg, "/departureAirport/code").unwrap_or_default(),
        destination_airport: text_at(last_leg, "/arrivalAirport/code").unwrap_or_default(),
        stops: u32::try_from(legs.len() - 1).unwrap_or(u32::MAX),
        duration_secs: segment.get("totalTime").and_then(number).map_or(0, |secs| secs.max(0.0) as u64),
    })
}

fn reduce_hotel(item: &Value, nights: f64) -> Option<EssentialHotelOffer> {
    if !item.is_object() {
        return None;
    }
    let total_price = first_match(item, HOTEL_PRICE_POINTERS, normalize_price)?;
    let name = first_match(item, HOTEL_NAME_POINTERS, non_blank_text)
        .unwrap_or_else(|| UNKNOWN_HOTEL.to_string());
    let label = first_match(item, HOTEL_LABEL_POINTERS, non_blank_text).unwrap_or_default();
    let rating = first_match(item, HOTEL_SCORE_POINTERS, number)
        .or_else(|| rating_from_label(&label))
        .unwrap_or(0.0);

    Some(EssentialHotelOffer {
        name,
        total_price,
        price_per_night: total_price / nights,
        rating,
        accessibility_label: label.chars().take(LABEL_MAX_CHARS).collect(),
    })
}

/// Accepts `{units, nanos}`, `{value}` or a bare number.
pub fn normalize_price(value: &Value) -> Option<f64> {
    if let Some(flat) = number(value) {
        return Some(flat);
    }
    if let Some(flat) = value.get("value").and_then(number) {
        return Some(flat);
    }
    let units = value.get("units").and_then(number)?;
    let nanos = value.get("nanos").and_then(number).unwrap_or(0.0);
    Some(units + nanos / 1e9)
}

/// First decimal number in the label, with `.` or `,` as separator.
pub fn rating_from_label(label: &str) -> Option<f64> {
    static DECIMAL: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = DECIMAL.get_or_init(|| Regex::new(r"(\d+,\d+|\d+\.\d+)").ok()).as_ref()?;
    let found = pattern.find(label)?;
    found.as_str().replace(',', ".").parse().ok()
}

fn first_match<T>(item: &Value, pointers: &[&str], read: fn(&Value) -> Option<T>) -> Option<T> {
    pointers.iter().find_map(|pointer| item.pointer(pointer).and_then(read))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn non_blank_text(value: &Value) -> Option<String> {
    value.as_str().filter(|text| !text.trim().is_empty()).map(str::to_string)
}

fn text_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(non_blank_text)
}
