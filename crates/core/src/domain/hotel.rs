use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    blank_to_none, count_csv_entries, format_iso_date, parse_iso_date, repair_to_tomorrow,
    string_or_null,
};
use crate::errors::{DomainError, QueryKind};

pub const DEFAULT_LANGUAGE: &str = "pl";
pub const DEFAULT_CURRENCY: &str = "PLN";
pub const DEFAULT_STAY_NIGHTS: i64 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "c")]
    Celsius,
    #[serde(rename = "f")]
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Celsius => "c",
            Self::Fahrenheit => "f",
        }
    }
}

/// Hotel search parameters as extracted from an utterance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotelQuery {
    #[serde(default, deserialize_with = "string_or_null")]
    pub destination: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub arrival_date: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub departure_date: String,
    #[serde(default = "default_one")]
    pub adults: u32,
    #[serde(default)]
    pub children_age: Option<String>,
    #[serde(default = "default_one")]
    pub room_qty: u32,
    #[serde(default)]
    pub price_min: Option<f64>,
    #[serde(default)]
    pub price_max: Option<f64>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub categories_filter: Option<String>,
    #[serde(default)]
    pub units: Units,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    #[serde(default = "default_language")]
    pub language_code: String,
    #[serde(default = "default_currency")]
    pub currency_code: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_one")]
    pub page_number: u32,
}

fn default_one() -> u32 {
    1
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl HotelQuery {
    pub fn new(
        destination: impl Into<String>,
        arrival_date: impl Into<String>,
        departure_date: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            arrival_date: arrival_date.into(),
            departure_date: departure_date.into(),
            adults: 1,
            children_age: None,
            room_qty: 1,
            price_min: None,
            price_max: None,
            sort_by: None,
            categories_filter: None,
            units: Units::default(),
            temperature_unit: TemperatureUnit::default(),
            language_code: default_language(),
            currency_code: default_currency(),
            location: None,
            page_number: 1,
        }
    }

    pub fn total_guests(&self) -> u32 {
        self.adults + count_csv_entries(self.children_age.as_deref())
    }

    /// Length of stay. Never below one; unparseable dates count as one night.
    pub fn nights(&self) -> u32 {
        match (parse_iso_date(&self.arrival_date), parse_iso_date(&self.departure_date)) {
            (Some(arrival), Some(departure)) => {
                (departure - arrival).num_days().clamp(1, i64::from(u32::MAX)) as u32
            }
            _ => 1,
        }
    }

    pub fn repair(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        self.arrival_date = repair_to_tomorrow(&self.arrival_date, today);
        if parse_iso_date(&self.departure_date).is_none() {
            let arrival = parse_iso_date(&self.arrival_date)
                .unwrap_or_else(|| today + Duration::days(1));
            self.departure_date = format_iso_date(arrival + Duration::days(DEFAULT_STAY_NIGHTS));
        }

        self.destination = self.destination.trim().to_string();
        if self.adults == 0 {
            self.adults = 1;
        }
        if self.room_qty == 0 {
            self.room_qty = 1;
        }
        if self.page_number == 0 {
            self.page_number = 1;
        }
        if self.language_code.trim().is_empty() {
            self.language_code = default_language();
        }
        if self.currency_code.trim().is_empty() {
            self.currency_code = default_currency();
        }
        self.children_age = blank_to_none(self.children_age.take());
        self.sort_by = blank_to_none(self.sort_by.take());
        self.categories_filter = blank_to_none(self.categories_filter.take());
        self.location = blank_to_none(self.location.take());

        if self.destination.is_empty() {
            return Err(DomainError::MissingRequiredField {
                kind: QueryKind::Hotel,
                field: "destination",
            });
        }
        Ok(())
    }

    /// Declared output schema handed to the model as format instructions.
    pub fn json_schema() -> Value {
        json!({
            "title": "HotelQuery",
            "type": "object",
            "required": ["destination", "arrival_date", "departure_date"],
            "properties": {
                "destination": {"type": "string", "description": "City or place name"},
                "arrival_date": {"type": "string", "description": "Check-in date YYYY-MM-DD"},
                "departure_date": {"type": "string", "description": "Check-out date YYYY-MM-DD"},
                "adults": {"type": "integer", "minimum": 1, "default": 1, "description": "Adult guests (18+)"},
                "children_age": {"type": ["string", "null"], "description": "Children ages separated by commas"},
                "room_qty": {"type": "integer", "minimum": 1, "default": 1},
                "price_min": {"type": ["number", "null"], "description": "Minimum price per night"},
                "price_max": {"type": ["number", "null"], "description": "Maximum price per night"},
                "sort_by": {"type": ["string", "null"], "description": "price, distance or review_score"},
                "categories_filter": {"type": ["string", "null"], "description": "Hotel category filter"},
                "units": {"enum": ["metric", "imperial"], "default": "metric"},
                "temperature_unit": {"enum": ["c", "f"], "default": "c"},
                "language_code": {"type": "string", "default": DEFAULT_LANGUAGE},
                "currency_code": {"type": "string", "default": DEFAULT_CURRENCY},
                "location": {"type": ["string", "null"], "description": "User location"},
                "page_number": {"type": "integer", "minimum": 1, "default": 1}
            }
        })
    }
}
