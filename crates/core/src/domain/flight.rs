use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use tracing::warn;

use super::{
    blank_to_none, count_csv_entries, is_tomorrow_placeholder, parse_iso_date,
    repair_to_tomorrow, string_or_null,
};
use crate::errors::{DomainError, QueryKind};

pub const DEFAULT_ORIGIN: &str = "WAW";
pub const DEFAULT_CURRENCY: &str = "PLN";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Economy => "ECONOMY",
            Self::PremiumEconomy => "PREMIUM_ECONOMY",
            Self::Business => "BUSINESS",
            Self::First => "FIRST",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOption {
    Best,
    #[default]
    Cheapest,
    Fastest,
}

impl SortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "BEST",
            Self::Cheapest => "CHEAPEST",
            Self::Fastest => "FASTEST",
        }
    }
}

/// Stop preference. `NoPreference` is the provider's literal `none`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOption {
    NoPreference,
    NonStop,
    OneStop,
    TwoStops,
}

impl StopOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoPreference => "none",
            Self::NonStop => "0",
            Self::OneStop => "1",
            Self::TwoStops => "2",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::NoPreference),
            "0" => Some(Self::NonStop),
            "1" => Some(Self::OneStop),
            "2" => Some(Self::TwoStops),
            _ => None,
        }
    }
}

impl Serialize for StopOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StopOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        Self::parse(&raw).ok_or_else(|| {
            de::Error::invalid_value(de::Unexpected::Str(&raw), &"one of none, 0, 1, 2")
        })
    }
}

/// Flight search parameters as extracted from an utterance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlightQuery {
    #[serde(default = "default_origin", deserialize_with = "string_or_null")]
    pub origin: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub destination: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub departure_date: String,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default = "default_adults")]
    pub adults: u32,
    #[serde(default)]
    pub children: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub preferred_time: Option<String>,
    #[serde(default)]
    pub cabin_class: CabinClass,
    #[serde(default)]
    pub sort_option: SortOption,
    #[serde(default)]
    pub stops: Option<StopOption>,
    #[serde(default = "default_currency")]
    pub currency_code: String,
    #[serde(default)]
    pub language_code: Option<String>,
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_adults() -> u32 {
    1
}

impl FlightQuery {
    pub fn new(destination: impl Into<String>, departure_date: impl Into<String>) -> Self {
        Self {
            origin: default_origin(),
            destination: destination.into(),
            departure_date: departure_date.into(),
            return_date: None,
            adults: 1,
            children: None,
            budget: None,
            preferred_time: None,
            cabin_class: CabinClass::default(),
            sort_option: SortOption::default(),
            stops: None,
            currency_code: default_currency(),
            language_code: None,
        }
    }

    pub fn passenger_count(&self) -> u32 {
        self.adults + count_csv_entries(self.children.as_deref())
    }

    /// Applies the deterministic fallbacks that run after every extraction.
    ///
    /// Running it again on its own output changes nothing.
    pub fn repair(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        self.departure_date = repair_to_tomorrow(&self.departure_date, today);

        if self.origin.trim().is_empty() {
            self.origin = default_origin();
        }
        self.origin = self.origin.trim().to_ascii_uppercase();
        self.destination = self.destination.trim().to_ascii_uppercase();
        if self.adults == 0 {
            self.adults = 1;
        }
        if self.currency_code.trim().is_empty() {
            self.currency_code = default_currency();
        }
        self.children = blank_to_none(self.children.take());
        self.language_code = blank_to_none(self.language_code.take());

        self.return_date = match blank_to_none(self.return_date.take()) {
            None => None,
            Some(value) if is_tomorrow_placeholder(&value) => {
                Some(repair_to_tomorrow(&value, today))
            }
            Some(value) => match parse_iso_date(&value) {
                Some(_) => Some(value.trim().to_string()),
                None => {
                    warn!(
                        event_name = "domain.flight.return_date_dropped",
                        value = %value,
                        "return date is not an ISO date; searching one-way"
                    );
                    None
                }
            },
        };

        if self.destination.is_empty() {
            return Err(DomainError::MissingRequiredField {
                kind: QueryKind::Flight,
                field: "destination",
            });
        }
        Ok(())
    }

    /// Declared output schema handed to the model as format instructions.
    pub fn json_schema() -> Value {
        json!({
            "title": "FlightQuery",
            "type": "object",
            "required": ["origin", "destination", "departure_date"],
            "properties": {
                "origin": {"type": "string", "description": "IATA code of the departure airport", "default": DEFAULT_ORIGIN},
                "destination": {"type": "string", "description": "IATA code of the destination airport"},
                "departure_date": {"type": "string", "description": "Departure date YYYY-MM-DD"},
                "return_date": {"type": ["string", "null"], "description": "Return date YYYY-MM-DD (optional)"},
                "adults": {"type": "integer", "minimum": 1, "default": 1, "description": "Adult passengers (18+)"},
                "children": {"type": ["string", "null"], "description": "Children ages separated by commas, e.g. '8,15,17'"},
                "budget": {"type": ["number", "null"], "description": "Total budget in the query currency"},
                "preferred_time": {"type": ["string", "null"], "description": "Preferred departure time HH:MM"},
                "cabin_class": {"enum": ["ECONOMY", "PREMIUM_ECONOMY", "BUSINESS", "FIRST"], "default": "ECONOMY"},
                "sort_option": {"enum": ["BEST", "CHEAPEST", "FASTEST"], "default": "CHEAPEST"},
                "stops": {"enum": ["none", "0", "1", "2", null], "description": "Stop preference"},
                "currency_code": {"type": "string", "default": DEFAULT_CURRENCY},
                "language_code": {"type": ["string", "null"], "description": "Language code for results"}
            }
        })
    }
}
