//! Core types for the tripwise travel assistant: layered configuration, the query
//! and offer model, and the domain error taxonomy shared by the other crates.

pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::flight::{CabinClass, FlightQuery, SortOption, StopOption};
pub use domain::hotel::{HotelQuery, TemperatureUnit, Units};
pub use domain::offer::{EssentialFlightOffer, EssentialHotelOffer, MAX_ESSENTIAL_OFFERS};
pub use errors::{DomainError, QueryKind};
