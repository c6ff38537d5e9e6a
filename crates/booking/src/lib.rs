//! Booking.com (RapidAPI) search providers.
//!
//! Each provider resolves free-text places to provider ids, memoizes the answer for
//! its own lifetime, then issues one search request under a [`RetryPolicy`]. The HTTP
//! layer sits behind [`BookingTransport`] so tests can script responses.

pub mod flights;
pub mod hotels;
pub mod retry;
pub mod transport;

use thiserror::Error;

pub use flights::{BookingFlightProvider, FlightProvider};
pub use hotels::{BookingHotelProvider, HotelProvider, ResolvedDestination};
pub use retry::RetryPolicy;
pub use transport::{BookingRequest, BookingTransport, HttpBookingTransport, TransportError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("could not find location `{place}`")]
    LocationNotFound { place: String },
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { operation: &'static str, attempts: u32, last_error: TransportError },
    #[error("{operation} was rejected by the provider: {message}")]
    Rejected { operation: &'static str, message: String },
}
