use serde::{Deserialize, Serialize};

/// Upper bound on offers kept from a single provider response.
pub const MAX_ESSENTIAL_OFFERS: usize = 20;

/// Flight offer reduced to the fields the formatter needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EssentialFlightOffer {
    pub price: f64,
    pub airline: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub origin_airport: String,
    pub destination_airport: String,
    pub stops: u32,
    pub duration_secs: u64,
}

impl EssentialFlightOffer {
    pub fn is_non_stop(&self) -> bool {
        self.stops == 0
    }
}

/// Hotel offer reduced to the fields the formatter needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EssentialHotelOffer {
    pub name: String,
    pub total_price: f64,
    pub price_per_night: f64,
    pub rating: f64,
    pub accessibility_label: String,
}
