use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use tripwise_core::domain::flight::FlightQuery;
use tripwise_core::domain::hotel::HotelQuery;
use tripwise_core::domain::offer::{EssentialFlightOffer, EssentialHotelOffer};

use crate::llm::Gateway;
use crate::prompts::{PromptKind, Prompts};
use crate::AgentError;

pub const SHORTLIST_SIZE: usize = 5;

/// Non-stop flights first, then ascending price. Equal keys keep provider order.
pub fn rank_flights(offers: &[EssentialFlightOffer]) -> Vec<EssentialFlightOffer> {
    let mut ranked = offers.to_vec();
    ranked.sort_by(|left, right| {
        (!left.is_non_stop())
            .cmp(&!right.is_non_stop())
            .then_with(|| compare_price(left.price, right.price))
    });
    ranked
}

/// Ascending price per night. Equal prices keep provider order.
pub fn rank_hotels(offers: &[EssentialHotelOffer]) -> Vec<EssentialHotelOffer> {
    let mut ranked = offers.to_vec();
    ranked.sort_by(|left, right| compare_price(left.price_per_night, right.price_per_night));
    ranked
}

fn compare_price(left: f64, right: f64) -> Ordering {
    left.total_cmp(&right)
}

#[derive(Clone)]
pub struct ResponseFormatter {
    gateway: Gateway,
    prompts: Arc<Prompts>,
}

impl ResponseFormatter {
    pub fn new(gateway: Gateway, prompts: Arc<Prompts>) -> Self {
        Self { gateway, prompts }
    }

    pub async fn format_flights(
        &self,
        utterance: &str,
        query: &FlightQuery,
        offers: &[EssentialFlightOffer],
        history: &str,
    ) -> Result<String, AgentError> {
        let shortlist: Vec<_> = rank_flights(offers).into_iter().take(SHORTLIST_SIZE).collect();
        self.render_and_invoke(FormatRequest {
            category: "FLIGHTS",
            query: utterance,
            history,
            params: serde_json::to_string(query)?,
            offers: serde_json::to_string_pretty(&shortlist)?,
            shown: shortlist.len(),
            total: offers.len(),
            passengers: query.passenger_count(),
            currency: &query.currency_code,
            budget: query.budget,
            price_cap_per_night: None,
        })
        .await
    }

    pub async fn format_hotels(
        &self,
        utterance: &str,
        query: &HotelQuery,
        offers: &[EssentialHotelOffer],
        history: &str,
    ) -> Result<String, AgentError> {
        let shortlist: Vec<_> = rank_hotels(offers).into_iter().take(SHORTLIST_SIZE).collect();
        self.render_and_invoke(FormatRequest {
            category: "HOTELS",
            query: utterance,
            history,
            params: serde_json::to_string(query)?,
            offers: serde_json::to_string_pretty(&shortlist)?,
            shown: shortlist.len(),
            total: offers.len(),
            passengers: query.total_guests(),
            currency: &query.currency_code,
            budget: None,
            price_cap_per_night: query.price_max,
        })
        .await
    }

    async fn render_and_invoke(&self, request: FormatRequest<'_>) -> Result<String, AgentError> {
        debug!(
            event_name = "agent.formatter.shortlist",
            category = request.category,
            shown = request.shown,
            total = request.total,
            "formatting ranked shortlist"
        );
        let prompt = self.prompts.render(PromptKind::FormatResults, &request)?;
        Ok(self.gateway.invoke(&prompt).await?)
    }
}

#[derive(Serialize)]
struct FormatRequest<'a> {
    category: &'static str,
    query: &'a str,
    history: &'a str,
    params: String,
    offers: String,
    shown: usize,
    total: usize,
    passengers: u32,
    currency: &'a str,
    budget: Option<f64>,
    price_cap_per_night: Option<f64>,
}
