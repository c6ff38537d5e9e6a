use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::info;
use tripwise_core::domain::flight::{FlightQuery, DEFAULT_ORIGIN};
use tripwise_core::domain::format_iso_date;
use tripwise_core::domain::hotel::{HotelQuery, DEFAULT_STAY_NIGHTS};

use crate::llm::{format_instructions, Gateway};
use crate::prompts::{PromptKind, Prompts};
use crate::AgentError;

pub const IATA_CODES: &[(&str, &str)] = &[
    ("WAW", "Warsaw"),
    ("CDG", "Paris"),
    ("LHR", "London"),
    ("BER", "Berlin"),
    ("FCO", "Rome"),
    ("MAD", "Madrid"),
    ("BCN", "Barcelona"),
    ("AMS", "Amsterdam"),
    ("VIE", "Vienna"),
    ("PRG", "Prague"),
    ("BUD", "Budapest"),
    ("KRK", "Krakow"),
    ("GDN", "Gdansk"),
    ("WRO", "Wroclaw"),
];

/// Turns an utterance plus history into a repaired, typed query. Repair errors such
/// as a missing destination come back as [`AgentError::Domain`].
#[derive(Clone)]
pub struct StructuredExtractor {
    gateway: Gateway,
    prompts: Arc<Prompts>,
}

impl StructuredExtractor {
    pub fn new(gateway: Gateway, prompts: Arc<Prompts>) -> Self {
        Self { gateway, prompts }
    }

    pub async fn extract_flight(
        &self,
        utterance: &str,
        history: &str,
        today: NaiveDate,
    ) -> Result<FlightQuery, AgentError> {
        let prompt = self.prompts.render(
            PromptKind::ExtractFlight,
            &json!({
                "history": history,
                "query": utterance,
                "today": format_iso_date(today),
                "iata_codes": iata_table(),
                "default_origin": DEFAULT_ORIGIN,
                "format_instructions": format_instructions::<FlightQuery>(),
            }),
        )?;

        let mut query: FlightQuery = self.gateway.invoke_structured(&prompt).await?;
        query.repair(today)?;
        info!(
            event_name = "agent.extraction.flight",
            origin = %query.origin,
            destination = %query.destination,
            departure_date = %query.departure_date,
            adults = query.adults,
            "extracted flight query"
        );
        Ok(query)
    }

    pub async fn extract_hotel(
        &self,
        utterance: &str,
        history: &str,
        today: NaiveDate,
    ) -> Result<HotelQuery, AgentError> {
        let prompt = self.prompts.render(
            PromptKind::ExtractHotel,
            &json!({
                "history": history,
                "query": utterance,
                "today": format_iso_date(today),
                "default_nights": DEFAULT_STAY_NIGHTS,
                "format_instructions": format_instructions::<HotelQuery>(),
            }),
        )?;

        let mut query: HotelQuery = self.gateway.invoke_structured(&prompt).await?;
        query.repair(today)?;
        info!(
            event_name = "agent.extraction.hotel",
            destination = %query.destination,
            arrival_date = %query.arrival_date,
            departure_date = %query.departure_date,
            nights = query.nights(),
            "extracted hotel query"
        );
        Ok(query)
    }
}

fn iata_table() -> String {
    IATA_CODES
        .iter()
        .map(|(code, city)| format!("{code}={city}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use tripwise_core::errors::DomainError;

    use super::StructuredExtractor;
    use crate::llm::testing::ScriptedLlm;
    use crate::llm::{Gateway, GatewayError};
    use crate::prompts::Prompts;
    use crate::AgentError;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date")
    }

    fn extractor(llm: Arc<ScriptedLlm>) -> StructuredExtractor {
        StructuredExtractor::new(Gateway::new(llm), Arc::new(Prompts::new().expect("templates")))
    }

    #[tokio::test]
    async fn flight_extraction_applies_repair_rules() {
        let llm = Arc::new(ScriptedLlm::with_answers(&[
            r#"{"origin": "", "destination": "cdg", "departure_date": "jutro", "adults": 0}"#,
        ]));

        let query = extractor(llm.clone())
            .extract_flight("flight to Paris tomorrow", "No previous conversation.", today())
            .await
            .expect("extracted");

        assert_eq!(query.origin, "WAW");
        assert_eq!(query.destination, "CDG");
        assert_eq!(query.departure_date, "2024-01-11");
        assert_eq!(query.adults, 1);

        let prompt = &llm.prompts().await[0];
        assert!(prompt.contains("CDG=Paris"));
        assert!(prompt.contains("REQUEST: \"flight to Paris tomorrow\""));
        assert!(prompt.contains("\"required\""));
    }

    #[tokio::test]
    async fn hotel_extraction_defaults_stay_length() {
        let llm = Arc::new(ScriptedLlm::with_answers(&[
            "```json\n{\"destination\": \"Barcelona\", \"arrival_date\": null, \"departure_date\": null}\n```",
        ]));

        let query = extractor(llm)
            .extract_hotel("hotel in Barcelona", "No previous conversation.", today())
            .await
            .expect("extracted");

        assert_eq!(query.arrival_date, "2024-01-11");
        assert_eq!(query.departure_date, "2024-01-13");
    }

    #[tokio::test]
    async fn missing_destination_is_a_domain_error() {
        let llm = Arc::new(ScriptedLlm::with_answers(&[r#"{"destination": null}"#]));

        let result = extractor(llm).extract_flight("somewhere nice", "", today()).await;

        assert!(matches!(
            result,
            Err(AgentError::Domain(DomainError::MissingRequiredField { field: "destination", .. }))
        ));
    }

    #[tokio::test]
    async fn non_json_answer_is_a_schema_violation() {
        let llm = Arc::new(ScriptedLlm::with_answers(&["Sorry, which city?"]));

        let result = extractor(llm).extract_hotel("hotel please", "", today()).await;

        assert!(matches!(
            result,
            Err(AgentError::Gateway(GatewayError::SchemaViolation { schema: "HotelQuery", .. }))
        ));
    }
}
