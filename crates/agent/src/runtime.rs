use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde_json::json;
use tracing::{debug, info, warn};
use tripwise_booking::{
    BookingFlightProvider, BookingHotelProvider, BookingTransport, FlightProvider,
    HotelProvider, HttpBookingTransport, ProviderError,
};
use tripwise_core::config::AppConfig;
use tripwise_core::domain::flight::FlightQuery;
use tripwise_core::domain::format_iso_date;
use tripwise_core::domain::hotel::HotelQuery;
use uuid::Uuid;

use crate::extraction::StructuredExtractor;
use crate::formatter::ResponseFormatter;
use crate::intent::{Intent, IntentClassifier};
use crate::llm::{AnthropicClient, Gateway, LlmClient};
use crate::memory::ConversationMemory;
use crate::prompts::{PromptKind, Prompts};
use crate::reducer::{reduce_flights, reduce_hotels};
use crate::AgentError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStage {
    Received,
    Classified,
    Extracting,
    Repaired,
    Searching,
    Reducing,
    Formatting,
    AttractionHandling,
    Responded,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::Extracting => "extracting",
            Self::Repaired => "repaired",
            Self::Searching => "searching",
            Self::Reducing => "reducing",
            Self::Formatting => "formatting",
            Self::AttractionHandling => "attraction_handling",
            Self::Responded => "responded",
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct TurnContext {
    session_id: Uuid,
    turn_id: Uuid,
}

impl TurnContext {
    fn enter(&self, stage: TurnStage) {
        debug!(
            event_name = "agent.turn.stage",
            session_id = %self.session_id,
            turn_id = %self.turn_id,
            stage = stage.as_str(),
            "turn stage entered"
        );
    }
}

/// One conversation session. Turns take `&mut self`, so a session never processes two
/// utterances at once; give each concurrent user their own agent.
pub struct TravelAgent {
    session_id: Uuid,
    gateway: Gateway,
    prompts: Arc<Prompts>,
    classifier: IntentClassifier,
    extractor: StructuredExtractor,
    formatter: ResponseFormatter,
    flights: Arc<dyn FlightProvider>,
    hotels: Arc<dyn HotelProvider>,
    memory: ConversationMemory,
}

impl TravelAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        flights: Arc<dyn FlightProvider>,
        hotels: Arc<dyn HotelProvider>,
        max_turns: usize,
    ) -> Result<Self, AgentError> {
        let gateway = Gateway::new(llm);
        let prompts = Arc::new(Prompts::new()?);

        Ok(Self {
            session_id: Uuid::new_v4(),
            classifier: IntentClassifier::new(gateway.clone(), prompts.clone()),
            extractor: StructuredExtractor::new(gateway.clone(), prompts.clone()),
            formatter: ResponseFormatter::new(gateway.clone(), prompts.clone()),
            gateway,
            prompts,
            flights,
            hotels,
            memory: ConversationMemory::new(max_turns),
        })
    }

    /// Wires the Anthropic client and the Booking providers from validated config.
    pub fn from_config(config: &AppConfig) -> Result<Self, AgentError> {
        let llm = AnthropicClient::from_config(&config.llm)
            .map_err(|error| AgentError::Setup(format!("{error:#}")))?;
        let transport: Arc<dyn BookingTransport> = Arc::new(
            HttpBookingTransport::new(&config.booking)
                .map_err(|error| AgentError::Setup(error.to_string()))?,
        );

        Self::new(
            Arc::new(llm),
            Arc::new(BookingFlightProvider::from_config(transport.clone(), &config.booking)),
            Arc::new(BookingHotelProvider::from_config(transport, &config.booking)),
            config.conversation.max_turns,
        )
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub async fn process_query(&mut self, utterance: &str) -> String {
        self.process_query_on(utterance, Local::now().date_naive()).await
    }

    /// Runs one full turn against `today` and records it. Never fails: every error
    /// becomes the turn's answer.
    pub async fn process_query_on(&mut self, utterance: &str, today: NaiveDate) -> String {
        let turn = TurnContext { session_id: self.session_id, turn_id: Uuid::new_v4() };
        info!(
            event_name = "agent.turn.received",
            session_id = %turn.session_id,
            turn_id = %turn.turn_id,
            utterance_chars = utterance.chars().count(),
            "processing utterance"
        );
        turn.enter(TurnStage::Received);

        let response = match self.route(utterance, today, turn).await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    event_name = "agent.turn.failed",
                    session_id = %turn.session_id,
                    turn_id = %turn.turn_id,
                    error = %error,
                    "turn failed"
                );
                processing_failed_message(&error)
            }
        };

        self.memory.append(utterance, response.clone());
        turn.enter(TurnStage::Responded);
        response
    }

    async fn route(
        &self,
        utterance: &str,
        today: NaiveDate,
        turn: TurnContext,
    ) -> Result<String, AgentError> {
        let history = self.memory.render();
        let intent = self.classifier.classify(utterance, &self.memory, today).await?;
        info!(
            event_name = "agent.turn.classified",
            session_id = %turn.session_id,
            turn_id = %turn.turn_id,
            intent = intent.as_str(),
            "classified utterance"
        );
        turn.enter(TurnStage::Classified);

        match intent {
            Intent::Flight => Ok(self.handle_flight(utterance, &history, today, turn).await),
            Intent::Hotel => Ok(self.handle_hotel(utterance, &history, today, turn).await),
            Intent::Attraction => self.handle_attraction(utterance, &history, today, turn).await,
        }
    }

    async fn handle_flight(
        &self,
        utterance: &str,
        history: &str,
        today: NaiveDate,
        turn: TurnContext,
    ) -> String {
        match self.flight_turn(utterance, history, today, turn).await {
            Ok(response) => response,
            Err(AgentError::Domain(error)) => {
                info!(event_name = "agent.turn.rejected", turn_id = %turn.turn_id, error = %error, "flight query incomplete");
                error.user_message()
            }
            Err(error) => format!("❌ Error searching for flights: {error}"),
        }
    }

    async fn flight_turn(
        &self,
        utterance: &str,
        history: &str,
        today: NaiveDate,
        turn: TurnContext,
    ) -> Result<String, AgentError> {
        turn.enter(TurnStage::Extracting);
        let query = self.extractor.extract_flight(utterance, history, today).await?;
        turn.enter(TurnStage::Repaired);

        turn.enter(TurnStage::Searching);
        let payload = match self.flights.search(&query).await {
            Ok(payload) => payload,
            Err(error) => {
                return Ok(search_failure_message(turn, &error, || no_flights_message(&query)))
            }
        };

        turn.enter(TurnStage::Reducing);
        let offers = reduce_flights(&payload);
        if offers.is_empty() {
            return Ok(no_flights_message(&query));
        }

        turn.enter(TurnStage::Formatting);
        self.formatter.format_flights(utterance, &query, &offers, history).await
    }

    async fn handle_hotel(
        &self,
        utterance: &str,
        history: &str,
        today: NaiveDate,
        turn: TurnContext,
    ) -> String {
        match self.hotel_turn(utterance, history, today, turn).await {
            Ok(response) => response,
            Err(AgentError::Domain(error)) => {
                info!(event_name = "agent.turn.rejected", turn_id = %turn.turn_id, error = %error, "hotel query incomplete");
                error.user_message()
            }
            Err(error) => format!("❌ Error searching for hotels: {error}"),
        }
    }

    async fn hotel_turn(
        &self,
        utterance: &str,
        history: &str,
        today: NaiveDate,
        turn: TurnContext,
    ) -> Result<String, AgentError> {
        turn.enter(TurnStage::Extracting);
        let query = self.extractor.extract_hotel(utterance, history, today).await?;
        turn.enter(TurnStage::Repaired);

        turn.enter(TurnStage::Searching);
        let payload = match self.hotels.search(&query).await {
            Ok(payload) => payload,
            Err(error) => {
                return Ok(search_failure_message(turn, &error, || no_hotels_message(&query)))
            }
        };

        turn.enter(TurnStage::Reducing);
        let offers = reduce_hotels(&payload, query.nights());
        if offers.is_empty() {
            return Ok(no_hotels_message(&query));
        }

        turn.enter(TurnStage::Formatting);
        self.formatter.format_hotels(utterance, &query, &offers, history).await
    }

    async fn handle_attraction(
        &self,
        utterance: &str,
        history: &str,
        today: NaiveDate,
        turn: TurnContext,
    ) -> Result<String, AgentError> {
        turn.enter(TurnStage::AttractionHandling);
        let prompt = self.prompts.render(
            PromptKind::Attractions,
            &json!({"history": history, "query": utterance, "today": format_iso_date(today)}),
        )?;
        Ok(self.gateway.invoke(&prompt).await?)
    }
}

pub fn no_flights_message(query: &FlightQuery) -> String {
    format!("❌ No flights {} → {} on {}", query.origin, query.destination, query.departure_date)
}

pub fn no_hotels_message(query: &HotelQuery) -> String {
    format!("❌ No hotels in {} on {}", query.destination, query.arrival_date)
}

pub fn location_not_found_message(place: &str) -> String {
    format!("❌ Could not find location {place}")
}

fn processing_failed_message(error: &AgentError) -> String {
    format!("❌ Error while processing: {error}")
}

/// Unreachable providers read as "no results" to the user; the log keeps them apart.
fn search_failure_message(
    turn: TurnContext,
    error: &ProviderError,
    no_results: impl FnOnce() -> String,
) -> String {
    match error {
        ProviderError::LocationNotFound { place } => {
            info!(event_name = "agent.search.location_not_found", turn_id = %turn.turn_id, place = %place, "location not resolved");
            location_not_found_message(place)
        }
        other => {
            warn!(
                event_name = "agent.search.unavailable",
                session_id = %turn.session_id,
                turn_id = %turn.turn_id,
                error = %other,
                "provider unavailable; reporting no results"
            );
            no_results()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;
    use tripwise_booking::{
        FlightProvider, HotelProvider, ProviderError, ResolvedDestination, TransportError,
    };
    use tripwise_core::domain::flight::FlightQuery;
    use tripwise_core::domain::hotel::HotelQuery;

    use super::TravelAgent;
    use crate::llm::testing::ScriptedLlm;

    struct FakeFlights {
        result: Result<Value, ProviderError>,
        queries: Mutex<Vec<FlightQuery>>,
    }

    impl FakeFlights {
        fn returning(result: Result<Value, ProviderError>) -> Arc<Self> {
            Arc::new(Self { result, queries: Mutex::new(Vec::new()) })
        }

        async fn queries(&self) -> Vec<FlightQuery> {
            self.queries.lock().await.clone()
        }
    }

    #[async_trait]
    impl FlightProvider for FakeFlights {
        async fn resolve_location(&self, text: &str, _language: Option<&str>) -> Option<String> {
            Some(format!("{text}.AIRPORT"))
        }

        async fn search(&self, query: &FlightQuery) -> Result<Value, ProviderError> {
            self.queries.lock().await.push(query.clone());
            self.result.clone()
        }
    }

    struct FakeHotels {
        result: Result<Value, ProviderError>,
        queries: Mutex<Vec<HotelQuery>>,
    }

    impl FakeHotels {
        fn returning(result: Result<Value, ProviderError>) -> Arc<Self> {
            Arc::new(Self { result, queries: Mutex::new(Vec::new()) })
        }

        async fn queries(&self) -> Vec<HotelQuery> {
            self.queries.lock().await.clone()
        }
    }

    #[async_trait]
    impl HotelProvider for FakeHotels {
        async fn resolve_destination(
            &self,
            text: &str,
            _language: Option<&str>,
        ) -> Option<ResolvedDestination> {
            Some(ResolvedDestination { dest_id: text.to_string(), search_type: "CITY".to_string() })
        }

        async fn search(&self, query: &HotelQuery) -> Result<Value, ProviderError> {
            self.queries.lock().await.push(query.clone());
            self.result.clone()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date")
    }

    fn no_flight_offers() -> Result<Value, ProviderError> {
        Ok(json!({"status": true, "data": {"flightOffers": []}}))
    }

    fn no_hotels() -> Result<Value, ProviderError> {
        Ok(json!({"status": true, "data": {"hotels": []}}))
    }

    fn agent(
        llm: Arc<ScriptedLlm>,
        flights: Arc<FakeFlights>,
        hotels: Arc<FakeHotels>,
    ) -> TravelAgent {
        TravelAgent::new(llm, flights, hotels, 20).expect("agent builds")
    }

    #[tokio::test]
    async fn flight_without_offers_reports_route_and_date() {
        let llm = Arc::new(ScriptedLlm::with_answers(&[
            "FLIGHT",
            r#"{"origin": "WAW", "destination": "CDG", "departure_date": "tomorrow"}"#,
        ]));
        let flights = FakeFlights::returning(no_flight_offers());
        let mut agent = agent(llm.clone(), flights.clone(), FakeHotels::returning(no_hotels()));

        let response = agent.process_query_on("flight to Paris tomorrow", today()).await;

        assert_eq!(response, "❌ No flights WAW → CDG on 2024-01-11");
        let queries = flights.queries().await;
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].origin, "WAW");
        assert_eq!(queries[0].destination, "CDG");
        assert_eq!(queries[0].departure_date, "2024-01-11");

        let turns: Vec<_> = agent.memory().turns().cloned().collect();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].user_utterance, "flight to Paris tomorrow");
        assert_eq!(turns[0].agent_response, "❌ No flights WAW → CDG on 2024-01-11");
        assert!(llm.prompts().await[1].contains("TODAY: 2024-01-10"));
    }

    #[tokio::test]
    async fn vague_return_date_still_searches_one_way() {
        let llm = Arc::new(ScriptedLlm::with_answers(&[
            "FLIGHT",
            r#"{"destination": "CDG", "departure_date": "2024-01-11", "return_date": "next week"}"#,
        ]));
        let flights = FakeFlights::returning(no_flight_offers());
        let mut agent = agent(llm, flights.clone(), FakeHotels::returning(no_hotels()));

        let response = agent.process_query_on("flight to Paris, back next week", today()).await;

        assert_eq!(response, "❌ No flights WAW → CDG on 2024-01-11");
        let queries = flights.queries().await;
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].return_date, None);
    }

    #[tokio::test]
    async fn short_reply_after_hotel_turn_searches_hotels_again() {
        let hotel_json = r#"{"destination": "Barcelona", "arrival_date": "2024-06-01"}"#;
        let llm = Arc::new(ScriptedLlm::with_answers(&["HOTEL", hotel_json, "not sure", hotel_json]));
        let flights = FakeFlights::returning(no_flight_offers());
        let hotels = FakeHotels::returning(no_hotels());
        let mut agent = agent(llm.clone(), flights.clone(), hotels.clone());

        let first = agent.process_query_on("hotel in Barcelona", today()).await;
        let second = agent.process_query_on("yes", today()).await;

        assert_eq!(first, "❌ No hotels in Barcelona on 2024-06-01");
        assert_eq!(second, first);
        assert_eq!(hotels.queries().await.len(), 2);
        assert!(flights.queries().await.is_empty());
        assert_eq!(agent.memory().len(), 2);

        let prompts = llm.prompts().await;
        assert!(prompts[2].contains("User: hotel in Barcelona\nAgent: ❌ No hotels in Barcelona"));
        assert!(prompts[3].contains("Agent: ❌ No hotels in Barcelona on 2024-06-01"));
    }

    #[tokio::test]
    async fn offers_are_formatted_by_the_model() {
        let payload = json!({"data": {"flightOffers": [
            {
                "priceBreakdown": {"total": {"units": 700, "nanos": 0}},
                "segments": [{"totalTime": 8000, "legs": [{
                    "departureTime": "2024-01-11T07:00:00",
                    "arrivalTime": "2024-01-11T09:15:00",
                    "departureAirport": {"code": "WAW"},
                    "arrivalAirport": {"code": "CDG"},
                    "carriersData": [{"name": "LOT"}]
                }]}]
            }
        ]}});
        let llm = Arc::new(ScriptedLlm::with_answers(&[
            "FLIGHT",
            r#"{"destination": "CDG", "departure_date": "2024-01-11"}"#,
            "✈️ WAW → CDG: LOT 07:00, 700 PLN",
        ]));
        let mut agent =
            agent(llm.clone(), FakeFlights::returning(Ok(payload)), FakeHotels::returning(no_hotels()));

        let response = agent.process_query_on("flight to Paris", today()).await;

        assert_eq!(response, "✈️ WAW → CDG: LOT 07:00, 700 PLN");
        assert_eq!(agent.memory().last_response(), Some(response.as_str()));
        let format_prompt = &llm.prompts().await[2];
        assert!(format_prompt.contains("\"airline\": \"LOT\""));
        assert!(format_prompt.contains("Format these FLIGHTS search results"));
    }

    #[tokio::test]
    async fn missing_destination_never_reaches_the_provider() {
        let llm = Arc::new(ScriptedLlm::with_answers(&["FLIGHT", r#"{"destination": ""}"#]));
        let flights = FakeFlights::returning(no_flight_offers());
        let mut agent = agent(llm, flights.clone(), FakeHotels::returning(no_hotels()));

        let response = agent.process_query_on("somewhere warm", today()).await;

        assert!(response.contains("flight to Paris tomorrow"));
        assert!(flights.queries().await.is_empty());
        assert_eq!(agent.memory().last_response(), Some(response.as_str()));
    }

    #[tokio::test]
    async fn schema_violation_is_reported_with_cause() {
        let llm = Arc::new(ScriptedLlm::with_answers(&["HOTEL", "Which city do you mean?"]));
        let hotels = FakeHotels::returning(no_hotels());
        let mut agent = agent(llm, FakeFlights::returning(no_flight_offers()), hotels.clone());

        let response = agent.process_query_on("a hotel please", today()).await;

        assert_eq!(
            response,
            "❌ Error searching for hotels: output does not match HotelQuery: no JSON object in output"
        );
        assert!(hotels.queries().await.is_empty());
    }

    #[tokio::test]
    async fn unresolved_location_has_its_own_message() {
        let llm = Arc::new(ScriptedLlm::with_answers(&[
            "FLIGHT",
            r#"{"destination": "XYZ", "departure_date": "2024-02-01"}"#,
        ]));
        let flights =
            FakeFlights::returning(Err(ProviderError::LocationNotFound { place: "XYZ".to_string() }));
        let mut agent = agent(llm, flights, FakeHotels::returning(no_hotels()));

        let response = agent.process_query_on("flight to XYZ", today()).await;

        assert_eq!(response, "❌ Could not find location XYZ");
    }

    #[tokio::test]
    async fn unreachable_provider_reads_as_no_results() {
        let llm = Arc::new(ScriptedLlm::with_answers(&[
            "FLIGHT",
            r#"{"destination": "LHR", "departure_date": "2024-02-01"}"#,
        ]));
        let flights = FakeFlights::returning(Err(ProviderError::RetriesExhausted {
            operation: "flights.search",
            attempts: 4,
            last_error: TransportError::Status { status: 503, body: String::new() },
        }));
        let mut agent = agent(llm, flights, FakeHotels::returning(no_hotels()));

        let response = agent.process_query_on("flight to London", today()).await;

        assert_eq!(response, "❌ No flights WAW → LHR on 2024-02-01");
    }

    #[tokio::test]
    async fn gateway_failure_is_recorded_as_the_answer() {
        let llm = Arc::new(ScriptedLlm::with_script(vec![Err("overloaded".to_string())]));
        let mut agent =
            agent(llm, FakeFlights::returning(no_flight_offers()), FakeHotels::returning(no_hotels()));

        let response = agent.process_query_on("flight to Rome", today()).await;

        assert_eq!(response, "❌ Error while processing: language model call failed: overloaded");
        assert_eq!(agent.memory().last_response(), Some(response.as_str()));
    }

    #[tokio::test]
    async fn attraction_requests_go_straight_to_the_model() {
        let llm = Arc::new(ScriptedLlm::with_answers(&["ATTRACTION", "🏛️ Colosseum, Pantheon"]));
        let flights = FakeFlights::returning(no_flight_offers());
        let hotels = FakeHotels::returning(no_hotels());
        let mut agent = agent(llm.clone(), flights.clone(), hotels.clone());

        let response = agent.process_query_on("things to do in Rome", today()).await;

        assert_eq!(response, "🏛️ Colosseum, Pantheon");
        assert!(flights.queries().await.is_empty());
        assert!(hotels.queries().await.is_empty());
        assert!(llm.prompts().await[1].contains("REQUEST: \"things to do in Rome\""));
    }

    #[tokio::test]
    async fn memory_stays_within_its_bound() {
        let llm = Arc::new(ScriptedLlm::with_answers(&[]));
        let mut agent = TravelAgent::new(
            llm,
            FakeFlights::returning(no_flight_offers()),
            FakeHotels::returning(no_hotels()),
            2,
        )
        .expect("agent builds");

        for utterance in ["one", "two", "three"] {
            agent.process_query_on(utterance, today()).await;
        }

        let utterances: Vec<_> =
            agent.memory().turns().map(|turn| turn.user_utterance.clone()).collect();
        assert_eq!(utterances, vec!["two".to_string(), "three".to_string()]);
    }
}
