use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use tripwise_core::domain::format_iso_date;

use crate::llm::Gateway;
use crate::memory::ConversationMemory;
use crate::prompts::{PromptKind, Prompts};
use crate::AgentError;

/// Whole words or phrases, case-insensitive. Inflected forms are listed explicitly so
/// that short stems ("lot") never match longer unrelated words ("lots").
pub const FLIGHT_KEYWORDS: &[&str] = &[
    "flight", "flights", "fly", "flying", "plane", "planes", "airplane", "airline", "airlines",
    "airport", "airports", "ticket", "tickets", "lot", "loty", "lotu", "lotem", "lecieć",
    "lecę", "samolot", "samolotem", "lotnisko", "lotniska", "bilet", "bilety",
];
pub const HOTEL_KEYWORDS: &[&str] = &[
    "hotel", "hotels", "lodging", "accommodation", "stay", "staying", "nocleg", "noclegi",
    "noclegu", "zakwaterowanie", "pobyt", "pobytu",
];
pub const ATTRACTION_KEYWORDS: &[&str] = &[
    "attraction", "attractions", "things to do", "sightseeing", "tour", "tours", "atrakcje",
    "atrakcji", "zwiedzanie", "wycieczki", "wycieczka",
];

const SHORT_REPLY_MAX_TOKENS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Flight,
    Hotel,
    Attraction,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flight => "FLIGHT",
            Self::Hotel => "HOTEL",
            Self::Attraction => "ATTRACTION",
        }
    }

    /// First category word in a free-form model answer, e.g. `"Hotel."` or
    /// `"The answer is FLIGHT"`.
    pub fn parse_lenient(answer: &str) -> Option<Self> {
        tokenize(answer).iter().find_map(|token| match token.as_str() {
            "flight" | "flights" => Some(Self::Flight),
            "hotel" | "hotels" => Some(Self::Hotel),
            "attraction" | "attractions" => Some(Self::Attraction),
            _ => None,
        })
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Flight => FLIGHT_KEYWORDS,
            Self::Hotel => HOTEL_KEYWORDS,
            Self::Attraction => ATTRACTION_KEYWORDS,
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Flight => 0,
            Self::Hotel => 1,
            Self::Attraction => 2,
        }
    }

    /// Byte offset of the first keyword of this category in `text`.
    fn first_mention(&self, text: &str) -> Option<usize> {
        static PATTERNS: OnceLock<[Option<Regex>; 3]> = OnceLock::new();
        let patterns =
            PATTERNS.get_or_init(|| PRIORITY.map(|intent| keyword_pattern(intent.keywords())));
        let found = patterns[self.index()].as_ref()?.find(text)?;
        Some(found.start())
    }
}

fn keyword_pattern(keywords: &[&str]) -> Option<Regex> {
    let alternatives: Vec<String> = keywords.iter().map(|keyword| regex::escape(keyword)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).ok()
}

const PRIORITY: [Intent; 3] = [Intent::Flight, Intent::Hotel, Intent::Attraction];

/// Local rendition of the classification policy, used when the model answer names
/// no category.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn classify(&self, utterance: &str, memory: &ConversationMemory) -> Intent {
        let tokens = tokenize(utterance);
        let previous_topic = memory.last_response().and_then(topic_of);

        if (1..=SHORT_REPLY_MAX_TOKENS).contains(&tokens.len()) {
            if let Some(topic) = previous_topic {
                return topic;
            }
        }

        if let Some(intent) =
            PRIORITY.into_iter().find(|intent| intent.first_mention(utterance).is_some())
        {
            return intent;
        }

        previous_topic.unwrap_or(Intent::Flight)
    }
}

#[derive(Clone)]
pub struct IntentClassifier {
    gateway: Gateway,
    prompts: Arc<Prompts>,
    fallback: KeywordClassifier,
}

impl IntentClassifier {
    pub fn new(gateway: Gateway, prompts: Arc<Prompts>) -> Self {
        Self { gateway, prompts, fallback: KeywordClassifier }
    }

    pub async fn classify(
        &self,
        utterance: &str,
        memory: &ConversationMemory,
        today: NaiveDate,
    ) -> Result<Intent, AgentError> {
        let prompt = self.prompts.render(
            PromptKind::ClassifyIntent,
            &json!({
                "history": memory.render(),
                "query": utterance,
                "today": format_iso_date(today),
                "flight_keywords": FLIGHT_KEYWORDS.join(", "),
                "hotel_keywords": HOTEL_KEYWORDS.join(", "),
                "attraction_keywords": ATTRACTION_KEYWORDS.join(", "),
            }),
        )?;

        let answer = self.gateway.invoke(&prompt).await?;
        match Intent::parse_lenient(&answer) {
            Some(intent) => Ok(intent),
            None => {
                let intent = self.fallback.classify(utterance, memory);
                info!(
                    event_name = "agent.intent.fallback",
                    answer = %answer.trim(),
                    intent = intent.as_str(),
                    "model answer named no category; using keyword rules"
                );
                Ok(intent)
            }
        }
    }
}

/// Topic of an earlier agent answer: the category whose keyword appears first.
pub fn topic_of(text: &str) -> Option<Intent> {
    let topic = PRIORITY
        .into_iter()
        .filter_map(|intent| intent.first_mention(text).map(|offset| (offset, intent)))
        .min_by_key(|(offset, _)| *offset)
        .map(|(_, intent)| intent);
    debug!(topic = ?topic, "derived topic from previous answer");
    topic
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|character: char| !character.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
