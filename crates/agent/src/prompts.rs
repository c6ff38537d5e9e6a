use std::error::Error as _;

use serde::Serialize;
use tera::{Context, Tera};

/// Prompt templates. Names carry a `.txt` suffix so tera never html-escapes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptKind {
    ClassifyIntent,
    ExtractFlight,
    ExtractHotel,
    FormatResults,
    Attractions,
}

impl PromptKind {
    pub const ALL: [PromptKind; 5] = [
        Self::ClassifyIntent,
        Self::ExtractFlight,
        Self::ExtractHotel,
        Self::FormatResults,
        Self::Attractions,
    ];

    pub fn template_name(&self) -> &'static str {
        match self {
            Self::ClassifyIntent => "classify_intent.txt",
            Self::ExtractFlight => "extract_flight.txt",
            Self::ExtractHotel => "extract_hotel.txt",
            Self::FormatResults => "format_results.txt",
            Self::Attractions => "attractions.txt",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            Self::ClassifyIntent => include_str!("../templates/classify_intent.txt"),
            Self::ExtractFlight => include_str!("../templates/extract_flight.txt"),
            Self::ExtractHotel => include_str!("../templates/extract_hotel.txt"),
            Self::FormatResults => include_str!("../templates/format_results.txt"),
            Self::Attractions => include_str!("../templates/attractions.txt"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("prompt `{template}` failed: {message}")]
pub struct PromptError {
    pub template: &'static str,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct Prompts {
    tera: Tera,
}

impl Prompts {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        for kind in PromptKind::ALL {
            tera.add_raw_template(kind.template_name(), kind.source()).map_err(|error| {
                PromptError { template: kind.template_name(), message: error.to_string() }
            })?;
        }
        Ok(Self { tera })
    }

    pub fn render(&self, kind: PromptKind, values: &impl Serialize) -> Result<String, PromptError> {
        let template = kind.template_name();
        let context = Context::from_serialize(values)
            .map_err(|error| PromptError { template, message: error.to_string() })?;
        self.tera
            .render(template, &context)
            .map_err(|error| PromptError { template, message: render_chain(&error) })
    }
}

/// Tera nests the useful cause (e.g. an undefined variable) below a generic message.
fn render_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
