use thiserror::Error;

/// Which search a query belongs to. Used to pick user-facing wording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    Flight,
    Hotel,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{kind:?} query is missing required field `{field}`")]
    MissingRequiredField { kind: QueryKind, field: &'static str },
}

impl DomainError {
    /// Fixed, example-bearing message shown to the user when a turn is aborted
    /// before any provider call.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingRequiredField { kind: QueryKind::Flight, .. } => {
                "❌ I could not recognise the destination. Example: 'flight to Paris tomorrow'"
                    .to_string()
            }
            Self::MissingRequiredField { kind: QueryKind::Hotel, .. } => {
                "❌ I could not recognise where you want to stay. Example: 'hotel in Paris for the weekend'"
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DomainError, QueryKind};

    #[test]
    fn missing_destination_messages_carry_an_example() {
        let flight =
            DomainError::MissingRequiredField { kind: QueryKind::Flight, field: "destination" };
        let hotel =
            DomainError::MissingRequiredField { kind: QueryKind::Hotel, field: "destination" };

        assert!(flight.user_message().contains("flight to Paris tomorrow"));
        assert!(hotel.user_message().contains("hotel in Paris"));
    }

    #[test]
    fn display_names_the_missing_field() {
        let error =
            DomainError::MissingRequiredField { kind: QueryKind::Hotel, field: "destination" };
        assert_eq!(error.to_string(), "Hotel query is missing required field `destination`");
    }
}
