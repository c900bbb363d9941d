use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One generated dish in the expected `dishes` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub number_of_people: Option<u32>,
}

/// Outcome of normalizing a raw provider response. Never persisted; the
/// client decides whether to submit dishes back through the create endpoint.
///
/// `Structured` carries whatever JSON was extracted — the normalizer does
/// not enforce the `dishes` shape, that is left to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MenuSuggestion {
    Structured(Value),
    Raw {
        #[serde(rename = "rawResponse")]
        raw_response: String,
    },
}

impl MenuSuggestion {
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw {
            raw_response: text.into(),
        }
    }

    /// Decode the `dishes` sequence when the structured payload carries one.
    pub fn dishes(&self) -> Option<Vec<Dish>> {
        match self {
            Self::Structured(value) => value
                .get("dishes")
                .and_then(|d| serde_json::from_value(d.clone()).ok()),
            Self::Raw { .. } => None,
        }
    }
}
