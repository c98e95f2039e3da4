use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::types::{LineItems, StructuredRecord, SENTINEL};
use super::ExtractionError;

/// Parse the model's answer into a record, filling gaps with the sentinel.
///
/// The answer may be wrapped in a Markdown code fence; the fence is removed
/// before parsing. Anything that is not a JSON object comes back as
/// [`ExtractionError::InvalidResponse`] carrying the raw text.
pub fn parse_extraction_response(response: &str) -> Result<StructuredRecord, ExtractionError> {
    let json_str = strip_code_fence(response);

    let raw: RawRecord =
        serde_json::from_str(json_str).map_err(|e| ExtractionError::InvalidResponse {
            raw: response.to_string(),
            diagnostic: e.to_string(),
        })?;

    Ok(raw.into_record())
}

/// Markdown code fence around the JSON, optionally tagged `json`.
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").unwrap());

/// Remove a surrounding ```` ```json ```` / ```` ``` ```` fence if present.
pub fn strip_code_fence(response: &str) -> &str {
    match CODE_FENCE.captures(response).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => response.trim(),
    }
}

/// Lenient mirror of the record: every key optional, any JSON type accepted.
#[derive(Deserialize)]
struct RawRecord {
    invoice_number: Option<serde_json::Value>,
    date: Option<serde_json::Value>,
    amount: Option<serde_json::Value>,
    customer_name: Option<serde_json::Value>,
    vendor: Option<serde_json::Value>,
    masked_card_suffix: Option<serde_json::Value>,
    line_items: Option<serde_json::Value>,
    billing_address: Option<serde_json::Value>,
    payment_method: Option<serde_json::Value>,
}

impl RawRecord {
    fn into_record(self) -> StructuredRecord {
        StructuredRecord {
            invoice_number: field_text(self.invoice_number),
            date: field_text(self.date),
            amount: strip_currency(&field_text(self.amount)),
            customer_name: field_text(self.customer_name),
            vendor: field_text(self.vendor),
            masked_card_suffix: mask_card(&field_text(self.masked_card_suffix)),
            line_items: line_items(self.line_items),
            billing_address: field_text(self.billing_address),
            payment_method: field_text(self.payment_method),
        }
    }
}

/// Render a scalar as text; null, empty and structured values become the sentinel.
fn field_text(value: Option<serde_json::Value>) -> String {
    let text = match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    };
    if text.is_empty() {
        SENTINEL.to_string()
    } else {
        text
    }
}

fn line_items(value: Option<serde_json::Value>) -> LineItems {
    match value {
        Some(serde_json::Value::Array(items)) => {
            let items: Vec<String> = items
                .into_iter()
                .map(|item| field_text(Some(item)))
                .filter(|item| item != SENTINEL)
                .collect();
            if items.is_empty() {
                LineItems::default()
            } else {
                LineItems::List(items)
            }
        }
        other => LineItems::Text(field_text(other)),
    }
}

/// Models occasionally leave a currency symbol in despite the instruction.
fn strip_currency(amount: &str) -> String {
    if amount == SENTINEL {
        return amount.to_string();
    }
    let stripped: String = amount
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥'))
        .collect();
    let stripped = stripped.trim();
    if stripped.is_empty() {
        SENTINEL.to_string()
    } else {
        stripped.to_string()
    }
}

/// Keep the last four digits of the last run of at least four digits.
/// Text without such a run (expiry dates, short codes) is returned as is.
fn mask_card(card: &str) -> String {
    let run = card
        .split(|c: char| !c.is_ascii_digit())
        .rev()
        .find(|run| run.len() >= 4);
    match run {
        Some(run) => run[run.len() - 4..].to_string(),
        None => card.to_string(),
    }
}
