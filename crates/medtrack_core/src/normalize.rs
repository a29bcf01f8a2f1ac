//! crates/medtrack_core/src/normalize.rs
//!
//! Turns raw generator text into domain objects. The generator may wrap its
//! JSON in prose, return bare JSON, or return no JSON at all; every path
//! produces a well-formed value and none of them fail.

use crate::domain::{
    InteractionAnalysis, InteractionRecord, MedicationInfo, MedicationSuggestions, Severity,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

/// Summary returned when an interaction check is requested for fewer than two medications.
pub const NOT_ENOUGH_MEDICATIONS_SUMMARY: &str =
    "At least two medications are needed to check for interactions.";

// Greedy on purpose: first `{` to last `}`.
static JSON_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("JSON span pattern is valid"));

/// Returns the widest `{...}` span in `text`, if any.
pub fn extract_json_span(text: &str) -> Option<&str> {
    JSON_SPAN.find(text).map(|m| m.as_str())
}

/// Extracts and parses the embedded JSON object, or `None` if there is no usable object.
pub fn embedded_object(text: &str) -> Option<Value> {
    let span = extract_json_span(text)?;
    match serde_json::from_str::<Value>(span) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// The early-return verdict for an interaction check over fewer than two medications.
pub fn insufficient_medications() -> InteractionAnalysis {
    InteractionAnalysis {
        has_interactions: false,
        interactions: Vec::new(),
        summary: NOT_ENOUGH_MEDICATIONS_SUMMARY.to_string(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInteractionPayload {
    #[serde(default)]
    has_interactions: Option<Value>,
    #[serde(default)]
    interactions: Option<Value>,
    #[serde(default)]
    summary: Option<String>,
}

/// Normalizes interaction-check output.
///
/// A supplied `hasInteractions` flag is kept as-is; when absent it is derived from
/// the records. Malformed individual records are dropped.
pub fn normalize_interactions(raw: &str) -> InteractionAnalysis {
    let Some(object) = embedded_object(raw) else {
        return InteractionAnalysis::from_raw_text(raw);
    };
    let payload: RawInteractionPayload = match serde_json::from_value(object) {
        Ok(payload) => payload,
        Err(_) => return InteractionAnalysis::from_raw_text(raw),
    };

    let interactions: Vec<InteractionRecord> = match payload.interactions {
        Some(Value::Array(items)) => parse_array_lenient(items),
        _ => Vec::new(),
    };
    let reportable = interactions
        .iter()
        .any(|record| record.severity > Severity::None);

    let has_interactions = payload
        .has_interactions
        .as_ref()
        .and_then(flag_value)
        .unwrap_or(reportable);

    let summary = payload
        .summary
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_summary(reportable).to_string());

    InteractionAnalysis {
        has_interactions,
        interactions,
        summary,
    }
}

pub fn normalize_info(raw: &str) -> MedicationInfo {
    parse_typed(raw).unwrap_or_else(|| MedicationInfo {
        raw_info: Some(raw.to_string()),
        ..Default::default()
    })
}

pub fn normalize_suggestions(raw: &str) -> MedicationSuggestions {
    parse_typed(raw).unwrap_or_else(|| MedicationSuggestions {
        raw_suggestions: Some(raw.to_string()),
        ..Default::default()
    })
}

/// Q&A answers are free text and pass through trimmed.
pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_string()
}

fn parse_typed<T: DeserializeOwned>(raw: &str) -> Option<T> {
    embedded_object(raw).and_then(|object| serde_json::from_value(object).ok())
}

/// Parse an array leniently, skipping items that fail to deserialize.
fn parse_array_lenient<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn default_summary(reportable: bool) -> &'static str {
    if reportable {
        "Potential interactions were found. Review the details below with your pharmacist."
    } else {
        "No significant interactions were found between these medications."
    }
}
