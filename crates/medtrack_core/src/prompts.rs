//! crates/medtrack_core/src/prompts.rs
//!
//! Prompt builders for each generator use case. Every builder is a pure
//! string-formatting function and cannot fail.

use crate::domain::Medication;

const INTERACTION_TEMPLATE: &str = r#"Analyze the following medications for potential drug interactions: {medications}

Respond with ONLY a JSON object in exactly this format:
{
  "hasInteractions": true or false,
  "interactions": [
    {
      "medications": ["Medication A", "Medication B"],
      "severity": "none" | "mild" | "moderate" | "severe",
      "description": "What happens when these medications are combined",
      "recommendation": "What the patient should do"
    }
  ],
  "summary": "A short plain-language overview of the findings"
}

Only list interactions you are reasonably confident about. If there are none, set "hasInteractions" to false and explain that in the summary.
Remind the user in the summary that this information is for educational purposes only and is not a substitute for advice from a doctor or pharmacist."#;

const INFO_TEMPLATE: &str = r#"Provide detailed information about the medication "{name}" ({dosage} {unit}, {form}).

Respond with ONLY a JSON object with these fields:
{
  "genericName": "string",
  "drugClass": "string",
  "commonUses": ["string"],
  "howItWorks": "string",
  "commonSideEffects": ["string"],
  "seriousSideEffects": ["string"],
  "precautions": ["string"],
  "foodInteractions": ["string"],
  "storageInstructions": "string",
  "missedDoseGuidance": "string"
}

Use clear, patient-friendly language. This information is for educational purposes only."#;

const SUGGESTIONS_TEMPLATE: &str = r#"Give practical suggestions for taking {name} ({dosage} {unit}), which the patient takes {frequency}.

Respond with ONLY a JSON object with these fields:
{
  "bestTimeToTake": "string",
  "withFood": "string",
  "tips": ["string"],
  "warnings": ["string"],
  "reminders": ["string"]
}

Keep each entry short and actionable. This information is for educational purposes only."#;

const QUESTION_TEMPLATE: &str = r#"You are a friendly, careful medication assistant helping a patient understand their medicines.
{context}
QUESTION:
{question}

Answer in plain conversational text, not JSON. Keep it to a few short paragraphs.
If the question needs a diagnosis or a change to a prescription, tell the user to speak with their doctor or pharmacist.
End with a one-sentence reminder that this answer is for educational purposes only."#;

/// Substitutes `{key}` placeholders in one pass. Inserted values are never
/// rescanned, and braces that do not name a key are kept as they are.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values
            .iter()
            .find(|&&(key, _)| tail.starts_with(key) && tail[key.len()..].starts_with('}'));
        match hit {
            Some(&(key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Builds the interaction-check prompt. Callers must pass at least two medications.
pub fn interaction_check_prompt(medications: &[Medication]) -> String {
    let listed = medications
        .iter()
        .map(Medication::label)
        .collect::<Vec<_>>()
        .join(", ");
    fill(INTERACTION_TEMPLATE, &[("medications", listed.as_str())])
}

pub fn medication_info_prompt(medication: &Medication) -> String {
    let form = serde_json::to_value(medication.form)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    fill(
        INFO_TEMPLATE,
        &[
            ("name", medication.name.as_str()),
            ("dosage", medication.dosage.as_str()),
            ("unit", medication.unit.as_str()),
            ("form", form.as_str()),
        ],
    )
}

pub fn suggestions_prompt(medication: &Medication) -> String {
    fill(
        SUGGESTIONS_TEMPLATE,
        &[
            ("name", medication.name.as_str()),
            ("dosage", medication.dosage.as_str()),
            ("unit", medication.unit.as_str()),
            ("frequency", medication.frequency.to_string().as_str()),
        ],
    )
}

/// Builds the free-text question prompt, optionally naming the user's current medications.
pub fn question_prompt(question: &str, medication_names: &[String]) -> String {
    let context = if medication_names.is_empty() {
        String::new()
    } else {
        format!(
            "\nThe patient is currently taking: {}.\n",
            medication_names.join(", ")
        )
    };
    fill(
        QUESTION_TEMPLATE,
        &[("context", context.as_str()), ("question", question.trim())],
    )
}
