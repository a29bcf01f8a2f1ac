//! services/medtrack/src/adapters/mock_llm.rs
//!
//! A deterministic stand-in for the live generator. It inspects the prompt for
//! the signature phrases each prompt builder emits and answers with canned
//! content keyed on a handful of well-known drug names, so demos behave the
//! same on every run without network access.

use async_trait::async_trait;
use medtrack_core::ports::{PortResult, ResponseGenerator};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownDrug {
    Aspirin,
    Ibuprofen,
    Warfarin,
    Lisinopril,
    Metformin,
}

impl KnownDrug {
    const ALL: [KnownDrug; 5] = [
        KnownDrug::Aspirin,
        KnownDrug::Ibuprofen,
        KnownDrug::Warfarin,
        KnownDrug::Lisinopril,
        KnownDrug::Metformin,
    ];

    fn needle(self) -> &'static str {
        match self {
            KnownDrug::Aspirin => "aspirin",
            KnownDrug::Ibuprofen => "ibuprofen",
            KnownDrug::Warfarin => "warfarin",
            KnownDrug::Lisinopril => "lisinopril",
            KnownDrug::Metformin => "metformin",
        }
    }

    fn display(self) -> &'static str {
        match self {
            KnownDrug::Aspirin => "Aspirin",
            KnownDrug::Ibuprofen => "Ibuprofen",
            KnownDrug::Warfarin => "Warfarin",
            KnownDrug::Lisinopril => "Lisinopril",
            KnownDrug::Metformin => "Metformin",
        }
    }
}

/// The set of known drugs mentioned in a piece of text, matched case-insensitively.
struct Mentions(Vec<KnownDrug>);

impl Mentions {
    fn scan(text: &str) -> Self {
        let lowered = text.to_lowercase();
        Self(
            KnownDrug::ALL
                .into_iter()
                .filter(|drug| lowered.contains(drug.needle()))
                .collect(),
        )
    }

    fn has(&self, drug: KnownDrug) -> bool {
        self.0.contains(&drug)
    }

    fn first(&self) -> Option<KnownDrug> {
        self.0.first().copied()
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ResponseGenerator` with canned responses.
#[derive(Clone, Debug)]
pub struct MockGeneratorAdapter {
    delay: Duration,
}

impl MockGeneratorAdapter {
    /// Creates a mock that waits `delay` before answering, to simulate latency.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// A mock that answers immediately.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl ResponseGenerator for MockGeneratorAdapter {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(respond(prompt))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Routes a prompt to the matching canned generator.
pub fn respond(prompt: &str) -> String {
    if prompt.contains("drug interactions") || prompt.contains("Analyze the following medications")
    {
        debug!("Mock generator: interaction check");
        interaction_response(prompt)
    } else if prompt.contains("detailed information about") {
        debug!("Mock generator: medication info");
        info_response(prompt)
    } else if prompt.contains("suggestions for taking") {
        debug!("Mock generator: suggestions");
        suggestions_response(prompt)
    } else {
        debug!("Mock generator: free-text answer");
        answer_response(prompt)
    }
}

//=========================================================================================
// Interaction Checks
//=========================================================================================

fn interaction(
    first: KnownDrug,
    second: KnownDrug,
    severity: &str,
    description: &str,
    recommendation: &str,
) -> Value {
    json!({
        "medications": [first.display(), second.display()],
        "severity": severity,
        "description": description,
        "recommendation": recommendation,
    })
}

fn interaction_response(prompt: &str) -> String {
    use KnownDrug::*;

    let mentions = Mentions::scan(prompt);
    let mut interactions = Vec::new();

    if mentions.has(Aspirin) && mentions.has(Ibuprofen) {
        interactions.push(interaction(
            Aspirin,
            Ibuprofen,
            "moderate",
            "Ibuprofen can interfere with the antiplatelet effect of low-dose aspirin, and taking both NSAIDs together raises the risk of stomach bleeding and ulcers.",
            "Take ibuprofen at least 8 hours before or 30 minutes after immediate-release aspirin, and ask your doctor whether an alternative pain reliever such as acetaminophen is suitable.",
        ));
    }
    if mentions.has(Warfarin) {
        for nsaid in [Aspirin, Ibuprofen] {
            if mentions.has(nsaid) {
                interactions.push(interaction(
                    Warfarin,
                    nsaid,
                    "severe",
                    "Combining warfarin with an NSAID significantly increases the risk of serious bleeding, including internal and gastrointestinal bleeding.",
                    "Avoid this combination unless your doctor has explicitly approved it. Contact your healthcare provider right away if you notice unusual bruising, dark stools, or blood in your urine.",
                ));
            }
        }
    }
    if mentions.has(Lisinopril) && mentions.has(Ibuprofen) {
        interactions.push(interaction(
            Lisinopril,
            Ibuprofen,
            "mild",
            "Regular ibuprofen use can blunt the blood-pressure-lowering effect of lisinopril and may strain the kidneys.",
            "Use ibuprofen only occasionally and monitor your blood pressure. Stay well hydrated.",
        ));
    }
    if mentions.has(Metformin) && mentions.has(Lisinopril) {
        interactions.push(interaction(
            Metformin,
            Lisinopril,
            "mild",
            "Lisinopril may slightly enhance the blood-sugar-lowering effect of metformin.",
            "Monitor your blood sugar when starting or changing the dose of either medication.",
        ));
    }

    let payload = if interactions.is_empty() {
        json!({
            "hasInteractions": false,
            "interactions": [{
                "medications": listed_medications(prompt),
                "severity": "none",
                "description": "No significant interactions were found between these medications.",
                "recommendation": "Continue taking your medications as prescribed and keep your pharmacist informed of any changes.",
            }],
            "summary": "No known interactions were identified between your medications. This information is for educational purposes only; always confirm with your doctor or pharmacist.",
        })
    } else {
        let count = interactions.len();
        json!({
            "hasInteractions": true,
            "interactions": interactions,
            "summary": format!(
                "Found {} potential interaction{} between your medications. This information is for educational purposes only; please review it with your doctor or pharmacist.",
                count,
                if count == 1 { "" } else { "s" }
            ),
        })
    };
    payload.to_string()
}

/// The medication names listed on the interaction prompt's first line.
fn listed_medications(prompt: &str) -> Vec<String> {
    let Some(line) = prompt
        .lines()
        .find(|line| line.contains("Analyze the following medications"))
    else {
        return Vec::new();
    };
    let Some((_, listed)) = line.split_once(": ") else {
        return Vec::new();
    };
    listed
        .split(", ")
        .map(|label| label.split(" (").next().unwrap_or(label).trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

//=========================================================================================
// Medication Info
//=========================================================================================

fn info_response(prompt: &str) -> String {
    let payload = match Mentions::scan(prompt).first() {
        Some(KnownDrug::Aspirin) => json!({
            "genericName": "Acetylsalicylic acid",
            "drugClass": "Nonsteroidal anti-inflammatory drug (NSAID); antiplatelet",
            "commonUses": ["Pain relief", "Fever reduction", "Prevention of heart attack and stroke"],
            "howItWorks": "Blocks cyclooxygenase enzymes, reducing prostaglandins that cause pain and inflammation, and prevents platelets from clumping.",
            "commonSideEffects": ["Upset stomach", "Heartburn", "Easy bruising"],
            "seriousSideEffects": ["Stomach bleeding", "Allergic reactions", "Ringing in the ears"],
            "precautions": ["Avoid if you have a bleeding disorder", "Not for children with viral infections"],
            "foodInteractions": ["Alcohol increases the risk of stomach bleeding"],
            "storageInstructions": "Store at room temperature away from moisture. Discard tablets that smell strongly of vinegar.",
            "missedDoseGuidance": "Take it as soon as you remember unless it is almost time for the next dose. Do not double up.",
        }),
        Some(KnownDrug::Ibuprofen) => json!({
            "genericName": "Ibuprofen",
            "drugClass": "Nonsteroidal anti-inflammatory drug (NSAID)",
            "commonUses": ["Pain relief", "Inflammation", "Fever", "Menstrual cramps"],
            "howItWorks": "Reduces the production of prostaglandins, which drive pain, fever and inflammation.",
            "commonSideEffects": ["Nausea", "Heartburn", "Dizziness"],
            "seriousSideEffects": ["Stomach ulcers or bleeding", "Kidney problems", "Increased blood pressure"],
            "precautions": ["Use the lowest effective dose", "Use caution with heart or kidney disease"],
            "foodInteractions": ["Take with food or milk to reduce stomach upset", "Limit alcohol"],
            "storageInstructions": "Store at room temperature in a dry place.",
            "missedDoseGuidance": "If taken as needed, simply take the next dose when required. Do not double up.",
        }),
        Some(KnownDrug::Warfarin) => json!({
            "genericName": "Warfarin",
            "drugClass": "Anticoagulant (vitamin K antagonist)",
            "commonUses": ["Prevention of blood clots", "Atrial fibrillation", "Deep vein thrombosis"],
            "howItWorks": "Reduces the liver's production of vitamin K dependent clotting factors.",
            "commonSideEffects": ["Minor bleeding from gums", "Bruising"],
            "seriousSideEffects": ["Severe or uncontrolled bleeding", "Blood in urine or stool"],
            "precautions": ["Requires regular INR blood tests", "Tell every provider you take warfarin"],
            "foodInteractions": ["Keep vitamin K intake (leafy greens) consistent", "Avoid large amounts of cranberry juice and alcohol"],
            "storageInstructions": "Store at room temperature, protected from light.",
            "missedDoseGuidance": "Take it the same day if you remember. If not, skip it and never take a double dose. Note the missed dose for your clinic.",
        }),
        Some(KnownDrug::Lisinopril) => json!({
            "genericName": "Lisinopril",
            "drugClass": "ACE inhibitor",
            "commonUses": ["High blood pressure", "Heart failure", "Kidney protection in diabetes"],
            "howItWorks": "Blocks the enzyme that produces angiotensin II, relaxing blood vessels and lowering blood pressure.",
            "commonSideEffects": ["Dry cough", "Dizziness", "Headache"],
            "seriousSideEffects": ["Swelling of the face or throat", "High potassium levels", "Kidney problems"],
            "precautions": ["Avoid during pregnancy", "Rise slowly to avoid dizziness"],
            "foodInteractions": ["Avoid potassium supplements and salt substitutes unless approved"],
            "storageInstructions": "Store at room temperature away from moisture.",
            "missedDoseGuidance": "Take it when you remember unless the next dose is near. Do not double up.",
        }),
        Some(KnownDrug::Metformin) => json!({
            "genericName": "Metformin hydrochloride",
            "drugClass": "Biguanide",
            "commonUses": ["Type 2 diabetes", "Insulin resistance"],
            "howItWorks": "Lowers glucose production in the liver and improves the body's sensitivity to insulin.",
            "commonSideEffects": ["Nausea", "Diarrhea", "Metallic taste"],
            "seriousSideEffects": ["Lactic acidosis (rare)", "Vitamin B12 deficiency with long-term use"],
            "precautions": ["Tell your doctor before imaging with contrast dye", "Limit alcohol"],
            "foodInteractions": ["Take with meals to reduce stomach upset", "Alcohol raises the risk of lactic acidosis"],
            "storageInstructions": "Store at room temperature away from heat and moisture.",
            "missedDoseGuidance": "Take it with your next meal if you remember soon. Otherwise skip it. Do not double up.",
        }),
        None => {
            let name = quoted_name(prompt).unwrap_or("this medication");
            json!({
                "genericName": name,
                "drugClass": "Information not available in offline mode",
                "commonUses": ["Ask your pharmacist for the approved uses of this medication"],
                "howItWorks": format!("Detailed mechanism information for {} is not available in offline mode.", name),
                "commonSideEffects": ["Refer to the patient leaflet supplied with your medication"],
                "seriousSideEffects": ["Seek medical help for difficulty breathing, swelling, or severe rash"],
                "precautions": ["Follow the dosing instructions on your prescription label"],
                "foodInteractions": ["Ask your pharmacist whether to take it with food"],
                "storageInstructions": "Store as directed on the label, out of reach of children.",
                "missedDoseGuidance": "Check the patient leaflet or ask your pharmacist. Never take a double dose.",
            })
        }
    };
    payload.to_string()
}

fn quoted_name(prompt: &str) -> Option<&str> {
    let (_, rest) = prompt.split_once("about the medication \"")?;
    rest.split('"').next().filter(|name| !name.is_empty())
}

//=========================================================================================
// Suggestions
//=========================================================================================

fn suggestions_response(prompt: &str) -> String {
    let (best_time, with_food, tips, warnings): (&str, &str, Vec<&str>, Vec<&str>) =
        match Mentions::scan(prompt).first() {
            Some(KnownDrug::Aspirin) => (
                "Morning, at the same time each day",
                "Take with food or a full glass of water to protect your stomach",
                vec!["Swallow tablets whole unless they are chewable", "Keep a consistent daily routine"],
                vec!["Avoid other NSAIDs such as ibuprofen unless your doctor approves"],
            ),
            Some(KnownDrug::Ibuprofen) => (
                "When needed for pain, no more often than every 6 to 8 hours",
                "Take with food or milk",
                vec!["Use the lowest dose that controls your symptoms", "Drink plenty of water"],
                vec!["Do not exceed the maximum daily dose on the label"],
            ),
            Some(KnownDrug::Warfarin) => (
                "Evening, at the same time every day",
                "Can be taken with or without food",
                vec!["Keep your vitamin K intake steady", "Keep a log of your INR results"],
                vec!["Report unusual bleeding immediately", "Check with your clinic before any new medication or supplement"],
            ),
            Some(KnownDrug::Lisinopril) => (
                "Morning, at the same time each day",
                "Can be taken with or without food",
                vec!["Stand up slowly to avoid dizziness", "Check your blood pressure regularly"],
                vec!["Seek help right away for swelling of the lips, tongue, or throat"],
            ),
            Some(KnownDrug::Metformin) => (
                "With breakfast and dinner",
                "Always take with meals",
                vec!["Start low and increase gradually to reduce stomach upset", "Monitor your blood sugar as advised"],
                vec!["Limit alcohol", "Tell your doctor before procedures that use contrast dye"],
            ),
            None => (
                "At the same time each day, as directed on your prescription",
                "Follow the label or ask your pharmacist",
                vec!["Use a pill organizer", "Keep medications in their original containers"],
                vec!["Do not stop taking a prescribed medication without talking to your doctor"],
            ),
        };
    json!({
        "bestTimeToTake": best_time,
        "withFood": with_food,
        "tips": tips,
        "warnings": warnings,
        "reminders": ["Set a daily reminder in the app", "Refill your prescription a week before you run out"],
    })
    .to_string()
}

//=========================================================================================
// Free-text Answers
//=========================================================================================

fn answer_response(prompt: &str) -> String {
    let question = prompt
        .split_once("QUESTION:")
        .map(|(_, rest)| rest)
        .unwrap_or(prompt);
    let mentions = Mentions::scan(question);
    let mentions = if mentions.0.is_empty() { Mentions::scan(prompt) } else { mentions };

    let body = match mentions.first() {
        Some(KnownDrug::Aspirin) => "Aspirin is commonly used for pain, fever, and, at low doses, to help prevent heart attacks and strokes. Taking it with food can help protect your stomach. Avoid combining it with other NSAIDs like ibuprofen unless your doctor says it's okay.",
        Some(KnownDrug::Ibuprofen) => "Ibuprofen works well for pain and inflammation. Take it with food, use the lowest dose that helps, and don't take it for more than a few days in a row without checking with your doctor, especially if you have heart, kidney, or stomach problems.",
        Some(KnownDrug::Warfarin) => "Warfarin needs careful handling. Keep your diet consistent, particularly leafy greens that contain vitamin K, go to your scheduled INR checks, and always ask before starting any new medicine or supplement, since many of them change how warfarin works.",
        Some(KnownDrug::Lisinopril) => "Lisinopril lowers blood pressure by relaxing your blood vessels. A dry cough is a common side effect. If you feel dizzy, stand up slowly, and let your doctor know if the cough bothers you, since there are alternatives.",
        Some(KnownDrug::Metformin) => "Metformin helps control blood sugar in type 2 diabetes. Taking it with meals reduces stomach upset, which usually improves after the first few weeks. Limit alcohol while you're on it.",
        None => "That's a good question. In general, take your medications exactly as prescribed, at consistent times, and keep an up-to-date list to share with every healthcare provider you see. Your pharmacist is a great resource for questions about timing, food, and side effects.",
    };
    format!(
        "{}\n\nThis answer is for educational purposes only. Please talk to your doctor or pharmacist about your specific situation.",
        body
    )
}
