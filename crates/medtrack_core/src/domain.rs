//! crates/medtrack_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs are independent of any storage backend or generator vendor.
//! Field names serialize as camelCase, which is the shape persisted in the
//! key-value store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Creates a new entity id: the creation time in milliseconds plus a random suffix.
pub fn generate_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

fn default_true() -> bool {
    true
}

//=========================================================================================
// Medications
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationForm {
    Tablet,
    Capsule,
    Liquid,
    Injection,
    Topical,
    Inhaler,
    Drops,
    Patch,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    OnceDaily,
    TwiceDaily,
    ThreeTimesDaily,
    FourTimesDaily,
    EveryOtherDay,
    Weekly,
    AsNeeded,
    Other,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Frequency::OnceDaily => "once daily",
            Frequency::TwiceDaily => "twice daily",
            Frequency::ThreeTimesDaily => "three times daily",
            Frequency::FourTimesDaily => "four times daily",
            Frequency::EveryOtherDay => "every other day",
            Frequency::Weekly => "once a week",
            Frequency::AsNeeded => "as needed",
            Frequency::Other => "on a custom schedule",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    Morning,
    Afternoon,
    Evening,
    Bedtime,
    WithMeals,
    BeforeMeals,
    AfterMeals,
    AnyTime,
}

/// A medication the user has recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub unit: String,
    pub form: MedicationForm,
    pub frequency: Frequency,
    #[serde(default)]
    pub timing: Option<Timing>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub prescribed_by: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Medication {
    /// Builds a stored medication from caller input, assigning id and creation time.
    pub fn create(input: NewMedication) -> Self {
        Self {
            id: generate_id(),
            name: input.name,
            dosage: input.dosage,
            unit: input.unit,
            form: input.form,
            frequency: input.frequency,
            timing: input.timing,
            category: input.category,
            notes: input.notes,
            prescribed_by: input.prescribed_by,
            is_active: input.is_active.unwrap_or(true),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Overwrites every field present in `update` and stamps `updated_at`.
    pub fn apply(&mut self, update: MedicationUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(dosage) = update.dosage {
            self.dosage = dosage;
        }
        if let Some(unit) = update.unit {
            self.unit = unit;
        }
        if let Some(form) = update.form {
            self.form = form;
        }
        if let Some(frequency) = update.frequency {
            self.frequency = frequency;
        }
        if let Some(timing) = update.timing {
            self.timing = timing;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
        if let Some(prescribed_by) = update.prescribed_by {
            self.prescribed_by = prescribed_by;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        self.updated_at = Some(Utc::now());
    }

    /// The `Name (dosage unit)` form used inside prompts.
    pub fn label(&self) -> String {
        format!("{} ({} {})", self.name, self.dosage, self.unit)
    }
}

/// Caller input for a new medication. Identity and timestamps are assigned on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMedication {
    pub name: String,
    pub dosage: String,
    pub unit: String,
    pub form: MedicationForm,
    pub frequency: Frequency,
    #[serde(default)]
    pub timing: Option<Timing>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub prescribed_by: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl NewMedication {
    pub fn new(
        name: impl Into<String>,
        dosage: impl Into<String>,
        unit: impl Into<String>,
        form: MedicationForm,
        frequency: Frequency,
    ) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            unit: unit.into(),
            form,
            frequency,
            timing: None,
            category: None,
            notes: None,
            prescribed_by: None,
            is_active: None,
        }
    }
}

/// Partial fields for `update_medication`. Nullable fields use a nested option so
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedicationUpdate {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub unit: Option<String>,
    pub form: Option<MedicationForm>,
    pub frequency: Option<Frequency>,
    pub timing: Option<Option<Timing>>,
    pub category: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub prescribed_by: Option<Option<String>>,
    pub is_active: Option<bool>,
}

//=========================================================================================
// Interaction checks
//=========================================================================================

/// Interaction severity, ordered from harmless to dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Maps a generator-supplied label onto a severity.
    ///
    /// Unrecognized labels become `Moderate` so a warning is never downgraded to "none".
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "none" | "no" => Severity::None,
            "mild" | "minor" | "low" => Severity::Mild,
            "moderate" | "medium" => Severity::Moderate,
            "severe" | "major" | "high" | "serious" | "critical" => Severity::Severe,
            _ => Severity::Moderate,
        }
    }

    fn unrated() -> Self {
        Severity::Moderate
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Severity::from_label(&label))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::None => "none",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default = "Severity::unrated")]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recommendation: String,
}

/// The normalized generator verdict, before it is stamped and stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionAnalysis {
    pub has_interactions: bool,
    pub interactions: Vec<InteractionRecord>,
    pub summary: String,
}

impl InteractionAnalysis {
    /// The wrapper used when the generator output carries no usable JSON.
    pub fn from_raw_text(text: &str) -> Self {
        Self {
            has_interactions: false,
            interactions: Vec::new(),
            summary: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionCheckResult {
    pub id: String,
    pub has_interactions: bool,
    #[serde(default)]
    pub interactions: Vec<InteractionRecord>,
    #[serde(default)]
    pub summary: String,
    pub checked_at: DateTime<Utc>,
    #[serde(default)]
    pub medications_checked: Vec<String>,
}

impl InteractionCheckResult {
    /// Stamps an analysis with a fresh id, the current time and the checked names.
    pub fn stamp(analysis: InteractionAnalysis, medications_checked: Vec<String>) -> Self {
        Self {
            id: generate_id(),
            has_interactions: analysis.has_interactions,
            interactions: analysis.interactions,
            summary: analysis.summary,
            checked_at: Utc::now(),
            medications_checked,
        }
    }

    /// Records that describe an actual interaction. The `none` placeholder is excluded.
    pub fn reportable_interactions(&self) -> impl Iterator<Item = &InteractionRecord> {
        self.interactions
            .iter()
            .filter(|record| record.severity > Severity::None)
    }

    /// Whether the result should be displayed as a warning.
    pub fn has_reportable_interactions(&self) -> bool {
        self.reportable_interactions().next().is_some()
    }

    pub fn highest_severity(&self) -> Severity {
        self.interactions
            .iter()
            .map(|record| record.severity)
            .max()
            .unwrap_or(Severity::None)
    }
}

//=========================================================================================
// Lookups
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicationInfo {
    pub generic_name: String,
    pub drug_class: String,
    pub common_uses: Vec<String>,
    pub how_it_works: String,
    pub common_side_effects: Vec<String>,
    pub serious_side_effects: Vec<String>,
    pub precautions: Vec<String>,
    pub food_interactions: Vec<String>,
    pub storage_instructions: String,
    pub missed_dose_guidance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_info: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicationSuggestions {
    pub best_time_to_take: String,
    pub with_food: String,
    pub tips: Vec<String>,
    pub warnings: Vec<String>,
    pub reminders: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_suggestions: Option<String>,
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

//=========================================================================================
// Profile and settings
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub allergies: Option<String>,
    pub conditions: Option<String>,
    pub emergency_contact: Option<String>,
}

// Partial profile fields; `Some` overwrites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub allergies: Option<String>,
    pub conditions: Option<String>,
    pub emergency_contact: Option<String>,
}

impl UserProfile {
    pub fn merge(&mut self, update: ProfileUpdate) {
        if update.name.is_some() {
            self.name = update.name;
        }
        if update.age.is_some() {
            self.age = update.age;
        }
        if update.allergies.is_some() {
            self.allergies = update.allergies;
        }
        if update.conditions.is_some() {
            self.conditions = update.conditions;
        }
        if update.emergency_contact.is_some() {
            self.emergency_contact = update.emergency_contact;
        }
    }
}

/// The user's theme preference. `System` follows the OS scheme at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

/// A concrete color scheme, as reported by the OS or resolved from a `ThemeMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Light,
    Dark,
}

impl ThemeMode {
    pub fn resolve(self, system: ColorScheme) -> ColorScheme {
        match self {
            ThemeMode::Light => ColorScheme::Light,
            ThemeMode::Dark => ColorScheme::Dark,
            ThemeMode::System => system,
        }
    }

    /// Flips the currently displayed scheme. The result is always explicit.
    pub fn toggled(self, system: ColorScheme) -> ThemeMode {
        match self.resolve(system) {
            ColorScheme::Dark => ThemeMode::Light,
            ColorScheme::Light => ThemeMode::Dark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub theme_mode: ThemeMode,
    pub notifications_enabled: bool,
    pub reminder_time: Option<String>,
    pub show_disclaimer: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme_mode: ThemeMode::System,
            notifications_enabled: true,
            reminder_time: None,
            show_disclaimer: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub theme_mode: Option<ThemeMode>,
    pub notifications_enabled: Option<bool>,
    pub reminder_time: Option<Option<String>>,
    pub show_disclaimer: Option<bool>,
}

impl AppSettings {
    pub fn merge(&mut self, update: SettingsUpdate) {
        if let Some(theme_mode) = update.theme_mode {
            self.theme_mode = theme_mode;
        }
        if let Some(enabled) = update.notifications_enabled {
            self.notifications_enabled = enabled;
        }
        if let Some(reminder_time) = update.reminder_time {
            self.reminder_time = reminder_time;
        }
        if let Some(show) = update.show_disclaimer {
            self.show_disclaimer = show;
        }
    }
}
