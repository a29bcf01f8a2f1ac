pub mod domain;
pub mod normalize;
pub mod ports;
pub mod prompts;

pub use domain::{
    AppSettings, ChatMessage, ChatRole, ColorScheme, Frequency, InteractionAnalysis,
    InteractionCheckResult, InteractionRecord, Medication, MedicationForm, MedicationInfo,
    MedicationSuggestions, MedicationUpdate, NewMedication, ProfileUpdate, SettingsUpdate,
    Severity, ThemeMode, Timing, UserProfile,
};
pub use ports::{KeyValueStore, PortError, PortResult, ResponseGenerator};
