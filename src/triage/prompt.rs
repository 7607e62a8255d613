//! Structured prompt payload for the downstream reasoning service.
//!
//! Only the three nearest facilities are embedded, and only their display
//! fields: no coordinates, ids or raw provider tags.

use crate::discovery::Facility;
use serde::{Deserialize, Serialize};

/// Upper bound on facilities embedded in a prompt.
pub const MAX_CONTEXT_FACILITIES: usize = 3;

pub const TRIAGE_ACTIONS: [&str; 4] = ["CALL_AMBULANCE", "GO_ER", "VISIT_CLINIC", "HOME_CARE"];

const SYSTEM_CONTENT: &str =
    "You are Tairis, an emergency medical triage assistant. Your goal is SPEED and SAFETY.";

const INSTRUCTIONS: &[&str] = &[
    "Analyze the user's input for symptoms.",
    "Check for RED FLAGS: Unconscious, Not Breathing, Heavy Bleeding, Chest Pain, Stroke.",
    "If RED FLAG detected: Return intent 'IMMEDIATE_ACTION' with action 'CALL_EMERGENCY'.",
    "If no red flag: choose a triage action from CALL_AMBULANCE, GO_ER, VISIT_CLINIC, HOME_CARE.",
    "Select the best facility from the provided 'context' list by its index, or -1 if none fits.",
    "Output STRICT JSON matching the output_schema.",
    "NEVER invent phone numbers or facility details. Use ONLY the provided context.",
    "Always include the disclaimer.",
];

/// A facility as the reasoning service sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFacility {
    pub index: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub distance_m: u64,
    pub phone: Option<String>,
    pub services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptInput {
    pub symptoms: String,
    pub vitals: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageSchema {
    pub action: String,
    pub confidence: String,
    pub reason: String,
}

/// Describes the JSON the reasoning service must answer with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub intent: String,
    pub triage: TriageSchema,
    pub recommended_facility_index: String,
    pub disclaimer: String,
}

impl Default for OutputSchema {
    fn default() -> Self {
        Self {
            intent: "TRIAGE_AND_RESOURCES | IMMEDIATE_ACTION".into(),
            triage: TriageSchema {
                action: TRIAGE_ACTIONS.join(" | "),
                confidence: "low | medium | high".into(),
                reason: "string".into(),
            },
            recommended_facility_index: "number (index in context list, or -1)".into(),
            disclaimer: "string".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriagePrompt {
    pub role: String,
    pub content: String,
    pub instructions: Vec<String>,
    pub context: Vec<ContextFacility>,
    pub input: PromptInput,
    pub output_schema: OutputSchema,
}

impl TriagePrompt {
    /// Serialized form sent as the reasoning service's message.
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Build a prompt embedding the nearest [`MAX_CONTEXT_FACILITIES`] facilities.
///
/// Discovery output already arrives sorted; the stable re-sort keeps the
/// nearest-first guarantee for explicit lists passed to
/// [`TriageEngine::assess`](super::TriageEngine::assess).
pub fn build(symptoms: &str, vitals: Option<&str>, facilities: &[Facility]) -> TriagePrompt {
    let mut nearest: Vec<&Facility> = facilities.iter().collect();
    nearest.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

    let context = nearest
        .into_iter()
        .take(MAX_CONTEXT_FACILITIES)
        .enumerate()
        .map(|(index, f)| ContextFacility {
            index,
            name: f.name.clone(),
            kind: f.kind.clone(),
            distance_m: f.distance_m.max(0.0).round() as u64,
            phone: f.phone.clone(),
            services: f.services.clone(),
        })
        .collect();

    let vitals = vitals
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("Not provided");

    TriagePrompt {
        role: "system".into(),
        content: SYSTEM_CONTENT.into(),
        instructions: INSTRUCTIONS.iter().map(|s| s.to_string()).collect(),
        context,
        input: PromptInput {
            symptoms: symptoms.to_string(),
            vitals: vitals.to_string(),
        },
        output_schema: OutputSchema::default(),
    }
}
