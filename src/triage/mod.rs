//! Triage: prompt construction, quick actions and the reasoning hand-off.

pub mod actions;
pub mod prompt;
pub mod reasoning;

pub use actions::{call_action, facility_actions, navigate_action, share_action, QuickAction};
pub use prompt::{build as build_prompt, TriagePrompt};
pub use reasoning::{
    HttpReasoningClient, ReasoningClient, ReasoningError, TriageEngine, TriageOutcome,
    TriageRequest,
};
