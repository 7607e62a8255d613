//! Quick-action links attached to triage results.

use crate::discovery::Facility;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Call,
    Navigate,
    Share,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickAction {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub target: String,
}

pub fn call_action(number: &str, label: Option<&str>) -> QuickAction {
    QuickAction {
        label: label.unwrap_or("Call Emergency").to_string(),
        kind: ActionKind::Call,
        target: format!("tel:{}", dial_string(number)),
    }
}

pub fn navigate_action(lat: f64, lon: f64, label: Option<&str>) -> QuickAction {
    QuickAction {
        label: label.unwrap_or("Navigate").to_string(),
        kind: ActionKind::Navigate,
        target: format!(
            "https://www.google.com/maps/dir/?api=1&destination={},{}",
            lat, lon
        ),
    }
}

pub fn share_action(lat: f64, lon: f64, label: Option<&str>) -> QuickAction {
    QuickAction {
        label: label.unwrap_or("Share Location").to_string(),
        kind: ActionKind::Share,
        target: format!("https://maps.google.com/?q={},{}", lat, lon),
    }
}

/// Call (if a phone is known) and navigate actions for a facility.
pub fn facility_actions(facility: &Facility) -> Vec<QuickAction> {
    let mut actions = Vec::with_capacity(2);
    if let Some(phone) = facility.phone.as_deref() {
        let label = format!("Call {}", facility.name);
        actions.push(call_action(phone, Some(&label)));
    }
    actions.push(navigate_action(facility.coords.lat, facility.coords.lon, None));
    actions
}

/// Strip formatting from a phone number, keeping digits and a leading `+`.
fn dial_string(number: &str) -> String {
    let trimmed = number.trim();
    let mut out = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (i == 0 && c == '+') {
            out.push(c);
        }
    }
    out
}
