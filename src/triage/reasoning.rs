//! Triage flow: local red-flag check first, remote reasoning second.
//!
//! The reasoning service is opaque: it takes `{message, history}` and answers
//! `{text}`. We only build the message and pull `text` back out.

use super::prompt;
use crate::config::Settings;
use crate::discovery::{Facility, FacilityFinder, PoiQuery};
use crate::geo::Coordinates;
use crate::safety::{immediate, ImmediateActionResponse, RedFlagClassifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("No reasoning service configured")]
    NotConfigured,
    #[error("Reasoning service network error: {0}")]
    Network(String),
    #[error("Reasoning service returned HTTP {0}")]
    Status(u16),
    #[error("Invalid reasoning response: {0}")]
    InvalidResponse(String),
    #[error("Cannot serialize prompt: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Text-in/text-out reasoning collaborator.
pub trait ReasoningClient: Send + Sync {
    fn send(&self, message: &str, history: &[Value]) -> Result<String, ReasoningError>;
}

#[derive(Serialize)]
struct ReasoningRequest<'a> {
    message: &'a str,
    history: &'a [Value],
}

#[derive(Deserialize)]
struct ReasoningReply {
    text: Option<String>,
}

/// JSON-over-HTTP reasoning client.
pub struct HttpReasoningClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpReasoningClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: endpoint.into(),
        }
    }
}

impl ReasoningClient for HttpReasoningClient {
    fn send(&self, message: &str, history: &[Value]) -> Result<String, ReasoningError> {
        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(ReasoningRequest { message, history })
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => ReasoningError::Status(code),
                ureq::Error::Transport(t) => ReasoningError::Network(t.to_string()),
            })?;

        let reply: ReasoningReply = response
            .into_json()
            .map_err(|e| ReasoningError::InvalidResponse(e.to_string()))?;

        reply
            .text
            .ok_or_else(|| ReasoningError::InvalidResponse("no 'text' field".into()))
    }
}

/// A user message to triage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriageRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Value>,
    #[serde(default)]
    pub vitals: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Caller's position; nearby facilities become reasoning context.
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl TriageRequest {
    pub fn origin(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TriageOutcome {
    /// Red flag found; the reasoning service was never called.
    Immediate(ImmediateActionResponse),
    /// Reply text from the reasoning service, passed through as-is.
    Advice { text: String },
}

pub struct TriageEngine {
    classifier: RedFlagClassifier,
    client: Option<Box<dyn ReasoningClient>>,
}

impl TriageEngine {
    pub fn new(classifier: RedFlagClassifier) -> Self {
        Self {
            classifier,
            client: None,
        }
    }

    /// Classifier from the configured phrase list, plus an HTTP client when
    /// `reasoning_url` is set.
    pub fn from_settings(settings: &Settings) -> Self {
        let engine = Self::new(RedFlagClassifier::new(&settings.red_flags));
        match &settings.reasoning_url {
            Some(url) => engine.with_client(HttpReasoningClient::new(
                url.clone(),
                settings.provider_timeout(),
            )),
            None => engine,
        }
    }

    pub fn with_client(mut self, client: impl ReasoningClient + 'static) -> Self {
        self.client = Some(Box::new(client));
        self
    }

    /// Triage one message against an explicit facility list.
    pub fn assess(
        &self,
        request: &TriageRequest,
        facilities: &[Facility],
    ) -> Result<TriageOutcome, ReasoningError> {
        match self.red_flag(request) {
            Some(outcome) => Ok(outcome),
            None => self.reason(request, facilities),
        }
    }

    /// Triage one message, discovering facilities around the request's
    /// origin only once no red flag matched. Discovery failures leave the
    /// context empty.
    pub fn assess_near(
        &self,
        request: &TriageRequest,
        finder: &FacilityFinder,
        radius_m: u32,
    ) -> Result<TriageOutcome, ReasoningError> {
        if let Some(outcome) = self.red_flag(request) {
            return Ok(outcome);
        }
        if self.client.is_none() {
            return Err(ReasoningError::NotConfigured);
        }

        let facilities = match request.origin() {
            Some(origin) => finder
                .discover(&PoiQuery::new(origin.lat, origin.lon).with_radius(radius_m))
                .unwrap_or_else(|e| {
                    warn!(error = %e, "facility lookup failed; triaging without context");
                    Vec::new()
                }),
            None => Vec::new(),
        };
        self.reason(request, &facilities)
    }

    fn red_flag(&self, request: &TriageRequest) -> Option<TriageOutcome> {
        let flag = self.classifier.classify(&request.message)?;
        info!(flag, "red flag detected; skipping remote work");
        Some(TriageOutcome::Immediate(immediate::compose(
            flag,
            request.country.as_deref(),
        )))
    }

    fn reason(
        &self,
        request: &TriageRequest,
        facilities: &[Facility],
    ) -> Result<TriageOutcome, ReasoningError> {
        let client = self.client.as_ref().ok_or(ReasoningError::NotConfigured)?;
        let message = prompt::build(&request.message, request.vitals.as_deref(), facilities)
            .to_message()?;

        match client.send(&message, &request.history) {
            Ok(text) => Ok(TriageOutcome::Advice { text }),
            Err(e) => {
                warn!(error = %e, "reasoning service call failed");
                Err(e)
            }
        }
    }
}
