use std::collections::HashMap;

use cqrs_es::{Aggregate, DomainEvent as _, EventEnvelope};
use serde::{Deserialize, Serialize};

/// Aggregate-agnostic envelope handed to subscribers outside the domain.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, derive_new::new)]
pub struct DomainEvent {
    pub id: String,
    pub aggregate_type: String,
    pub sequence: usize,
    pub event_type: String,
    pub event_version: String,
    /// JSON-encoded event
    pub payload: String,
    /// JSON-encoded command metadata
    pub metadata: String,
}

impl DomainEvent {
    pub fn from_envelope<A: Aggregate>(
        envelope: &EventEnvelope<A>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            envelope.aggregate_id.clone(),
            A::aggregate_type(),
            envelope.sequence,
            envelope.payload.event_type(),
            envelope.payload.event_version(),
            serde_json::to_string(&envelope.payload)?,
            serde_json::to_string(&envelope.metadata)?,
        ))
    }

    pub fn metadata_map(&self) -> HashMap<String, String> {
        serde_json::from_str(&self.metadata).unwrap_or_default()
    }
}
