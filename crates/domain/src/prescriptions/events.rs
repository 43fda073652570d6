use chrono::{DateTime, NaiveDate, Utc};
use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

use super::aggregate::{Attachment, DispenseItem};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    PrescriptionFulfilled {
        id: String,
        fulfilled_by: String,
        fulfilled_date: NaiveDate,
        notes: Option<String>,
        updated_at: DateTime<Utc>,
    },

    DispenseDetailsUploaded {
        id: String,
        dispense_id: String,
        items: Vec<DispenseItem>,
        photos: Vec<Attachment>,
        documents: Vec<Attachment>,
        updated_at: DateTime<Utc>,
    },
}

pub const FULFILLED_EVENT: &str = "Prescription:Fulfilled";
pub const DISPENSE_UPLOADED_EVENT: &str = "Prescription:DispenseUploaded";

impl DomainEvent for Event {
    fn event_type(&self) -> String {
        match self {
            Event::PrescriptionFulfilled { .. } => FULFILLED_EVENT.to_string(),
            Event::DispenseDetailsUploaded { .. } => DISPENSE_UPLOADED_EVENT.to_string(),
        }
    }

    fn event_version(&self) -> String {
        "1.0".to_string()
    }
}
