use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use cqrs_es::Aggregate;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

use super::{validation, Command, Event, Services};

/// Prescription workflow status
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum PrescriptionStatus {
    /// Issued by a doctor, waiting for the pharmacy
    #[default]
    Pending,
    /// Handed over to the patient. Terminal.
    Dispensed,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Dispensed => "Dispensed",
        }
    }
}

impl std::fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PrescriptionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Dispensed" => Ok(Self::Dispensed),
            other => Err(Error::validation(format!("Unknown prescription status: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

/// Prescription aggregate
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct Prescription {
    pub prescription_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub medicines: Vec<String>,
    pub status: PrescriptionStatus,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    // Mark-fulfilled path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfilled_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfilled_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfilled_notes: Option<String>,

    // Upload-dispense-details path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispense_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dispense_items: Vec<DispenseItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispense_uploaded_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of transition events applied so far.
    #[serde(default)]
    pub version: usize,
}

/// One dispensed medicine line
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DispenseItem {
    pub medicine_id: String,
    pub medicine_name: String,
    pub dispensed_qty: u32,
    pub batch_no: String,
    pub expiry_date: NaiveDate,
}

/// Metadata of a file submitted with a dispense. The bytes are never kept.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, derive_new::new)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Fields of a prescription issued outside the pharmacy workflow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewPrescription {
    pub prescription_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub medicines: Vec<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub doctor: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub const AGGREGATE_TYPE: &str = "Prescription";

#[async_trait]
impl Aggregate for Prescription {
    type Command = Command;
    type Event = Event;
    type Error = Error;
    type Services = Services;

    fn aggregate_type() -> String {
        AGGREGATE_TYPE.to_string()
    }

    async fn handle(
        &self,
        command: Self::Command,
        services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            Command::MarkFulfilled {
                fulfilled_by,
                fulfilled_date,
                notes,
            } => {
                self.validate_pending()?;
                let fulfillment =
                    validation::validate_fulfillment(&fulfilled_by, &fulfilled_date, notes)?;

                Ok(vec![Event::PrescriptionFulfilled {
                    id: self.prescription_id.clone(),
                    fulfilled_by: fulfillment.fulfilled_by,
                    fulfilled_date: fulfillment.fulfilled_date,
                    notes: fulfillment.notes,
                    updated_at: services.clock.now(),
                }])
            }

            Command::UploadDispenseDetails {
                items,
                photos,
                documents,
            } => {
                self.validate_pending()?;
                let now = services.clock.now();
                let items = validation::validate_dispense(
                    &self.medicines,
                    &items,
                    &photos,
                    &documents,
                    &services.limits,
                    now,
                )?;

                Ok(vec![Event::DispenseDetailsUploaded {
                    id: self.prescription_id.clone(),
                    dispense_id: services.dispense_ids.next_id(),
                    items,
                    photos,
                    documents,
                    updated_at: now,
                }])
            }
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            Event::PrescriptionFulfilled {
                fulfilled_by,
                fulfilled_date,
                notes,
                updated_at,
                ..
            } => {
                self.status = PrescriptionStatus::Dispensed;
                self.fulfilled_by = Some(fulfilled_by);
                self.fulfilled_date = Some(fulfilled_date);
                self.fulfilled_notes = notes;
                self.updated_at = Some(updated_at);
            }

            Event::DispenseDetailsUploaded {
                dispense_id,
                items,
                photos,
                documents,
                updated_at,
                ..
            } => {
                self.status = PrescriptionStatus::Dispensed;
                self.dispense_id = Some(dispense_id);
                self.dispense_items = items;
                self.photos = photos;
                self.documents = documents;
                self.dispense_uploaded_at = Some(updated_at);
                self.updated_at = Some(updated_at);
            }
        }
        self.version += 1;
    }
}

impl Prescription {
    /// Builds a Pending prescription, rejecting incomplete records.
    pub fn issue(input: NewPrescription) -> Result<Self, Error> {
        let prescription = Self {
            prescription_id: input.prescription_id,
            patient_id: input.patient_id,
            patient_name: input.patient_name,
            medicines: input.medicines,
            date: input.date,
            doctor: input.doctor,
            priority: input.priority,
            notes: input.notes,
            ..Default::default()
        };
        Error::check(prescription.missing_fields())?;
        Ok(prescription)
    }

    pub fn is_pending(&self) -> bool {
        self.status == PrescriptionStatus::Pending
    }

    /// Checks a record read back from storage: the fields `issue` requires, plus
    /// the status/dispense id pairing.
    pub fn validate_record(&self) -> Result<(), Error> {
        let mut messages = self.missing_fields();
        let consistent = match self.status {
            PrescriptionStatus::Pending => {
                self.dispense_id.is_none() && self.fulfilled_by.is_none()
            }
            PrescriptionStatus::Dispensed => {
                self.dispense_id.is_some() != self.fulfilled_by.is_some()
            }
        };
        if !consistent {
            messages.push(format!(
                "Inconsistent prescription record: {}",
                self.prescription_id
            ));
        }
        Error::check(messages)
    }

    fn missing_fields(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if self.prescription_id.trim().is_empty() {
            messages.push("Prescription id is required".to_string());
        }
        if self.patient_id.trim().is_empty() {
            messages.push("Patient id is required".to_string());
        }
        if self.patient_name.trim().is_empty() {
            messages.push("Patient name is required".to_string());
        }
        if self.medicines.is_empty() {
            messages.push("At least one medicine is required".to_string());
        }
        if self.medicines.iter().any(|m| m.trim().is_empty()) {
            messages.push("Medicine descriptions must not be empty".to_string());
        }
        messages
    }

    fn validate_pending(&self) -> Result<(), Error> {
        if self.status != PrescriptionStatus::Pending {
            return Err(Error::Conflict {
                entity: AGGREGATE_TYPE.to_string(),
                id: self.prescription_id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}
