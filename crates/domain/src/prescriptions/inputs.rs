use serde::{Deserialize, Serialize};

use super::aggregate::Attachment;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct FulfillInput {
    pub fulfilled_by: String,
    pub fulfilled_date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One row of the dispense form. Kept loosely typed so every bad field can be reported.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DispenseItemInput {
    #[serde(default)]
    pub medicine_id: Option<String>,
    /// Ignored: the name is always taken from the prescription.
    #[serde(default)]
    pub medicine_name: Option<String>,
    pub dispensed_qty: i64,
    #[serde(default)]
    pub batch_no: String,
    #[serde(default)]
    pub expiry_date: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct DispenseInput {
    pub items: Vec<DispenseItemInput>,
    #[serde(default)]
    pub photos: Vec<Attachment>,
    #[serde(default)]
    pub documents: Vec<Attachment>,
}
