use serde::{Deserialize, Serialize};

use super::aggregate::Attachment;
use super::inputs::{DispenseInput, DispenseItemInput, FulfillInput};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum Command {
    /// Hand over the medicines without recording batch details
    MarkFulfilled {
        fulfilled_by: String,
        fulfilled_date: String,
        notes: Option<String>,
    },

    /// Record per-medicine batch/expiry details and supporting files
    UploadDispenseDetails {
        items: Vec<DispenseItemInput>,
        photos: Vec<Attachment>,
        documents: Vec<Attachment>,
    },
}

impl From<FulfillInput> for Command {
    fn from(input: FulfillInput) -> Self {
        Command::MarkFulfilled {
            fulfilled_by: input.fulfilled_by,
            fulfilled_date: input.fulfilled_date,
            notes: input.notes,
        }
    }
}

impl From<DispenseInput> for Command {
    fn from(input: DispenseInput) -> Self {
        Command::UploadDispenseDetails {
            items: input.items,
            photos: input.photos,
            documents: input.documents,
        }
    }
}
