//! Input rules for the two prescription transitions.
//!
//! Every rule is checked and every violation reported; nothing here stops at the
//! first problem.

use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::Error;

use super::aggregate::{Attachment, DispenseItem};
use super::inputs::DispenseItemInput;
use super::services::AttachmentLimits;

const KIBIBYTE: u64 = 1024;
const MEBIBYTE: u64 = 1024 * KIBIBYTE;
const PDF_MIME: &str = "application/pdf";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fulfillment {
    pub fulfilled_by: String,
    pub fulfilled_date: NaiveDate,
    pub notes: Option<String>,
}

pub fn validate_fulfillment(
    fulfilled_by: &str,
    fulfilled_date: &str,
    notes: Option<String>,
) -> Result<Fulfillment, Error> {
    let mut messages = Vec::new();

    let fulfilled_by = fulfilled_by.trim();
    if fulfilled_by.is_empty() {
        messages.push("Fulfilled by is required".to_string());
    }

    let date = if fulfilled_date.trim().is_empty() {
        messages.push("Fulfillment date is required".to_string());
        None
    } else {
        let parsed = parse_date(fulfilled_date);
        if parsed.is_none() {
            messages.push("Fulfillment date is not a valid date".to_string());
        }
        parsed
    };

    Error::check(messages)?;
    let fulfilled_date = date.ok_or_else(|| Error::validation("Fulfillment date is required"))?;

    Ok(Fulfillment {
        fulfilled_by: fulfilled_by.to_string(),
        fulfilled_date,
        notes: notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
    })
}

/// Checks a dispense submission against the prescription's medicine lines and
/// returns the items to record, names copied from `medicines`.
pub fn validate_dispense(
    medicines: &[String],
    items: &[DispenseItemInput],
    photos: &[Attachment],
    documents: &[Attachment],
    limits: &AttachmentLimits,
    now: DateTime<Utc>,
) -> Result<Vec<DispenseItem>, Error> {
    let mut messages = Vec::new();

    if items.len() != medicines.len() {
        messages.push(format!(
            "Expected {} dispense items, got {}",
            medicines.len(),
            items.len()
        ));
    }

    let mut accepted = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let label = format!("Item {}", index + 1);

        let qty = if item.dispensed_qty <= 0 {
            messages.push(format!("{label}: Quantity must be positive"));
            None
        } else {
            let qty = u32::try_from(item.dispensed_qty).ok();
            if qty.is_none() {
                messages.push(format!("{label}: Quantity is too large"));
            }
            qty
        };

        let batch_no = item.batch_no.trim();
        if batch_no.is_empty() {
            messages.push(format!("{label}: Batch number is required"));
        }

        let expiry = if item.expiry_date.trim().is_empty() {
            messages.push(format!("{label}: Expiry date is required"));
            None
        } else {
            match parse_date(&item.expiry_date) {
                None => {
                    messages.push(format!("{label}: Expiry date is not a valid date"));
                    None
                }
                Some(expiry) if expiry <= now.date_naive() => {
                    messages.push(format!("{label}: Expiry date must be in the future"));
                    None
                }
                Some(expiry) => Some(expiry),
            }
        };

        if let (Some(dispensed_qty), Some(expiry_date), Some(medicine)) =
            (qty, expiry, medicines.get(index))
        {
            if !batch_no.is_empty() {
                accepted.push(DispenseItem {
                    medicine_id: item
                        .medicine_id
                        .clone()
                        .filter(|id| !id.trim().is_empty())
                        .unwrap_or_else(|| format!("med_{index}")),
                    medicine_name: medicine.clone(),
                    dispensed_qty,
                    batch_no: batch_no.to_string(),
                    expiry_date,
                });
            }
        }
    }

    messages.extend(validate_photos(photos, limits));
    messages.extend(validate_documents(documents, limits));

    Error::check(messages)?;
    Ok(accepted)
}

pub fn validate_photos(photos: &[Attachment], limits: &AttachmentLimits) -> Vec<String> {
    let mut messages = Vec::new();
    if photos.len() > limits.max_photos {
        messages.push(format!(
            "At most {} photos can be attached (got {})",
            limits.max_photos,
            photos.len()
        ));
    }
    for photo in photos {
        if photo.size_bytes > limits.max_photo_bytes {
            messages.push(format!(
                "{} is too large (max {})",
                photo.file_name,
                describe_limit(limits.max_photo_bytes)
            ));
        }
        if !essence(&photo.content_type).starts_with("image/") {
            messages.push(format!("{} is not a valid image format", photo.file_name));
        }
    }
    messages
}

pub fn validate_documents(documents: &[Attachment], limits: &AttachmentLimits) -> Vec<String> {
    let mut messages = Vec::new();
    for document in documents {
        if document.size_bytes > limits.max_document_bytes {
            messages.push(format!(
                "{} is too large (max {})",
                document.file_name,
                describe_limit(limits.max_document_bytes)
            ));
        }
        if essence(&document.content_type) != PDF_MIME {
            messages.push(format!("{} is not a PDF file", document.file_name));
        }
    }
    messages
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp. A timestamp keeps the
/// calendar date of its own offset.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|instant| instant.date_naive())
    })
}

fn describe_limit(bytes: u64) -> String {
    if bytes >= MEBIBYTE && bytes % MEBIBYTE == 0 {
        format!("{}MB", bytes / MEBIBYTE)
    } else if bytes >= KIBIBYTE && bytes % KIBIBYTE == 0 {
        format!("{}KB", bytes / KIBIBYTE)
    } else {
        format!("{bytes} bytes")
    }
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
