use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DISPENSE_ID_PREFIX: &str = "D-";
const FIRST_DISPENSE_NUMBER: u32 = 1000;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait DispenseIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Hands out `D-1000`, `D-1001`, ... Never repeats within a process.
#[derive(Debug)]
pub struct SequentialDispenseIds {
    next: AtomicU32,
}

impl Default for SequentialDispenseIds {
    fn default() -> Self {
        Self {
            next: AtomicU32::new(FIRST_DISPENSE_NUMBER),
        }
    }
}

impl SequentialDispenseIds {
    /// Continues numbering after the highest id already issued.
    pub fn resume_after<'a>(issued: impl IntoIterator<Item = &'a str>) -> Self {
        let next = issued
            .into_iter()
            .filter_map(parse_dispense_number)
            .max()
            .map_or(FIRST_DISPENSE_NUMBER, |highest| {
                highest.saturating_add(1).max(FIRST_DISPENSE_NUMBER)
            });

        Self {
            next: AtomicU32::new(next),
        }
    }
}

impl DispenseIdGenerator for SequentialDispenseIds {
    fn next_id(&self) -> String {
        let number = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{DISPENSE_ID_PREFIX}{number:04}")
    }
}

pub fn parse_dispense_number(id: &str) -> Option<u32> {
    let digits = id.strip_prefix(DISPENSE_ID_PREFIX)?;
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Acceptance limits for files attached to a dispense.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct AttachmentLimits {
    pub max_photos: usize,
    pub max_photo_bytes: u64,
    pub max_document_bytes: u64,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_photos: 5,
            max_photo_bytes: 5 * 1024 * 1024,
            max_document_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub clock: Arc<dyn Clock>,
    pub dispense_ids: Arc<dyn DispenseIdGenerator>,
    pub limits: AttachmentLimits,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            dispense_ids: Arc::new(SequentialDispenseIds::default()),
            limits: AttachmentLimits::default(),
        }
    }
}
