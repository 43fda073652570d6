use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::errors::Error;
use crate::persistence::PersistencePort;

use super::aggregate::{Prescription, PrescriptionStatus, AGGREGATE_TYPE};

pub const PRESCRIPTIONS_KEY: &str = "prescriptions";

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct PrescriptionFilter {
    pub status: Option<PrescriptionStatus>,
    /// Case-insensitive match on patient name or prescription id
    pub search: Option<String>,
}

impl PrescriptionFilter {
    pub fn matches(&self, prescription: &Prescription) -> bool {
        if let Some(status) = self.status {
            if prescription.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(search) if !search.is_empty() => {
                let search = search.to_lowercase();
                prescription.patient_name.to_lowercase().contains(&search)
                    || prescription.prescription_id.to_lowercase().contains(&search)
            }
            _ => true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct PrescriptionSummary {
    pub total: usize,
    pub pending: usize,
    pub dispensed: usize,
}

/// Authoritative prescription list, written through to a [`PersistencePort`].
pub struct PrescriptionStore {
    port: Arc<dyn PersistencePort>,
    records: RwLock<Vec<Prescription>>,
}

impl PrescriptionStore {
    /// Loads the persisted list, falling back to `seed` when it is missing or unusable.
    pub async fn open(
        port: Arc<dyn PersistencePort>,
        seed: Vec<Prescription>,
    ) -> Result<Self, Error> {
        let loaded = match port.load(PRESCRIPTIONS_KEY).await? {
            None => {
                tracing::info!("No stored prescriptions, initialising from seed data");
                None
            }
            Some(raw) => match decode(&raw) {
                Ok(records) => Some(records),
                Err(err) => {
                    tracing::warn!("Stored prescriptions unusable ({}), reseeding", err);
                    None
                }
            },
        };

        let records = match loaded {
            Some(records) => records,
            None => {
                port.save(PRESCRIPTIONS_KEY, &encode(&seed)?).await?;
                seed
            }
        };

        tracing::info!("Prescription store ready with {} records", records.len());
        Ok(Self {
            port,
            records: RwLock::new(records),
        })
    }

    pub async fn get_all(&self, filter: &PrescriptionFilter) -> Vec<Prescription> {
        self.records
            .read()
            .await
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect()
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Prescription, Error> {
        self.records
            .read()
            .await
            .iter()
            .find(|p| p.prescription_id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Swaps in `updated` and persists the whole list; memory is untouched if the save fails.
    pub async fn replace(&self, id: &str, updated: Prescription) -> Result<(), Error> {
        let mut records = self.records.write().await;
        let index = records
            .iter()
            .position(|p| p.prescription_id == id)
            .ok_or_else(|| not_found(id))?;

        let mut next = records.clone();
        next[index] = updated;
        self.port.save(PRESCRIPTIONS_KEY, &encode(&next)?).await?;
        *records = next;
        Ok(())
    }

    pub async fn summary(&self) -> PrescriptionSummary {
        let records = self.records.read().await;
        let dispensed = records
            .iter()
            .filter(|p| p.status == PrescriptionStatus::Dispensed)
            .count();
        PrescriptionSummary {
            total: records.len(),
            pending: records.len() - dispensed,
            dispensed,
        }
    }

    pub async fn dispense_ids(&self) -> Vec<String> {
        self.records
            .read()
            .await
            .iter()
            .filter_map(|p| p.dispense_id.clone())
            .collect()
    }
}

fn not_found(id: &str) -> Error {
    Error::NotFound {
        entity: AGGREGATE_TYPE.to_string(),
        id: id.to_string(),
    }
}

fn encode(records: &[Prescription]) -> Result<String, Error> {
    serde_json::to_string(records).map_err(Error::persistence)
}

fn decode(raw: &str) -> Result<Vec<Prescription>, Error> {
    let records: Vec<Prescription> = serde_json::from_str(raw).map_err(Error::persistence)?;
    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        record.validate_record()?;
        if !seen.insert(record.prescription_id.as_str()) {
            return Err(Error::validation(format!(
                "Duplicate prescription id: {}",
                record.prescription_id
            )));
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPort;
    use crate::prescriptions::seed;
    use async_trait::async_trait;

    struct FailingSaves(MemoryPort);

    #[async_trait]
    impl PersistencePort for FailingSaves {
        async fn load(&self, key: &str) -> Result<Option<String>, Error> {
            self.0.load(key).await
        }

        async fn save(&self, _key: &str, _value: &str) -> Result<(), Error> {
            Err(Error::persistence("disk full"))
        }
    }

    #[tokio::test]
    async fn empty_slot_is_seeded_and_saved() {
        let port = Arc::new(MemoryPort::new());
        let store = PrescriptionStore::open(port.clone(), seed::prescriptions())
            .await
            .unwrap();

        assert_eq!(store.summary().await.total, 1);
        let saved = port.load(PRESCRIPTIONS_KEY).await.unwrap().unwrap();
        assert!(saved.contains("RX-2001"));
    }

    #[tokio::test]
    async fn corrupt_slot_is_replaced_by_seed() {
        let port = Arc::new(MemoryPort::with_slot(PRESCRIPTIONS_KEY, "{not json"));
        let store = PrescriptionStore::open(port, seed::prescriptions())
            .await
            .unwrap();

        assert!(store.get_by_id("RX-2001").await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_or_incomplete_records_are_replaced_by_seed() {
        let mut incomplete = seed::prescriptions()[0].clone();
        incomplete.patient_name = String::new();
        incomplete.medicines.clear();
        incomplete.prescription_id = "RX-3000".to_string();
        let mut complete = seed::prescriptions()[0].clone();
        complete.prescription_id = "RX-3001".to_string();

        let seeded = seed::prescriptions()[0].clone();
        let duplicated = vec![seeded.clone(), seeded];
        let missing_fields = vec![incomplete, complete];

        for stored in [duplicated, missing_fields] {
            let port = Arc::new(MemoryPort::with_slot(
                PRESCRIPTIONS_KEY,
                &serde_json::to_string(&stored).unwrap(),
            ));
            let store = PrescriptionStore::open(port.clone(), seed::prescriptions())
                .await
                .unwrap();

            assert_eq!(
                store.get_all(&PrescriptionFilter::default()).await,
                seed::prescriptions()
            );
            let saved: Vec<Prescription> =
                serde_json::from_str(&port.load(PRESCRIPTIONS_KEY).await.unwrap().unwrap())
                    .unwrap();
            assert_eq!(saved, seed::prescriptions());
        }
    }

    #[tokio::test]
    async fn stored_records_are_preferred_over_seed() {
        let mut stored = seed::prescriptions();
        stored[0].prescription_id = "RX-3000".to_string();
        let port = Arc::new(MemoryPort::with_slot(
            PRESCRIPTIONS_KEY,
            &serde_json::to_string(&stored).unwrap(),
        ));

        let store = PrescriptionStore::open(port, seed::prescriptions())
            .await
            .unwrap();

        assert!(store.get_by_id("RX-3000").await.is_ok());
        assert!(matches!(
            store.get_by_id("RX-2001").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn filters_by_status_and_search() {
        let mut records = seed::prescriptions();
        let mut other = records[0].clone();
        other.prescription_id = "RX-2002".to_string();
        other.patient_name = "Anita Sharma".to_string();
        other.status = PrescriptionStatus::Dispensed;
        other.fulfilled_by = Some("Pharmacy Staff".to_string());
        records.push(other);

        let store = PrescriptionStore::open(Arc::new(MemoryPort::new()), records)
            .await
            .unwrap();

        let by_name = store
            .get_all(&PrescriptionFilter {
                status: None,
                search: Some("RAVI".to_string()),
            })
            .await;
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].prescription_id, "RX-2001");

        let by_id = store
            .get_all(&PrescriptionFilter {
                status: None,
                search: Some("rx-200".to_string()),
            })
            .await;
        assert_eq!(by_id.len(), 2);

        let dispensed = store
            .get_all(&PrescriptionFilter {
                status: Some(PrescriptionStatus::Dispensed),
                search: None,
            })
            .await;
        assert_eq!(dispensed.len(), 1);
        assert_eq!(dispensed[0].patient_name, "Anita Sharma");

        assert_eq!(
            store.summary().await,
            PrescriptionSummary {
                total: 2,
                pending: 1,
                dispensed: 1
            }
        );
    }

    #[tokio::test]
    async fn replace_unknown_id_is_not_found() {
        let store = PrescriptionStore::open(Arc::new(MemoryPort::new()), seed::prescriptions())
            .await
            .unwrap();
        let record = store.get_by_id("RX-2001").await.unwrap();

        assert!(matches!(
            store.replace("RX-9999", record).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_save_keeps_memory_unchanged() {
        let seeded = serde_json::to_string(&seed::prescriptions()).unwrap();
        let port = Arc::new(FailingSaves(MemoryPort::with_slot(PRESCRIPTIONS_KEY, &seeded)));
        let store = PrescriptionStore::open(port, vec![]).await.unwrap();

        let mut record = store.get_by_id("RX-2001").await.unwrap();
        record.status = PrescriptionStatus::Dispensed;
        record.fulfilled_by = Some("Pharmacy Staff".to_string());

        assert!(matches!(
            store.replace("RX-2001", record).await,
            Err(Error::Persistence { .. })
        ));
        assert!(store.get_by_id("RX-2001").await.unwrap().is_pending());
    }
}
