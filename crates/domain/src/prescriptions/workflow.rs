use std::{collections::HashMap, sync::Arc};

use cqrs_es::{Aggregate, EventEnvelope, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use crate::activity::{self, ActivityLog};
use crate::errors::Error;

use super::inputs::{DispenseInput, FulfillInput};
use super::store::PrescriptionStore;
use super::{Command, Prescription, Services};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DispenseReceipt {
    pub prescription: Prescription,
    pub dispense_id: String,
}

/// Runs prescription commands against the store and publishes what they commit.
pub struct DispenseWorkflow {
    store: Arc<PrescriptionStore>,
    services: Services,
    activity: Arc<ActivityLog>,
    queries: Vec<Box<dyn Query<Prescription>>>,
    in_flight: Mutex<()>,
}

impl DispenseWorkflow {
    pub fn new(
        store: Arc<PrescriptionStore>,
        services: Services,
        activity: Arc<ActivityLog>,
        queries: Vec<Box<dyn Query<Prescription>>>,
    ) -> Self {
        Self {
            store,
            services,
            activity,
            queries,
            in_flight: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<PrescriptionStore> {
        &self.store
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    pub async fn mark_fulfilled(
        &self,
        prescription_id: &str,
        input: FulfillInput,
        metadata: HashMap<String, String>,
    ) -> Result<Prescription, Error> {
        let user_id = metadata.get("user_id").cloned();
        self.activity
            .track(
                activity::FULFILL_REQUEST,
                activity::properties([("prescription_id", json!(prescription_id))]),
                user_id.clone(),
            )
            .await;

        match self
            .execute_with_metadata(prescription_id, input.into(), metadata)
            .await
        {
            Ok(prescription) => {
                tracing::info!("Prescription {} marked as fulfilled", prescription_id);
                Ok(prescription)
            }
            Err(err) => {
                tracing::warn!("Fulfilling {} failed: {}", prescription_id, err);
                self.activity
                    .track(
                        activity::FULFILL_FAILURE,
                        activity::properties([
                            ("prescription_id", json!(prescription_id)),
                            ("error_message", json!(err.to_string())),
                        ]),
                        user_id,
                    )
                    .await;
                Err(err)
            }
        }
    }

    pub async fn upload_dispense_details(
        &self,
        prescription_id: &str,
        input: DispenseInput,
        metadata: HashMap<String, String>,
    ) -> Result<DispenseReceipt, Error> {
        let user_id = metadata.get("user_id").cloned();
        self.activity
            .track(
                activity::DISPENSE_UPLOAD_START,
                activity::properties([("prescription_id", json!(prescription_id))]),
                user_id.clone(),
            )
            .await;

        let result = self
            .execute_with_metadata(prescription_id, input.into(), metadata)
            .await
            .and_then(|prescription| {
                let dispense_id = prescription.dispense_id.clone().ok_or_else(|| {
                    Error::persistence(format!("{prescription_id} has no dispense id"))
                })?;
                Ok(DispenseReceipt {
                    prescription,
                    dispense_id,
                })
            });

        match result {
            Ok(receipt) => {
                tracing::info!(
                    "Dispense {} recorded for prescription {}",
                    receipt.dispense_id,
                    prescription_id
                );
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!("Dispense upload for {} failed: {}", prescription_id, err);
                self.activity
                    .track(
                        activity::DISPENSE_UPLOAD_FAILURE,
                        activity::properties([
                            ("prescription_id", json!(prescription_id)),
                            ("error_message", json!(err.to_string())),
                        ]),
                        user_id,
                    )
                    .await;
                Err(err)
            }
        }
    }

    /// Handles `command` against the stored record, commits the resulting events
    /// and dispatches them to every query. Nothing is written when handling fails.
    pub async fn execute_with_metadata(
        &self,
        prescription_id: &str,
        command: Command,
        metadata: HashMap<String, String>,
    ) -> Result<Prescription, Error> {
        let _guard = self.in_flight.lock().await;

        let current = self.store.get_by_id(prescription_id).await?;
        let events = current.handle(command, &self.services).await?;

        let mut updated = current.clone();
        let envelopes: Vec<EventEnvelope<Prescription>> = events
            .into_iter()
            .enumerate()
            .map(|(offset, event)| {
                updated.apply(event.clone());
                EventEnvelope {
                    aggregate_id: prescription_id.to_string(),
                    sequence: current.version + offset + 1,
                    payload: event,
                    metadata: metadata.clone(),
                }
            })
            .collect();

        self.store.replace(prescription_id, updated.clone()).await?;

        for query in &self.queries {
            query.dispatch(prescription_id, &envelopes).await;
        }

        Ok(updated)
    }
}
