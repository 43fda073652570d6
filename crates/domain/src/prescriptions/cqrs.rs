use std::sync::Arc;

use crate::activity::ActivityLog;
use crate::config::Config;
use crate::errors::Error;
use crate::persistence::PersistencePort;

use super::services::{SequentialDispenseIds, SystemClock};
use super::store::PrescriptionStore;
use super::view::{ActivityQuery, EventBroadcast};
use super::{seed, DispenseWorkflow, Services};

/// Opens the store and activity log on `port` and wires the workflow's queries.
pub async fn init(
    port: Arc<dyn PersistencePort>,
    config: &Config,
) -> Result<(Arc<DispenseWorkflow>, EventBroadcast), Error> {
    let store = Arc::new(PrescriptionStore::open(port.clone(), seed::prescriptions()).await?);
    let activity = Arc::new(ActivityLog::open(port, config.activity_retention).await?);

    let issued = store.dispense_ids().await;
    let services = Services {
        clock: Arc::new(SystemClock),
        dispense_ids: Arc::new(SequentialDispenseIds::resume_after(
            issued.iter().map(String::as_str),
        )),
        limits: config.limits,
    };

    let broadcast = EventBroadcast::new(config.event_buffer);
    let queries: Vec<Box<dyn cqrs_es::Query<super::Prescription>>> = vec![
        Box::new(ActivityQuery::new(activity.clone())),
        Box::new(broadcast.clone()),
    ];

    let workflow = DispenseWorkflow::new(store, services, activity, queries);
    Ok((Arc::new(workflow), broadcast))
}
