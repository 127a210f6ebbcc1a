use crate::dispatch::CommandDispatcher;
use crate::models::PendingSchedule;
use crate::state::Shared;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Supplies the schedules the backend believes the device has not received
/// yet. Implemented by the task storage collaborator; tests plug in fakes.
pub trait PendingScheduleProvider: Send + Sync {
    fn pending_schedules(&self) -> BoxFuture<'_, anyhow::Result<Vec<PendingSchedule>>>;
}

/// Told when the device reports a scheduled command as executed. Duplicate
/// EXECUTED messages are tolerated, not deduplicated, so implementations
/// must be idempotent. That is a contract, not an assumption.
pub trait TaskCompletionNotifier: Send + Sync {
    fn task_completed<'a>(&'a self, command_id: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Answers a device's "what did I miss" after it reconnects: pulls the
/// pending schedules from the provider and republishes them one by one.
pub(crate) struct ScheduleSync {
    provider: Shared<Option<Arc<dyn PendingScheduleProvider>>>,
}

impl ScheduleSync {
    pub(crate) fn new(provider: Shared<Option<Arc<dyn PendingScheduleProvider>>>) -> Self {
        Self { provider }
    }

    /// Best-effort replay, not a transaction: each entry is published and
    /// logged independently, and a failure never aborts the rest. Ends with
    /// a SYNC_COMPLETE carrying the pending count.
    pub(crate) async fn handle_sync_request(&self, device_id: &str, dispatcher: &CommandDispatcher) {
        info!("sync request from {device_id}");

        let provider = self.provider.lock().clone();
        let Some(provider) = provider else {
            warn!("no pending-schedule provider registered, cannot sync {device_id}");
            return;
        };

        let pending = match provider.pending_schedules().await {
            Ok(pending) => pending,
            Err(e) => {
                error!("pending-schedule provider failed: {e}");
                return;
            }
        };
        let count = pending.len();
        info!("found {count} pending schedules for {device_id}");

        for entry in &pending {
            let result = dispatcher
                .publish_schedule(
                    entry.relay_number,
                    entry.action,
                    entry.scheduled_time,
                    Some(&entry.device_name),
                )
                .await;
            match result {
                Ok(receipt) => {
                    info!("synced schedule {} to {device_id} as {}", entry.command_id, receipt.command_id)
                }
                Err(e) => error!("failed to sync schedule {} to {device_id}: {e}", entry.command_id),
            }
        }

        match dispatcher.publish_sync_complete(count).await {
            Ok(()) => info!("sync complete, sent {count} schedules to {device_id}"),
            Err(e) => error!("failed to publish sync completion to {device_id}: {e}"),
        }
    }
}
