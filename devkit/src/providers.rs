//! Canned collaborator implementations for tests and local development.

use futures::future::BoxFuture;
use homelink_bridge::models::{PendingSchedule, RelayAction};
use homelink_bridge::sync::{PendingScheduleProvider, TaskCompletionNotifier};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Builds a pending schedule without the ceremony.
pub fn pending(
    command_id: &str,
    relay_number: u8,
    action: RelayAction,
    scheduled_time: i64,
    device_name: &str,
) -> PendingSchedule {
    PendingSchedule {
        command_id: command_id.to_string(),
        relay_number,
        action,
        scheduled_time,
        device_name: device_name.to_string(),
        task_id: format!("task-{command_id}"),
    }
}

/// Always answers a sync with the same canned list.
pub struct FixedScheduleProvider {
    schedules: Vec<PendingSchedule>,
}

impl FixedScheduleProvider {
    pub fn new(schedules: Vec<PendingSchedule>) -> Self {
        Self { schedules }
    }
}

impl PendingScheduleProvider for FixedScheduleProvider {
    fn pending_schedules(&self) -> BoxFuture<'_, anyhow::Result<Vec<PendingSchedule>>> {
        let schedules = self.schedules.clone();
        Box::pin(async move { Ok(schedules) })
    }
}

/// A provider whose backend is down.
pub struct FailingScheduleProvider;

impl PendingScheduleProvider for FailingScheduleProvider {
    fn pending_schedules(&self) -> BoxFuture<'_, anyhow::Result<Vec<PendingSchedule>>> {
        Box::pin(async { Err(anyhow::anyhow!("schedule storage unavailable")) })
    }
}

/// Records every completion it is told about; can be switched to fail.
#[derive(Default)]
pub struct CountingNotifier {
    completed: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl CountingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_always(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

impl TaskCompletionNotifier for CountingNotifier {
    fn task_completed<'a>(&'a self, command_id: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("task storage unavailable");
            }
            self.completed.lock().unwrap().push(command_id.to_string());
            Ok(())
        })
    }
}
