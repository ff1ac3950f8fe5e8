use crate::config::QueueConfig;
use crate::domain::account::AccountId;
use crate::domain::operation::{Operation, OperationStatus};
use crate::domain::ports::OperationStoreRef;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
pub struct QueueStats {
    pub unassigned_count: usize,
    pub my_tasks_count: usize,
    pub all_tasks_count: usize,
    pub urgent_count: usize,
    pub completed_today: usize,
}

/// Read-side aggregation over the operation store.
///
/// Counts are derived from a live snapshot on every call, never stored; the
/// only staleness is the snapshot read itself.
pub struct QueueService {
    operations: OperationStoreRef,
    config: QueueConfig,
}

impl QueueService {
    pub fn new(operations: OperationStoreRef, config: QueueConfig) -> Self {
        Self { operations, config }
    }

    pub async fn stats(&self, caller: &AccountId) -> Result<QueueStats> {
        let snapshot = self.operations.list().await?;
        Ok(self.stats_at(caller, &snapshot, Utc::now()))
    }

    fn stats_at(
        &self,
        caller: &AccountId,
        snapshot: &[Operation],
        now: DateTime<Utc>,
    ) -> QueueStats {
        let age_cutoff = now - Duration::hours(self.config.urgent_age_hours);
        let today = now.date_naive();

        let mut stats = QueueStats {
            unassigned_count: 0,
            my_tasks_count: 0,
            all_tasks_count: 0,
            urgent_count: 0,
            completed_today: 0,
        };
        for operation in snapshot {
            match operation.status {
                OperationStatus::Pending => {
                    stats.all_tasks_count += 1;
                    if operation.validator_id.is_none() {
                        stats.unassigned_count += 1;
                    }
                }
                OperationStatus::PendingValidation => {
                    stats.all_tasks_count += 1;
                    if operation.validator_id.as_ref() == Some(caller) {
                        stats.my_tasks_count += 1;
                    }
                }
                OperationStatus::Completed => {
                    if operation
                        .completed_at
                        .is_some_and(|at| at.date_naive() == today)
                    {
                        stats.completed_today += 1;
                    }
                    continue;
                }
                OperationStatus::Rejected => continue,
            }
            if operation.amount >= self.config.urgent_amount || operation.created_at < age_cutoff {
                stats.urgent_count += 1;
            }
        }
        stats
    }
}
