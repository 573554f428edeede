/// In-process implementation of TaskQueue
///
/// A FIFO of pending task ids plus the task table, both behind one lock so
/// batch submission and attempt resolution are single critical sections.
use crate::modules::tasks::domain::entities::{
    FailureDisposition, ImportTask, QueueStatistics, TaskRecord, TaskStatus,
};
use crate::modules::tasks::domain::repository::TaskQueue;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};
use uuid::Uuid;

fn cutoff(older_than: Duration) -> AppResult<DateTime<Utc>> {
    let age = chrono::Duration::from_std(older_than)
        .map_err(|e| AppError::InvalidInput(format!("Invalid age threshold: {}", e)))?;
    Ok(Utc::now() - age)
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Uuid>,
    tasks: HashMap<Uuid, TaskRecord>,
    keys: HashSet<(Uuid, u32)>,
    closed: bool,
}

impl QueueState {
    fn running_attempt(&mut self, task_id: Uuid, attempt: u32) -> Option<&mut TaskRecord> {
        self.tasks
            .get_mut(&task_id)
            .filter(|record| record.status == TaskStatus::Running && record.attempts == attempt)
    }
}

#[derive(Debug)]
pub struct InMemoryTaskQueue {
    state: Mutex<QueueState>,
    work_available: Notify,
    max_attempts: u32,
}

impl InMemoryTaskQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            work_available: Notify::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Refuse all further submissions
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
    }

    fn new_record(&self, task: ImportTask) -> TaskRecord {
        TaskRecord {
            id: Uuid::new_v4(),
            task,
            status: TaskStatus::Pending,
            attempts: 0,
            max_attempts: self.max_attempts,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            failure_recorded: false,
        }
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn submit(&self, task: ImportTask) -> AppResult<TaskRecord> {
        let record = self.new_record(task);
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(AppError::StoreUnavailable("task queue is closed".to_string()));
            }
            if !state.keys.insert((record.task.job_id, record.task.row_index)) {
                return Err(AppError::InvalidInput(format!(
                    "Row {} of job {} is already queued",
                    record.task.row_index, record.task.job_id
                )));
            }
            state.pending.push_back(record.id);
            state.tasks.insert(record.id, record.clone());
        }

        self.work_available.notify_one();
        Ok(record)
    }

    async fn submit_batch(&self, tasks: Vec<ImportTask>) -> AppResult<usize> {
        let records: Vec<TaskRecord> = tasks.into_iter().map(|t| self.new_record(t)).collect();
        let count = records.len();
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(AppError::StoreUnavailable("task queue is closed".to_string()));
            }

            let mut batch_keys = HashSet::with_capacity(count);
            for record in &records {
                let key = (record.task.job_id, record.task.row_index);
                if state.keys.contains(&key) || !batch_keys.insert(key) {
                    return Err(AppError::InvalidInput(format!(
                        "Row {} of job {} is already queued",
                        key.1, key.0
                    )));
                }
            }

            state.keys.extend(batch_keys);
            for record in records {
                state.pending.push_back(record.id);
                state.tasks.insert(record.id, record);
            }
        }

        debug!(count, "batch queued");
        self.work_available.notify_waiters();
        Ok(count)
    }

    async fn dequeue(&self) -> AppResult<Option<TaskRecord>> {
        let mut state = self.state.lock().await;

        while let Some(task_id) = state.pending.pop_front() {
            if let Some(record) = state.tasks.get_mut(&task_id) {
                if record.status != TaskStatus::Pending {
                    continue;
                }
                record.status = TaskStatus::Running;
                record.attempts += 1;
                record.started_at = Some(Utc::now());
                return Ok(Some(record.clone()));
            }
        }

        Ok(None)
    }

    async fn mark_completed(&self, task_id: Uuid, attempt: u32) -> AppResult<bool> {
        let mut state = self.state.lock().await;

        match state.running_attempt(task_id, attempt) {
            Some(record) => {
                record.status = TaskStatus::Completed;
                record.completed_at = Some(Utc::now());
                record.error = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_failed(
        &self,
        task_id: Uuid,
        attempt: u32,
        error: &str,
        retryable: bool,
    ) -> AppResult<FailureDisposition> {
        let disposition = {
            let mut state = self.state.lock().await;

            let Some(record) = state.running_attempt(task_id, attempt) else {
                return Ok(FailureDisposition::AlreadyResolved);
            };

            record.error = Some(error.to_string());
            record.started_at = None;

            if retryable && record.can_retry() {
                record.status = TaskStatus::Pending;
                state.pending.push_back(task_id);
                FailureDisposition::Retry
            } else {
                record.status = TaskStatus::Failed;
                record.completed_at = Some(Utc::now());
                if retryable {
                    FailureDisposition::Exhausted
                } else {
                    FailureDisposition::Discarded
                }
            }
        };

        if disposition == FailureDisposition::Retry {
            self.work_available.notify_one();
        }
        Ok(disposition)
    }

    async fn reclaim_stale(&self, older_than: Duration) -> AppResult<Vec<TaskRecord>> {
        let cutoff = cutoff(older_than)?;

        let mut exhausted = Vec::new();
        let mut requeued = 0usize;
        {
            let mut state = self.state.lock().await;
            let QueueState { pending, tasks, .. } = &mut *state;

            for record in tasks.values_mut() {
                let stale = record.status == TaskStatus::Running
                    && record.started_at.is_some_and(|started| started < cutoff);
                if !stale {
                    continue;
                }

                record.error = Some("attempt abandoned".to_string());
                if record.can_retry() {
                    record.status = TaskStatus::Pending;
                    record.started_at = None;
                    pending.push_back(record.id);
                    requeued += 1;
                } else {
                    record.status = TaskStatus::Failed;
                    record.completed_at = Some(Utc::now());
                    exhausted.push(record.clone());
                }
            }
        }

        if requeued > 0 || !exhausted.is_empty() {
            warn!(requeued, exhausted = exhausted.len(), "reclaimed stale tasks");
        }
        if requeued > 0 {
            self.work_available.notify_waiters();
        }
        Ok(exhausted)
    }

    async fn mark_failure_recorded(&self, task_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(record) = state.tasks.get_mut(&task_id) {
            if record.status == TaskStatus::Failed {
                record.failure_recorded = true;
            }
        }
        Ok(())
    }

    async fn unrecorded_failures(&self, older_than: Duration) -> AppResult<Vec<TaskRecord>> {
        let cutoff = cutoff(older_than)?;
        let state = self.state.lock().await;

        let mut unrecorded: Vec<TaskRecord> = state
            .tasks
            .values()
            .filter(|record| record.status == TaskStatus::Failed && !record.failure_recorded)
            .filter(|record| record.completed_at.is_some_and(|done| done <= cutoff))
            .cloned()
            .collect();
        unrecorded.sort_by_key(|record| record.completed_at);
        Ok(unrecorded)
    }

    async fn count_for_job(&self, job_id: Uuid) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state.keys.iter().filter(|(job, _)| *job == job_id).count() as u64)
    }

    async fn get_by_id(&self, task_id: Uuid) -> AppResult<Option<TaskRecord>> {
        Ok(self.state.lock().await.tasks.get(&task_id).cloned())
    }

    async fn get_statistics(&self) -> AppResult<QueueStatistics> {
        let state = self.state.lock().await;

        let mut stats = QueueStatistics::default();
        for record in state.tasks.values() {
            stats.add(record.status, 1);
        }
        Ok(stats)
    }

    async fn wait_for_work(&self, max_wait: Duration) {
        let _ = tokio::time::timeout(max_wait, self.work_available.notified()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::tasks::domain::entities::RowData;
    use std::sync::Arc;

    fn task(job_id: Uuid, row_index: u32) -> ImportTask {
        ImportTask::new(job_id, row_index, RowData::new())
    }

    #[tokio::test]
    async fn dequeue_is_fifo_and_counts_attempts() {
        let queue = InMemoryTaskQueue::new(3);
        let job_id = Uuid::new_v4();
        queue
            .submit_batch(vec![task(job_id, 1), task(job_id, 2)])
            .await
            .unwrap();

        let first = queue.dequeue().await.unwrap().unwrap();
        let second = queue.dequeue().await.unwrap().unwrap();

        assert_eq!(first.task.row_index, 1);
        assert_eq!(second.task.row_index, 2);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.status, TaskStatus::Running);
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retryable_failures_requeue_until_exhausted() {
        let queue = InMemoryTaskQueue::new(2);
        queue.submit(task(Uuid::new_v4(), 1)).await.unwrap();

        let attempt = queue.dequeue().await.unwrap().unwrap();
        let disposition = queue
            .mark_failed(attempt.id, attempt.attempts, "store down", true)
            .await
            .unwrap();
        assert_eq!(disposition, FailureDisposition::Retry);

        let attempt = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(attempt.attempts, 2);
        let disposition = queue
            .mark_failed(attempt.id, attempt.attempts, "store down", true)
            .await
            .unwrap();
        assert_eq!(disposition, FailureDisposition::Exhausted);

        let record = queue.get_by_id(attempt.id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("store down"));
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_retryable_failure_is_discarded() {
        let queue = InMemoryTaskQueue::new(3);
        queue.submit(task(Uuid::new_v4(), 1)).await.unwrap();

        let attempt = queue.dequeue().await.unwrap().unwrap();
        let disposition = queue
            .mark_failed(attempt.id, attempt.attempts, "job gone", false)
            .await
            .unwrap();

        assert_eq!(disposition, FailureDisposition::Discarded);
    }

    #[tokio::test]
    async fn stale_attempt_cannot_resolve_task() {
        let queue = InMemoryTaskQueue::new(3);
        queue.submit(task(Uuid::new_v4(), 1)).await.unwrap();
        let attempt = queue.dequeue().await.unwrap().unwrap();

        assert!(queue.mark_completed(attempt.id, attempt.attempts).await.unwrap());
        assert!(!queue.mark_completed(attempt.id, attempt.attempts).await.unwrap());
        assert_eq!(
            queue
                .mark_failed(attempt.id, attempt.attempts, "late", true)
                .await
                .unwrap(),
            FailureDisposition::AlreadyResolved
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn only_one_caller_sees_exhaustion() {
        let queue = Arc::new(InMemoryTaskQueue::new(1));
        queue.submit(task(Uuid::new_v4(), 1)).await.unwrap();
        let attempt = queue.dequeue().await.unwrap().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    queue
                        .mark_failed(attempt.id, attempt.attempts, "boom", true)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut exhausted = 0;
        for handle in handles {
            if handle.await.unwrap() == FailureDisposition::Exhausted {
                exhausted += 1;
            }
        }
        assert_eq!(exhausted, 1);
    }

    #[tokio::test]
    async fn closed_queue_rejects_whole_batch() {
        let queue = InMemoryTaskQueue::new(3);
        queue.close().await;

        let job_id = Uuid::new_v4();
        let err = queue
            .submit_batch(vec![task(job_id, 1), task(job_id, 2)])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert_eq!(queue.get_statistics().await.unwrap().total_count, 0);
    }

    #[tokio::test]
    async fn duplicate_rows_reject_whole_batch() {
        let queue = InMemoryTaskQueue::new(3);
        let job_id = Uuid::new_v4();

        let err = queue
            .submit_batch(vec![task(job_id, 1), task(job_id, 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reclaim_requeues_or_fails_abandoned_attempts() {
        let queue = InMemoryTaskQueue::new(2);
        let job_id = Uuid::new_v4();
        queue
            .submit_batch(vec![task(job_id, 1), task(job_id, 2)])
            .await
            .unwrap();

        // Row 1 abandoned on its first attempt
        let first = queue.dequeue().await.unwrap().unwrap();
        // Row 2 abandoned on its last attempt
        let second = queue.dequeue().await.unwrap().unwrap();
        queue
            .mark_failed(second.id, second.attempts, "store down", true)
            .await
            .unwrap();
        let second = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(second.attempts, 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let exhausted = queue
            .reclaim_stale(Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].id, second.id);

        let requeued = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(requeued.id, first.id);
        assert_eq!(requeued.attempts, 2);
    }

    #[tokio::test]
    async fn statistics_track_status() {
        let queue = InMemoryTaskQueue::new(3);
        let job_id = Uuid::new_v4();
        queue
            .submit_batch((1..=3).map(|row| task(job_id, row)).collect())
            .await
            .unwrap();

        let attempt = queue.dequeue().await.unwrap().unwrap();
        queue
            .mark_completed(attempt.id, attempt.attempts)
            .await
            .unwrap();
        queue.dequeue().await.unwrap().unwrap();

        let stats = queue.get_statistics().await.unwrap();
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.running_count, 1);
        assert_eq!(stats.completed_count, 1);
        assert_eq!(stats.total_count, 3);
    }

    #[tokio::test]
    async fn submit_wakes_idle_worker() {
        let queue = Arc::new(InMemoryTaskQueue::new(3));

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let started = std::time::Instant::now();
                queue.wait_for_work(Duration::from_secs(5)).await;
                started.elapsed()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.submit(task(Uuid::new_v4(), 1)).await.unwrap();

        assert!(waiter.await.unwrap() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn failed_task_stays_unrecorded_until_flagged() {
        let queue = InMemoryTaskQueue::new(1);
        let job_id = Uuid::new_v4();
        queue
            .submit_batch(vec![task(job_id, 1), task(job_id, 2)])
            .await
            .unwrap();

        let attempt = queue.dequeue().await.unwrap().unwrap();
        queue
            .mark_failed(attempt.id, attempt.attempts, "store down", true)
            .await
            .unwrap();
        let done = queue.dequeue().await.unwrap().unwrap();
        queue.mark_completed(done.id, done.attempts).await.unwrap();

        let unrecorded = queue.unrecorded_failures(Duration::ZERO).await.unwrap();
        assert_eq!(unrecorded.len(), 1);
        assert_eq!(unrecorded[0].id, attempt.id);
        assert!(queue
            .unrecorded_failures(Duration::from_secs(60))
            .await
            .unwrap()
            .is_empty());

        queue.mark_failure_recorded(attempt.id).await.unwrap();
        assert!(queue
            .unrecorded_failures(Duration::ZERO)
            .await
            .unwrap()
            .is_empty());
        assert!(queue.get_by_id(attempt.id).await.unwrap().unwrap().failure_recorded);
    }

    #[tokio::test]
    async fn count_for_job_counts_every_status() {
        let queue = InMemoryTaskQueue::new(3);
        let job_id = Uuid::new_v4();
        queue
            .submit_batch((1..=3).map(|row| task(job_id, row)).collect())
            .await
            .unwrap();
        let attempt = queue.dequeue().await.unwrap().unwrap();
        queue
            .mark_completed(attempt.id, attempt.attempts)
            .await
            .unwrap();

        assert_eq!(queue.count_for_job(job_id).await.unwrap(), 3);
        assert_eq!(queue.count_for_job(Uuid::new_v4()).await.unwrap(), 0);
    }
}
