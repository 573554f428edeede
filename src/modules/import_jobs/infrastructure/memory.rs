/// In-process implementation of ImportJobRepository
///
/// Both counters of a job live in one `AtomicU64` (success in the high half,
/// failure in the low half) so the `success + failure <= total` bound is
/// checked and applied by a single compare-and-swap. Status transitions are
/// conditional updates under a per-job lock.
use crate::modules::import_jobs::domain::entities::{
    CounterUpdate, ImportJob, JobStatus, NewImportJob, TaskOutcome,
};
use crate::modules::import_jobs::domain::repository::ImportJobRepository;
use crate::shared::application::{PaginatedResult, PaginationParams};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const COUNTER_SHIFT: u32 = 32;
const COUNTER_MASK: u64 = u32::MAX as u64;

fn pack(success: u32, failure: u32) -> u64 {
    ((success as u64) << COUNTER_SHIFT) | failure as u64
}

fn unpack(packed: u64) -> (u32, u32) {
    ((packed >> COUNTER_SHIFT) as u32, (packed & COUNTER_MASK) as u32)
}

#[derive(Debug)]
struct Lifecycle {
    status: JobStatus,
    error_message: Option<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct JobCell {
    id: Uuid,
    source_name: String,
    total: u32,
    created_at: DateTime<Utc>,
    counters: AtomicU64,
    lifecycle: Mutex<Lifecycle>,
}

impl JobCell {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        // A panic while holding the guard cannot leave Lifecycle half-written
        // (every write is a plain field store), so poisoning is ignored.
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot_with(&self, counters: u64) -> ImportJob {
        let (success_count, failure_count) = unpack(counters);
        let lifecycle = self.lifecycle();

        ImportJob {
            id: self.id,
            source_name: self.source_name.clone(),
            status: lifecycle.status,
            total: self.total,
            success_count,
            failure_count,
            error_message: lifecycle.error_message.clone(),
            created_at: self.created_at,
            updated_at: lifecycle.updated_at,
        }
    }

    fn snapshot(&self) -> ImportJob {
        self.snapshot_with(self.counters.load(Ordering::Acquire))
    }

    /// CAS loop; refuses to go past `total`
    fn try_increment(&self, success: bool) -> Option<u64> {
        let mut current = self.counters.load(Ordering::Acquire);

        loop {
            let (s, f) = unpack(current);
            if s + f >= self.total {
                return None;
            }

            let next = if success { pack(s + 1, f) } else { pack(s, f + 1) };
            match self.counters.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(next),
                Err(observed) => current = observed,
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryImportJobRepository {
    jobs: DashMap<Uuid, Arc<JobCell>>,
    // Idempotency tokens: (job_id, row_index) -> succeeded
    outcomes: DashMap<(Uuid, u32), bool>,
}

impl InMemoryImportJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, job_id: Uuid) -> Option<Arc<JobCell>> {
        self.jobs.get(&job_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl ImportJobRepository for InMemoryImportJobRepository {
    async fn create(&self, job: NewImportJob) -> AppResult<ImportJob> {
        let now = Utc::now();
        let cell = Arc::new(JobCell {
            id: Uuid::new_v4(),
            source_name: job.source_name,
            total: job.total,
            created_at: now,
            counters: AtomicU64::new(0),
            lifecycle: Mutex::new(Lifecycle {
                status: JobStatus::Pending,
                error_message: None,
                updated_at: now,
            }),
        });

        let snapshot = cell.snapshot();
        self.jobs.insert(cell.id, cell);
        Ok(snapshot)
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<ImportJob>> {
        Ok(self.cell(job_id).map(|cell| cell.snapshot()))
    }

    async fn increment_counter(
        &self,
        job_id: Uuid,
        row_index: u32,
        outcome: &TaskOutcome,
    ) -> AppResult<CounterUpdate> {
        let cell = self.cell(job_id).ok_or(AppError::JobNotFound(job_id))?;

        if !(1..=cell.total).contains(&row_index) {
            return Ok(CounterUpdate::Rejected(cell.snapshot()));
        }

        // The vacant entry holds its shard lock until the token is written,
        // so a concurrent report for the same row waits and then sees it.
        match self.outcomes.entry((job_id, row_index)) {
            Entry::Occupied(_) => {
                debug!(%job_id, row_index, "outcome already counted");
                Ok(CounterUpdate::Duplicate(cell.snapshot()))
            }
            Entry::Vacant(vacant) => match cell.try_increment(outcome.is_success()) {
                Some(counters) => {
                    vacant.insert(outcome.is_success());
                    cell.lifecycle().updated_at = Utc::now();
                    Ok(CounterUpdate::Applied(cell.snapshot_with(counters)))
                }
                None => Ok(CounterUpdate::Rejected(cell.snapshot())),
            },
        }
    }

    async fn transition_status(
        &self,
        job_id: Uuid,
        expected: &[JobStatus],
        next: JobStatus,
        error_message: Option<&str>,
    ) -> AppResult<bool> {
        let cell = self.cell(job_id).ok_or(AppError::JobNotFound(job_id))?;
        let mut lifecycle = cell.lifecycle();

        if !expected.contains(&lifecycle.status) || !lifecycle.status.can_transition_to(next) {
            return Ok(false);
        }

        debug!(%job_id, from = %lifecycle.status, to = %next, "job status transition");
        lifecycle.status = next;
        lifecycle.error_message = error_message.map(str::to_string);
        lifecycle.updated_at = Utc::now();
        Ok(true)
    }

    async fn list(&self, params: &PaginationParams) -> AppResult<PaginatedResult<ImportJob>> {
        let mut jobs: Vec<ImportJob> = self
            .jobs
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();

        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = jobs.len() as u64;
        let page = jobs
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .collect();

        Ok(PaginatedResult::new(page, total, params))
    }

    async fn list_unfinished(&self, created_before: DateTime<Utc>) -> AppResult<Vec<ImportJob>> {
        let mut jobs: Vec<ImportJob> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().created_at <= created_before)
            .map(|entry| entry.value().snapshot())
            .filter(|job| !job.status.is_terminal())
            .collect();

        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    async fn repo_with_job(total: u32) -> (Arc<InMemoryImportJobRepository>, ImportJob) {
        let repo = Arc::new(InMemoryImportJobRepository::new());
        let job = repo
            .create(NewImportJob::new("products.csv", total).unwrap())
            .await
            .unwrap();
        (repo, job)
    }

    #[test]
    fn pack_roundtrip_keeps_halves_apart() {
        assert_eq!(unpack(pack(7, 3)), (7, 3));
        assert_eq!(unpack(pack(u32::MAX, 0)), (u32::MAX, 0));
        assert_eq!(unpack(pack(0, u32::MAX)), (0, u32::MAX));
    }

    #[tokio::test]
    async fn create_starts_pending_with_zero_counts() {
        let (_repo, job) = repo_with_job(4).await;

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.total, 4);
        assert_eq!(job.processed(), 0);
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn duplicate_reports_are_not_counted() {
        let (repo, job) = repo_with_job(2).await;

        let first = repo
            .increment_counter(job.id, 1, &TaskOutcome::failure("boom"))
            .await
            .unwrap();
        let second = repo
            .increment_counter(job.id, 1, &TaskOutcome::failure("boom"))
            .await
            .unwrap();

        assert!(first.was_applied());
        assert!(matches!(second, CounterUpdate::Duplicate(_)));
        assert_eq!(second.job().failure_count, 1);
    }

    #[tokio::test]
    async fn out_of_range_rows_are_rejected() {
        let (repo, job) = repo_with_job(2).await;

        for row in [0, 3] {
            let update = repo
                .increment_counter(job.id, row, &TaskOutcome::Success)
                .await
                .unwrap();
            assert!(matches!(update, CounterUpdate::Rejected(_)));
        }

        let job = repo.get_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.processed(), 0);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let repo = InMemoryImportJobRepository::new();
        let missing = Uuid::new_v4();

        let err = repo
            .increment_counter(missing, 1, &TaskOutcome::Success)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::JobNotFound(id) if id == missing));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_increments_are_not_lost() {
        const TOTAL: u32 = 500;
        let (repo, job) = repo_with_job(TOTAL).await;

        let handles = (1..=TOTAL).map(|row| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                let outcome = if row % 5 == 0 {
                    TaskOutcome::failure("invalid")
                } else {
                    TaskOutcome::Success
                };
                repo.increment_counter(job.id, row, &outcome).await.unwrap()
            })
        });

        for result in join_all(handles).await {
            assert!(result.unwrap().was_applied());
        }

        let job = repo.get_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.success_count, 400);
        assert_eq!(job.failure_count, 100);
    }

    #[tokio::test]
    async fn conditional_transition_applies_once() {
        let (repo, job) = repo_with_job(1).await;

        assert!(repo
            .transition_status(job.id, &[JobStatus::Pending], JobStatus::InProgress, None)
            .await
            .unwrap());
        assert!(!repo
            .transition_status(job.id, &[JobStatus::Pending], JobStatus::InProgress, None)
            .await
            .unwrap());

        assert!(repo
            .transition_status(job.id, &JobStatus::NON_TERMINAL, JobStatus::Completed, None)
            .await
            .unwrap());
        assert!(!repo
            .transition_status(
                job.id,
                &JobStatus::NON_TERMINAL,
                JobStatus::Failed,
                Some("late")
            )
            .await
            .unwrap());

        let job = repo.get_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() {
        let repo = InMemoryImportJobRepository::new();
        let mut created = Vec::new();
        for i in 0..5 {
            let job = repo
                .create(NewImportJob::new(format!("batch-{}.csv", i), 1).unwrap())
                .await
                .unwrap();
            created.push(job);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let page = repo.list(&PaginationParams::new(1, 2)).await.unwrap();
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items[0].id, created[4].id);
        assert_eq!(page.items[1].id, created[3].id);

        let last = repo.list(&PaginationParams::new(3, 2)).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].id, created[0].id);
    }

    #[tokio::test]
    async fn list_unfinished_skips_terminal_and_newer_jobs() {
        let repo = InMemoryImportJobRepository::new();
        let open = repo
            .create(NewImportJob::new("open.csv", 1).unwrap())
            .await
            .unwrap();
        let closed = repo
            .create(NewImportJob::new("closed.csv", 1).unwrap())
            .await
            .unwrap();
        repo.transition_status(closed.id, &JobStatus::NON_TERMINAL, JobStatus::Failed, Some("x"))
            .await
            .unwrap();
        let cutoff = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        repo.create(NewImportJob::new("fresh.csv", 1).unwrap())
            .await
            .unwrap();

        let unfinished = repo.list_unfinished(cutoff).await.unwrap();

        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].id, open.id);
    }
}
