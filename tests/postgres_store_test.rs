/// PostgreSQL store tests
///
/// Require TEST_DATABASE_URL; run with `--ignored`.
///
/// Tests cover:
/// - Idempotent counter increments under concurrency
/// - Conditional status transitions
/// - Queue claim, retry and exhaustion
/// - Unrecorded failures and jobs left without tasks
/// - A full import against the database
mod utils;

use futures::future::join_all;
use product_import::modules::import_jobs::{
    CounterUpdate, ImportJobRepository, ImportJobRepositoryImpl, JobStatus, NewImportJob,
    TaskOutcome,
};
use product_import::modules::products::{NewProduct, ProductRepository, ProductRepositoryImpl};
use product_import::modules::tasks::{
    FailureDisposition, ImportTask, PgTaskQueue, TaskQueue, TaskStatus,
};
use product_import::ImportSystem;
use std::sync::Arc;
use std::time::Duration;
use utils::{db, factories, helpers};

async fn create_job(repo: &ImportJobRepositoryImpl, total: u32) -> uuid::Uuid {
    repo.create(NewImportJob::new("catalog.csv", total).unwrap())
        .await
        .unwrap()
        .id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn concurrent_increments_are_counted_once_each() {
    let _guard = db::acquire_test_lock();
    db::clean_test_db();

    let repo = Arc::new(ImportJobRepositoryImpl::new(db::get_test_database()));
    let job_id = create_job(&repo, 40).await;

    // Every row reported twice
    let reports = (1..=40u32).chain(1..=40u32).map(|row| {
        let repo = repo.clone();
        tokio::spawn(async move {
            repo.increment_counter(job_id, row, &TaskOutcome::Success)
                .await
                .unwrap()
                .was_applied()
        })
    });
    let applied = join_all(reports)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count();

    assert_eq!(applied, 40);
    let job = repo.get_by_id(job_id).await.unwrap().unwrap();
    assert_eq!((job.success_count, job.failure_count), (40, 0));
}

#[tokio::test]
#[ignore]
async fn out_of_range_row_is_rejected() {
    let _guard = db::acquire_test_lock();
    db::clean_test_db();

    let repo = ImportJobRepositoryImpl::new(db::get_test_database());
    let job_id = create_job(&repo, 1).await;

    let update = repo
        .increment_counter(job_id, 2, &TaskOutcome::Success)
        .await
        .unwrap();

    assert!(matches!(update, CounterUpdate::Rejected(_)));
}

#[tokio::test]
#[ignore]
async fn transition_requires_expected_status() {
    let _guard = db::acquire_test_lock();
    db::clean_test_db();

    let repo = ImportJobRepositoryImpl::new(db::get_test_database());
    let job_id = create_job(&repo, 1).await;

    assert!(repo
        .transition_status(job_id, &[JobStatus::Pending], JobStatus::InProgress, None)
        .await
        .unwrap());
    assert!(!repo
        .transition_status(job_id, &[JobStatus::Pending], JobStatus::InProgress, None)
        .await
        .unwrap());
}

#[tokio::test]
#[ignore]
async fn retryable_failures_exhaust_after_max_attempts() {
    let _guard = db::acquire_test_lock();
    db::clean_test_db();

    let database = db::get_test_database();
    let jobs = ImportJobRepositoryImpl::new(database.clone());
    let job_id = create_job(&jobs, 1).await;
    let queue = PgTaskQueue::new(database, 2);

    queue
        .submit(ImportTask::new(job_id, 1, factories::product_row(1)))
        .await
        .unwrap();

    let first = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(first.attempts, 1);
    assert_eq!(
        queue
            .mark_failed(first.id, first.attempts, "store down", true)
            .await
            .unwrap(),
        FailureDisposition::Retry
    );

    let second = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(second.attempts, 2);
    assert_eq!(
        queue
            .mark_failed(second.id, second.attempts, "store down", true)
            .await
            .unwrap(),
        FailureDisposition::Exhausted
    );

    // A late caller from the first attempt cannot resolve it again
    assert_eq!(
        queue
            .mark_failed(first.id, first.attempts, "store down", true)
            .await
            .unwrap(),
        FailureDisposition::AlreadyResolved
    );

    let record = queue.get_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(queue.dequeue().await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn failed_task_is_unrecorded_until_flagged() {
    let _guard = db::acquire_test_lock();
    db::clean_test_db();

    let database = db::get_test_database();
    let jobs = ImportJobRepositoryImpl::new(database.clone());
    let job_id = create_job(&jobs, 1).await;
    let queue = PgTaskQueue::new(database, 1);

    queue
        .submit(ImportTask::new(job_id, 1, factories::product_row(1)))
        .await
        .unwrap();
    let attempt = queue.dequeue().await.unwrap().unwrap();
    queue
        .mark_failed(attempt.id, attempt.attempts, "store down", true)
        .await
        .unwrap();

    let unrecorded = queue.unrecorded_failures(Duration::ZERO).await.unwrap();
    assert_eq!(unrecorded.len(), 1);
    assert_eq!(unrecorded[0].id, attempt.id);
    assert!(!unrecorded[0].failure_recorded);
    assert!(queue
        .unrecorded_failures(Duration::from_secs(3600))
        .await
        .unwrap()
        .is_empty());

    queue.mark_failure_recorded(attempt.id).await.unwrap();
    assert!(queue.unrecorded_failures(Duration::ZERO).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn unfinished_jobs_and_task_counts() {
    let _guard = db::acquire_test_lock();
    db::clean_test_db();

    let database = db::get_test_database();
    let jobs = ImportJobRepositoryImpl::new(database.clone());
    let queue = PgTaskQueue::new(database, 3);

    let orphan = create_job(&jobs, 2).await;
    let dispatched = create_job(&jobs, 2).await;
    let finished = create_job(&jobs, 1).await;
    queue
        .submit_batch(vec![
            ImportTask::new(dispatched, 1, factories::product_row(1)),
            ImportTask::new(dispatched, 2, factories::product_row(2)),
        ])
        .await
        .unwrap();
    jobs.transition_status(finished, &JobStatus::NON_TERMINAL, JobStatus::Failed, Some("x"))
        .await
        .unwrap();

    let unfinished: Vec<_> = jobs
        .list_unfinished(chrono::Utc::now())
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.id)
        .collect();
    assert_eq!(unfinished.len(), 2);
    assert!(unfinished.contains(&orphan) && unfinished.contains(&dispatched));

    assert_eq!(queue.count_for_job(orphan).await.unwrap(), 0);
    assert_eq!(queue.count_for_job(dispatched).await.unwrap(), 2);
}

#[tokio::test]
#[ignore]
async fn upsert_by_sku_updates_existing_product() {
    let _guard = db::acquire_test_lock();
    db::clean_test_db();

    let repo = ProductRepositoryImpl::new(db::get_test_database());
    let first = repo
        .upsert_by_sku(NewProduct::new("Mug", "MUG-1", 4.5, 10))
        .await
        .unwrap();
    let second = repo
        .upsert_by_sku(NewProduct::new("Blue Mug", "MUG-1", 5.0, 3))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Blue Mug");
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn full_import_against_postgres() {
    let _guard = db::acquire_test_lock();
    db::clean_test_db();

    let system = ImportSystem::with_postgres(db::get_test_database(), helpers::test_config());
    let pool = system.start_workers();

    let mut rows = factories::product_rows(20);
    rows.push(factories::negative_price_row(21));
    let submitted = system.service.submit_batch("catalog.csv", rows).await.unwrap();

    let job = helpers::wait_until_terminal(&system, submitted.job_id).await;
    pool.shutdown().await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!((job.success_count, job.failure_count), (20, 1));
    assert_eq!(system.products.count().await.unwrap(), 20);
}
