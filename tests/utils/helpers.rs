/// Test helper functions and system builders
use async_trait::async_trait;
use product_import::config::ImportConfig;
use chrono::{DateTime, Utc};
use product_import::modules::import_jobs::{
    CompletionPolicy, CounterUpdate, ImportJob, ImportJobRepository, InMemoryImportJobRepository,
    JobStatus, NewImportJob, TaskOutcome,
};
use product_import::modules::products::{
    InMemoryProductRepository, NewProduct, Product, ProductRepository,
};
use product_import::modules::tasks::{InMemoryTaskQueue, TaskQueue};
use product_import::shared::application::{PaginatedResult, PaginationParams};
use product_import::shared::errors::{AppError, AppResult};
use product_import::ImportSystem;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Fast timings so worker-driven tests finish in well under a second
pub fn test_config() -> ImportConfig {
    ImportConfig {
        max_attempts: 3,
        attempt_timeout: Duration::from_secs(5),
        worker_concurrency: 4,
        poll_interval: Duration::from_millis(10),
        reaper_interval: Duration::from_secs(1),
        completion_policy: CompletionPolicy::AlwaysComplete,
    }
}

pub fn build_in_memory_system() -> ImportSystem {
    ImportSystem::in_memory(test_config())
}

/// In-memory jobs and queue over a caller-supplied product store
pub fn build_system_with_products(products: Arc<dyn ProductRepository>) -> ImportSystem {
    let config = test_config();
    let queue = Arc::new(InMemoryTaskQueue::new(config.max_attempts));
    build_system_with(Arc::new(InMemoryImportJobRepository::new()), products, queue)
}

pub fn build_system_with(
    jobs: Arc<dyn ImportJobRepository>,
    products: Arc<dyn ProductRepository>,
    queue: Arc<dyn TaskQueue>,
) -> ImportSystem {
    ImportSystem::from_parts(test_config(), jobs, products, queue)
}

/// Poll until the job is Completed or Failed
pub async fn wait_until_terminal(system: &ImportSystem, job_id: Uuid) -> ImportJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = system.service.get_status(job_id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "import {} still {} after 10s ({}/{})",
            job_id,
            job.status,
            job.processed(),
            job.total
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Product store that is down for the first `outages` calls
pub struct FlakyProductRepository {
    inner: InMemoryProductRepository,
    outages: u32,
    calls: AtomicU32,
}

impl FlakyProductRepository {
    pub fn new(outages: u32) -> Self {
        Self {
            inner: InMemoryProductRepository::new(),
            outages,
            calls: AtomicU32::new(0),
        }
    }

    /// Never recovers
    pub fn unavailable() -> Self {
        Self::new(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductRepository for FlakyProductRepository {
    async fn upsert_by_sku(&self, product: NewProduct) -> AppResult<Product> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.outages {
            return Err(AppError::StoreUnavailable("connection refused".to_string()));
        }
        self.inner.upsert_by_sku(product).await
    }

    async fn find_by_sku(&self, sku: &str) -> AppResult<Option<Product>> {
        self.inner.find_by_sku(sku).await
    }

    async fn count(&self) -> AppResult<u64> {
        self.inner.count().await
    }
}

/// Job store whose counter updates and status transitions can be taken down
#[derive(Default)]
pub struct OutageJobRepository {
    inner: InMemoryImportJobRepository,
    increments_down: AtomicBool,
    transitions_down: AtomicBool,
    rejected_increments: AtomicU32,
}

impl OutageJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_increments_down(&self, down: bool) {
        self.increments_down.store(down, Ordering::SeqCst);
    }

    pub fn set_transitions_down(&self, down: bool) {
        self.transitions_down.store(down, Ordering::SeqCst);
    }

    pub fn rejected_increments(&self) -> u32 {
        self.rejected_increments.load(Ordering::SeqCst)
    }

    fn outage() -> AppError {
        AppError::StoreUnavailable("job store down".to_string())
    }
}

#[async_trait]
impl ImportJobRepository for OutageJobRepository {
    async fn create(&self, job: NewImportJob) -> AppResult<ImportJob> {
        self.inner.create(job).await
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<ImportJob>> {
        self.inner.get_by_id(job_id).await
    }

    async fn increment_counter(
        &self,
        job_id: Uuid,
        row_index: u32,
        outcome: &TaskOutcome,
    ) -> AppResult<CounterUpdate> {
        if self.increments_down.load(Ordering::SeqCst) {
            self.rejected_increments.fetch_add(1, Ordering::SeqCst);
            return Err(Self::outage());
        }
        self.inner.increment_counter(job_id, row_index, outcome).await
    }

    async fn transition_status(
        &self,
        job_id: Uuid,
        expected: &[JobStatus],
        next: JobStatus,
        error_message: Option<&str>,
    ) -> AppResult<bool> {
        if self.transitions_down.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner
            .transition_status(job_id, expected, next, error_message)
            .await
    }

    async fn list(&self, params: &PaginationParams) -> AppResult<PaginatedResult<ImportJob>> {
        self.inner.list(params).await
    }

    async fn list_unfinished(&self, created_before: DateTime<Utc>) -> AppResult<Vec<ImportJob>> {
        self.inner.list_unfinished(created_before).await
    }
}
