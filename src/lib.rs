pub mod config;
pub mod modules;
mod schema;
pub mod shared;

use config::ImportConfig;
use modules::{
    data_import::{ImportCoordinator, ImportService, RowProcessor},
    import_jobs::{
        ImportJobRepository, ImportJobRepositoryImpl, InMemoryImportJobRepository,
        ProgressAggregator,
    },
    products::{InMemoryProductRepository, ProductRepository, ProductRepositoryImpl},
    tasks::{InMemoryTaskQueue, PgTaskQueue, TaskQueue, WorkerConfig, WorkerPool},
};
use shared::utils::RetryConfig;
use shared::Database;
use std::sync::Arc;

/// Every service of the import pipeline, wired over one set of stores
#[derive(Clone)]
pub struct ImportSystem {
    pub config: ImportConfig,
    pub service: ImportService,
    pub aggregator: ProgressAggregator,
    pub processor: Arc<RowProcessor>,
    pub jobs: Arc<dyn ImportJobRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub queue: Arc<dyn TaskQueue>,
}

impl ImportSystem {
    /// Wire the pipeline over explicit store implementations
    pub fn from_parts(
        config: ImportConfig,
        jobs: Arc<dyn ImportJobRepository>,
        products: Arc<dyn ProductRepository>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        let aggregator = ProgressAggregator::new(Arc::clone(&jobs), config.completion_policy);
        let coordinator =
            ImportCoordinator::new(Arc::clone(&jobs), Arc::clone(&queue), aggregator.clone());
        let service = ImportService::new(coordinator, Arc::clone(&jobs), Arc::clone(&queue));
        let processor = Arc::new(RowProcessor::new(
            Arc::clone(&jobs),
            Arc::clone(&products),
            aggregator.clone(),
        ));

        Self {
            config,
            service,
            aggregator,
            processor,
            jobs,
            products,
            queue,
        }
    }

    /// Everything in process memory; nothing survives a restart
    pub fn in_memory(config: ImportConfig) -> Self {
        let queue = Arc::new(InMemoryTaskQueue::new(config.max_attempts));
        Self::from_parts(
            config,
            Arc::new(InMemoryImportJobRepository::new()),
            Arc::new(InMemoryProductRepository::new()),
            queue,
        )
    }

    /// Jobs, tasks and products stored in PostgreSQL
    pub fn with_postgres(database: Arc<Database>, config: ImportConfig) -> Self {
        let queue = Arc::new(PgTaskQueue::new(Arc::clone(&database), config.max_attempts));
        Self::from_parts(
            config,
            Arc::new(ImportJobRepositoryImpl::new(Arc::clone(&database))),
            Arc::new(ProductRepositoryImpl::new(database)),
            queue,
        )
    }

    /// Replace the backoff used when a terminal row failure cannot be recorded
    pub fn with_hook_retry(mut self, retry: RetryConfig) -> Self {
        self.processor = Arc::new((*self.processor).clone().with_hook_retry(retry));
        self
    }

    /// Start the configured number of row workers and the stale-task reaper
    pub fn start_workers(&self) -> WorkerPool {
        WorkerPool::start(
            Arc::clone(&self.queue),
            self.processor.clone(),
            WorkerConfig::from(&self.config),
        )
    }
}
