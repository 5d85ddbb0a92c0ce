//! Shared handles for the worker pools.

use std::sync::Arc;

use vgen_client::VideoBackend;
use vgen_queue::JobQueue;

use crate::activity::ActivityLog;
use crate::collector::ResultCollector;
use crate::config::WorkerConfig;
use crate::keys::KeyRotator;

/// Everything a pool worker needs, shared across tasks.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: WorkerConfig,
    pub queue: Arc<JobQueue>,
    pub keys: Arc<KeyRotator>,
    pub backend: Arc<dyn VideoBackend>,
    pub collector: Arc<ResultCollector>,
    pub activity: Arc<ActivityLog>,
}

impl WorkerContext {
    /// Create a context with an empty queue and collector.
    pub fn new(config: WorkerConfig, backend: Arc<dyn VideoBackend>, keys: Vec<String>) -> Self {
        let activity = Arc::new(ActivityLog::new(config.activity_log_cap));
        Self {
            queue: Arc::new(JobQueue::new()),
            keys: Arc::new(KeyRotator::new(keys)),
            backend,
            collector: Arc::new(ResultCollector::new()),
            activity,
            config,
        }
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("config", &self.config)
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}
