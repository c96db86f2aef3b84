use std::sync::Arc;

use taxroll_engine::catalog::RuleCatalog;
use taxroll_engine::issues::IssueService;
use taxroll_engine::jobs::JobRegistry;
use taxroll_engine::runner::BatchRunner;
use taxroll_engine::store::PropertyStore;

use crate::config::ServerConfig;

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PropertyStore>,
    pub catalog: RuleCatalog,
    pub issues: IssueService,
    pub runner: BatchRunner,
    pub jobs: Arc<JobRegistry>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire the engine services over a single store.
    pub fn new(store: Arc<dyn PropertyStore>, config: ServerConfig) -> Self {
        let catalog = RuleCatalog::new(Arc::clone(&store));
        let issues = IssueService::new(Arc::clone(&store));
        let runner = BatchRunner::new(Arc::clone(&store), catalog.clone());
        AppState {
            store,
            catalog,
            issues,
            runner,
            jobs: Arc::new(JobRegistry::new()),
            config: Arc::new(config),
        }
    }
}
