//! One command scope from repository to commit.

use std::future::Future;
use std::sync::Arc;

use domain::{AggregateRepository, RepositoryError};
use event_store::{Command, EventStore};

use crate::config::CoreConfig;

/// Executes commands against the configured core.
///
/// Each execution is one unit of work: a fresh repository is handed to the
/// handler, and whatever the handler loaded or added is committed together
/// with the command once it returns.
pub struct CommandService {
    config: Arc<CoreConfig>,
}

impl CommandService {
    pub fn new(config: Arc<CoreConfig>) -> Self {
        Self { config }
    }

    /// A service over the process-wide configuration.
    ///
    /// # Panics
    ///
    /// Panics when the runtime is not configured.
    pub fn from_current() -> Self {
        Self::new(crate::config::current())
    }

    /// Runs `handle` inside a fresh command scope and commits the result.
    ///
    /// The handler receives the repository by value and returns it; events
    /// applied to any aggregate it tracked are submitted to the event store
    /// as one `(command, events)` batch.
    #[tracing::instrument(skip(self, command, handle), fields(command_type = command.command_type()))]
    pub async fn execute<F, Fut>(&self, command: Command, handle: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(AggregateRepository<Arc<dyn EventStore>>) -> Fut,
        Fut: Future<Output = Result<AggregateRepository<Arc<dyn EventStore>>, RepositoryError>>,
    {
        let repository = self.config.repository();
        let mut repository = handle(repository).await?;
        repository.commit(command).await
    }
}
