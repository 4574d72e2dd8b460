//! Shared application state.

use knowgraph_core::KnowGraphConfig;

use crate::repository::GraphRepository;

/// Shared state accessible from all route handlers.
pub struct AppState {
    pub repository: GraphRepository,
}

impl AppState {
    pub fn new(repository: GraphRepository) -> Self {
        Self { repository }
    }

    /// Open the repository at the configured collection file.
    pub fn from_config(config: &KnowGraphConfig) -> Self {
        Self::new(GraphRepository::open(&config.data_paths.server_graphs_file))
    }
}
