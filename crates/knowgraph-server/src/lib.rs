//! KnowGraph reference backend — the `/graphs` HTTP API the remote store talks to.

pub mod repository;
pub mod routes;
pub mod state;

pub use repository::GraphRepository;
pub use routes::build_router;
pub use state::AppState;
