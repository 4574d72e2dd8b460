//! KnowGraph Core — graph record model, error taxonomy, configuration.

pub mod config;
pub mod error;
pub mod graph;

pub use config::{DataPaths, KnowGraphConfig};
pub use error::{Error, Result};
pub use graph::{EdgeRecord, GraphRecord, GraphSummary, NodeRecord, Position};
