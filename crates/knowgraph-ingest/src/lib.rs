//! KnowGraph Ingest — builds a toy graph from free text.
//!
//! Each distinct content word becomes a node and each pair of words that
//! appear next to each other in a sentence becomes an edge. No NLP.
//! `outline_graph` instead turns numbered headings into a containment tree.

pub mod generate;
pub mod outline;
pub mod stopwords;

pub use generate::{generate_graph, GenerateOptions};
pub use outline::{outline_graph, parse_heading, Heading};
