//! Outline graph from numbered headings.
//!
//! Lines of the form `1 Title`, `1.1 Title` and `1.1.1 Title` are headings of
//! level one to three. Each heading becomes a node and is linked from the
//! nearest open heading one level up. A heading whose parent level has not
//! been opened yet is skipped, as is every other line.

use knowgraph_core::{EdgeRecord, GraphRecord, NodeRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+){0,2})\s+(.+)$").unwrap());

/// Deepest heading level recognized.
pub const MAX_LEVEL: usize = 3;

/// A numbered heading parsed from one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub number: String,
    pub title: String,
}

/// Parse one line as a heading. Surrounding whitespace is ignored.
pub fn parse_heading(line: &str) -> Option<Heading> {
    let caps = HEADING.captures(line.trim())?;
    let number = caps[1].to_string();
    let title = caps[2].trim().to_string();
    if title.is_empty() {
        return None;
    }
    Some(Heading {
        level: number.split('.').count(),
        number,
        title,
    })
}

/// Build an unsaved graph named `name` from the heading lines of `text`.
///
/// Node ids are `h<i>` in document order; `type` is `h1`..`h3` and
/// `properties` carry `level` and the heading `number`. Edges `e<i>` run
/// parent to child with the label `contains`.
pub fn outline_graph(name: &str, text: &str) -> GraphRecord {
    let mut nodes: Vec<NodeRecord> = Vec::new();
    let mut edges: Vec<EdgeRecord> = Vec::new();
    // open[i] is the node id of the current heading at level i + 1
    let mut open: Vec<String> = Vec::with_capacity(MAX_LEVEL);
    let mut skipped = 0usize;

    for heading in text.lines().filter_map(parse_heading) {
        let depth = heading.level - 1;
        if depth > open.len() {
            skipped += 1;
            continue;
        }
        open.truncate(depth);

        let id = format!("h{}", nodes.len());
        let mut node = NodeRecord::new(id.clone(), heading.title);
        node.node_type = Some(format!("h{}", heading.level));
        node.properties
            .insert("level".into(), serde_json::Value::from(heading.level));
        node.properties
            .insert("number".into(), serde_json::Value::from(heading.number));
        nodes.push(node);

        if let Some(parent) = open.last() {
            edges.push(
                EdgeRecord::new(format!("e{}", edges.len()), parent.clone(), id.clone())
                    .with_label("contains"),
            );
        }
        open.push(id);
    }

    debug!(
        "Outline graph '{}': {} headings, {} orphaned headings skipped",
        name,
        nodes.len(),
        skipped
    );

    let mut graph = GraphRecord::new(name).with_description("Generated from headings");
    graph.nodes = nodes;
    graph.edges = edges;
    graph
}
