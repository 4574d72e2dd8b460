//! Word-adjacency graph generation.

use std::collections::HashMap;

use knowgraph_core::{EdgeRecord, GraphRecord, NodeRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::stopwords::is_stop_word;

static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?;\n]+").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'_-]*").unwrap());

/// Tuning knobs for `generate_graph`.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Distinct words beyond this count are dropped.
    pub max_nodes: usize,
    /// Words shorter than this (in chars) are skipped.
    pub min_word_len: usize,
    pub keep_stop_words: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_nodes: 50,
            min_word_len: 3,
            keep_stop_words: false,
        }
    }
}

/// Build an unsaved graph named `name` from `text`.
///
/// Nodes are keyed by lower-cased word and labelled with the first spelling
/// seen; `properties.count` holds the occurrence count. Edges link words that
/// follow each other within a sentence, once per ordered pair, with the pair
/// frequency as `width`. Ids are `n<i>`/`e<i>` in order of first appearance.
pub fn generate_graph(name: &str, text: &str, opts: &GenerateOptions) -> GraphRecord {
    let mut nodes: Vec<NodeRecord> = Vec::new();
    let mut counts: Vec<u64> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();
    let mut edges: Vec<EdgeRecord> = Vec::new();
    let mut edge_index: HashMap<(usize, usize), usize> = HashMap::new();

    for sentence in SENTENCE_SPLIT.split(text) {
        let mut previous: Option<usize> = None;

        for m in WORD.find_iter(sentence) {
            let word = m.as_str().trim_end_matches(&['\'', '-', '_'][..]);
            if word.chars().count() < opts.min_word_len
                || (!opts.keep_stop_words && is_stop_word(word))
            {
                continue;
            }

            let key = word.to_lowercase();
            let current = match index_of.get(&key) {
                Some(&i) => i,
                None if nodes.len() < opts.max_nodes => {
                    let i = nodes.len();
                    nodes.push(NodeRecord::new(format!("n{}", i), word));
                    counts.push(0);
                    index_of.insert(key, i);
                    i
                }
                None => {
                    // over the cap: breaks the chain instead of bridging it
                    previous = None;
                    continue;
                }
            };
            counts[current] += 1;

            if let Some(prev) = previous.filter(|&p| p != current) {
                match edge_index.get(&(prev, current)) {
                    Some(&e) => {
                        let width = edges[e].width.unwrap_or(1.0);
                        edges[e].width = Some(width + 1.0);
                    }
                    None => {
                        edge_index.insert((prev, current), edges.len());
                        let mut edge = EdgeRecord::new(
                            format!("e{}", edges.len()),
                            nodes[prev].id.clone(),
                            nodes[current].id.clone(),
                        );
                        edge.width = Some(1.0);
                        edges.push(edge);
                    }
                }
            }
            previous = Some(current);
        }
    }

    for (node, count) in nodes.iter_mut().zip(counts) {
        node.node_type = Some("word".into());
        node.properties
            .insert("count".into(), serde_json::Value::from(count));
    }

    debug!(
        "Generated graph '{}': {} nodes, {} edges",
        name,
        nodes.len(),
        edges.len()
    );

    let mut graph = GraphRecord::new(name).with_description("Generated from text");
    graph.nodes = nodes;
    graph.edges = edges;
    graph
}
