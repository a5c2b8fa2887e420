//! Directed page-to-page link graph built up during a crawl.
//!
//! Only successfully fetched pages are nodes. Edges may point at URLs that
//! were never fetched; those targets are kept as placeholders in the
//! underlying petgraph so the edge can exist, but they are not reported by
//! [`LinkGraph::nodes`].

use petgraph::Direction;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    pub url: String,
    /// False for placeholder targets that never became nodes.
    pub fetched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    graph: DiGraph<PageNode, ()>,
    index: HashMap<String, NodeIndex>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_of(&mut self, url: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(url) {
            return *idx;
        }
        let idx = self.graph.add_node(PageNode {
            url: url.to_string(),
            fetched: false,
        });
        self.index.insert(url.to_string(), idx);
        idx
    }

    /// Record `url` as a fetched page. Repeated calls are no-ops.
    pub fn add_node(&mut self, url: &str) {
        let idx = self.index_of(url);
        self.graph[idx].fetched = true;
    }

    /// Record a link from `source` to `target`. Repeated calls are no-ops.
    pub fn add_edge(&mut self, source: &str, target: &str) {
        let from = self.index_of(source);
        let to = self.index_of(target);
        self.graph.update_edge(from, to, ());
    }

    pub fn contains_node(&self, url: &str) -> bool {
        self.index
            .get(url)
            .is_some_and(|idx| self.graph[*idx].fetched)
    }

    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(from), Some(to)) => self.graph.contains_edge(*from, *to),
            _ => false,
        }
    }

    /// Fetched pages, in insertion order.
    pub fn nodes(&self) -> Vec<String> {
        self.graph
            .node_weights()
            .filter(|node| node.fetched)
            .map(|node| node.url.clone())
            .collect()
    }

    /// Every recorded link, including links to never-fetched targets.
    pub fn edges(&self) -> Vec<LinkEdge> {
        self.graph
            .edge_references()
            .map(|edge| LinkEdge {
                source: self.graph[edge.source()].url.clone(),
                target: self.graph[edge.target()].url.clone(),
            })
            .collect()
    }

    /// Edge targets that never became nodes.
    pub fn dangling_targets(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .filter(|idx| !self.graph[*idx].fetched)
            .filter(|idx| {
                self.graph
                    .neighbors_directed(*idx, Direction::Incoming)
                    .next()
                    .is_some()
            })
            .map(|idx| self.graph[idx].url.clone())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_weights().filter(|node| node.fetched).count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.node_count() == 0
    }

    /// Number of distinct links leaving `url`, or 0 for unknown URLs.
    pub fn out_degree(&self, url: &str) -> usize {
        self.degree(url, Direction::Outgoing)
    }

    /// Number of distinct pages linking to `url`, or 0 for unknown URLs.
    pub fn in_degree(&self, url: &str) -> usize {
        self.degree(url, Direction::Incoming)
    }

    fn degree(&self, url: &str, direction: Direction) -> usize {
        self.index
            .get(url)
            .map(|idx| self.graph.neighbors_directed(*idx, direction).count())
            .unwrap_or(0)
    }

    /// Targets linked from `url` that are themselves fetched pages.
    pub fn fetched_successors(&self, url: &str) -> Vec<String> {
        let Some(idx) = self.index.get(url) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .filter(|n| self.graph[*n].fetched)
            .map(|n| self.graph[n].url.clone())
            .collect()
    }

    /// Graphviz rendering of the fetched subgraph.
    ///
    /// Node labels are left to `node_attributes`, which receives each page
    /// URL and returns the attribute list placed inside `[ ... ]`.
    pub fn to_dot_with<F>(&self, node_attributes: F) -> String
    where
        F: Fn(&str) -> String,
    {
        let fetched = self.graph.filter_map(
            |_, node| node.fetched.then(|| node.url.clone()),
            |_, edge| Some(*edge),
        );
        format!(
            "{:?}",
            Dot::with_attr_getters(
                &fetched,
                &[Config::EdgeNoLabel, Config::NodeNoLabel],
                &|_, _| String::new(),
                &|_, (_, url)| node_attributes(url),
            )
        )
    }
}
