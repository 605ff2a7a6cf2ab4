//! GRAPH.QUERY reply → node graph frames
//!
//! Reply layout: `[header, rows, statistics]`. The header (column names) is
//! not consulted; structure is inferred from each entry's shape. Statistics
//! are ignored.
//!
//! Output is two frames sharing an id namespace: `nodes` (deduplicated, first
//! occurrence of an id wins) and `edges` (one row per relationship record).

use std::collections::HashSet;

use crate::client::RedisClient;
use crate::error::{FrameError, Result, ShapeError};
use crate::frame::{FieldType, FieldValue, Frame};
use crate::query::QueryModel;
use crate::reply::Reply;

use super::{find_all_nodes_and_edges, EdgeEntry, NodeEntry};

pub const NODE_GRAPH_VISUALIZATION: &str = "nodeGraph";

/// Nodes and edges frames of one graph query
#[derive(Debug, Clone, PartialEq)]
pub struct GraphFrames {
    pub nodes: Frame,
    pub edges: Frame,
    seen: HashSet<String>,
}

impl GraphFrames {
    pub fn new() -> std::result::Result<Self, FrameError> {
        let mut nodes = Frame::new("nodes").with_visualization(NODE_GRAPH_VISUALIZATION);
        nodes.add_column("id", FieldType::String)?;
        nodes.add_column("title", FieldType::String)?;
        nodes.add_column("subTitle", FieldType::String)?;
        nodes.add_column("mainStat", FieldType::String)?;
        nodes.add_column("arc__", FieldType::Int64)?;

        let mut edges = Frame::new("edges").with_visualization(NODE_GRAPH_VISUALIZATION);
        edges.add_column("id", FieldType::String)?;
        edges.add_column("source", FieldType::String)?;
        edges.add_column("target", FieldType::String)?;
        edges.add_column("mainStat", FieldType::String)?;

        Ok(Self {
            nodes,
            edges,
            seen: HashSet::new(),
        })
    }

    /// Append a node unless its id was already emitted. Returns whether a row was added.
    pub fn add_node(&mut self, node: NodeEntry) -> std::result::Result<bool, FrameError> {
        if self.seen.contains(&node.id) {
            return Ok(false);
        }
        self.nodes.append_row(vec![
            FieldValue::from(node.id.clone()),
            FieldValue::from(node.title),
            FieldValue::from(node.sub_title),
            FieldValue::from(node.main_stat),
            FieldValue::from(node.arc),
        ])?;
        self.seen.insert(node.id);
        Ok(true)
    }

    pub fn add_edge(&mut self, edge: EdgeEntry) -> std::result::Result<(), FrameError> {
        self.edges.append_row(vec![
            FieldValue::from(edge.id),
            FieldValue::from(edge.source),
            FieldValue::from(edge.target),
            FieldValue::from(edge.main_stat),
        ])
    }

    pub fn into_frames(self) -> Vec<Frame> {
        vec![self.nodes, self.edges]
    }
}

/// Build node/edge frames from a full GRAPH.QUERY reply.
pub fn parse_graph_reply(reply: &Reply) -> Result<GraphFrames> {
    let top = reply.as_array().map_err(|e| e.at("graph"))?;
    if top.len() < 2 {
        return Err(ShapeError::new("graph result of [header, rows, ...]", reply.shape())
            .at("graph")
            .into());
    }
    let rows = top[1].as_array().map_err(|e| e.at("graph.rows"))?;

    let mut frames = GraphFrames::new()?;
    for row in rows {
        let (nodes, edges) = find_all_nodes_and_edges(row)?;
        for node in nodes {
            frames.add_node(node)?;
        }
        for edge in edges {
            frames.add_edge(edge)?;
        }
    }
    Ok(frames)
}

/// GRAPH.QUERY <graph> <cypher>
pub fn query_graph(qm: &QueryModel, client: &dyn RedisClient) -> Result<Vec<Frame>> {
    let reply = client.run_cmd("GRAPH.QUERY", &[qm.key.as_str(), qm.cypher.as_str()])?;
    Ok(parse_graph_reply(&reply)?.into_frames())
}
