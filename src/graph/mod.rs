//! Graph entities extracted from GRAPH.QUERY replies
//!
//! Records are recognised by field count alone:
//! - 3 fields: node `[["id", n], ["labels", [..]], ["properties", [[k, v], ..]]]`
//! - 5 fields: relationship
//!   `[["id", n], ["type", t], ["src_node", n], ["dest_node", n], ["properties", [..]]]`
//!
//! Anything else is not a record. Title and main stat of a node come from
//! its first label and first property only; further labels and properties
//! are not shown.

pub mod parser;
pub mod slowlog;

pub use parser::{parse_graph_reply, query_graph, GraphFrames};
pub use slowlog::{decode_slowlog, query_graph_slowlog};

use crate::error::ShapeError;
use crate::reply::Reply;
use crate::resp::MAX_DEPTH;

/// Field count of a node record
pub const NODE_FIELDS: usize = 3;

/// Field count of a relationship record
pub const EDGE_FIELDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub id: String,
    pub title: String,
    /// Reserved, always empty
    pub sub_title: String,
    pub main_stat: String,
    /// Constant weight for the node graph arc
    pub arc: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeEntry {
    pub id: String,
    /// Relationship type
    pub main_stat: String,
    pub source: String,
    pub target: String,
}

/// Interpret a 3-field record as a node.
pub fn extract_node(fields: &[Reply]) -> Result<NodeEntry, ShapeError> {
    let [id, labels, properties] = fields else {
        let actual = format!("{} fields", fields.len());
        return Err(ShapeError::new("node record of 3 fields", actual));
    };

    let id = id.pair_value().and_then(Reply::as_int).map_err(|e| e.at("node.id"))?;

    let labels = labels
        .pair_value()
        .and_then(Reply::as_array)
        .map_err(|e| e.at("node.labels"))?;
    let title = match labels.first() {
        Some(label) => label.as_text().map_err(|e| e.at("node.labels"))?.into_owned(),
        None => String::new(),
    };

    let properties = properties
        .pair_value()
        .and_then(Reply::as_array)
        .map_err(|e| e.at("node.properties"))?;
    let main_stat = match properties.first() {
        Some(property) => {
            let value = property.pair_value().map_err(|e| e.at("node.properties"))?;
            stringify_property(value)
        }
        None => String::new(),
    };

    Ok(NodeEntry {
        id: id.to_string(),
        title,
        sub_title: String::new(),
        main_stat,
        arc: 1,
    })
}

/// Interpret a 5-field record as a relationship. Its properties are not read.
pub fn extract_edge(fields: &[Reply]) -> Result<EdgeEntry, ShapeError> {
    let [id, rel_type, src, dst, _properties] = fields else {
        let actual = format!("{} fields", fields.len());
        return Err(ShapeError::new("relationship record of 5 fields", actual));
    };

    let id = id.pair_value().and_then(Reply::as_int).map_err(|e| e.at("edge.id"))?;
    let main_stat = rel_type
        .pair_value()
        .and_then(Reply::as_text)
        .map_err(|e| e.at("edge.type"))?
        .into_owned();
    let source = src.pair_value().and_then(Reply::as_int).map_err(|e| e.at("edge.src_node"))?;
    let target = dst.pair_value().and_then(Reply::as_int).map_err(|e| e.at("edge.dest_node"))?;

    Ok(EdgeEntry {
        id: id.to_string(),
        main_stat,
        source: source.to_string(),
        target: target.to_string(),
    })
}

/// Text for a property value: bytes as UTF-8, integers in base 10.
/// Other value kinds render as an empty string.
pub fn stringify_property(value: &Reply) -> String {
    match value {
        Reply::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Reply::Str(s) => s.clone(),
        Reply::Int(n) => n.to_string(),
        Reply::Array(_) | Reply::Nil => String::new(),
    }
}

/// Collect every node and relationship record in one result row.
///
/// Entries that are arrays of 3 or 5 fields are records; other arrays are
/// searched one level down, recursively. Scalars are skipped. Collections
/// nested deeper than [`MAX_DEPTH`] are a shape error.
pub fn find_all_nodes_and_edges(
    row: &Reply,
) -> Result<(Vec<NodeEntry>, Vec<EdgeEntry>), ShapeError> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    if let Reply::Array(entries) = row {
        for entry in entries {
            collect_entry(entry, 0, &mut nodes, &mut edges)?;
        }
    }

    Ok((nodes, edges))
}

fn collect_entry(
    entry: &Reply,
    depth: usize,
    nodes: &mut Vec<NodeEntry>,
    edges: &mut Vec<EdgeEntry>,
) -> Result<(), ShapeError> {
    let Reply::Array(fields) = entry else {
        return Ok(());
    };

    match fields.len() {
        NODE_FIELDS => nodes.push(extract_node(fields)?),
        EDGE_FIELDS => edges.push(extract_edge(fields)?),
        _ if depth >= MAX_DEPTH => {
            return Err(ShapeError::new(
                format!("at most {} nested collections", MAX_DEPTH),
                format!("{} levels", depth + 1),
            ));
        }
        _ => {
            for nested in fields {
                collect_entry(nested, depth + 1, nodes, edges)?;
            }
        }
    }
    Ok(())
}
