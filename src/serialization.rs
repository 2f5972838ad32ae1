//! Whole-graph persistence.
//!
//! The archive is a bincode-encoded record: a header carrying the format
//! version and the environment, one record per frame (id plus the encoded
//! item map), and one record per directed edge. Both directions of every
//! edge pair are written explicitly; on load the label index is rebuilt and
//! edge pairing is the only invariant re-checked.
//!
//! The item map is encoded as the count of serializable type groups, then
//! per group the item count, then per item a class-name header followed by
//! the bytes produced by the registered codec for that class. All counts are
//! fixed-width 64-bit values. Items of unregistered classes are skipped with
//! a warning during save; unknown class names during load get one chance to
//! resolve through the plugin-loader hook and are otherwise dropped with an
//! error log.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path as FilePath;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::frame::Environment;
use crate::graph::environment_graph::EnvironmentGraph;
use crate::graph::NodeIndex;
use crate::item::{codec, metadata, ItemRef};
use crate::transform::Transform;

/// Bumped when the archive layout changes. Readers reject archives written
/// with a newer version than they understand.
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ArchiveHeader {
    version: u32,
    environment: Environment,
}

#[derive(Serialize, Deserialize)]
struct ItemRecord {
    class_name: String,
    bytes: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct FrameRecord {
    id: String,
    item_groups: Vec<Vec<ItemRecord>>,
}

#[derive(Serialize, Deserialize)]
struct EdgeRecord {
    source: u64,
    target: u64,
    transform: Transform,
}

#[derive(Serialize, Deserialize)]
struct GraphRecord {
    header: ArchiveHeader,
    frames: Vec<FrameRecord>,
    edges: Vec<EdgeRecord>,
}

fn encode(graph: &EnvironmentGraph) -> Result<GraphRecord, GraphError> {
    let mut frames = Vec::new();
    let mut vertex_indices: HashMap<NodeIndex, u64> = HashMap::new();
    for (id, vertex) in graph.label_entries() {
        vertex_indices.insert(vertex, frames.len() as u64);
        let item_groups = match graph.frame_property_at(vertex) {
            Some(frame) => encode_item_map(frame)?,
            None => Vec::new(),
        };
        frames.push(FrameRecord {
            id: id.as_str().to_owned(),
            item_groups,
        });
    }

    let mut edges = Vec::new();
    for edge in graph.edges() {
        let Some((source, target)) = graph.edge_endpoints(edge) else {
            continue;
        };
        let (Some(&source), Some(&target)) =
            (vertex_indices.get(&source), vertex_indices.get(&target))
        else {
            continue;
        };
        let Some(transform) = graph.edge_property_at(edge) else {
            continue;
        };
        edges.push(EdgeRecord {
            source,
            target,
            transform: transform.clone(),
        });
    }

    Ok(GraphRecord {
        header: ArchiveHeader {
            version: FORMAT_VERSION,
            environment: graph.environment().clone(),
        },
        frames,
        edges,
    })
}

fn encode_item_map(frame: &crate::frame::Frame) -> Result<Vec<Vec<ItemRecord>>, GraphError> {
    let mut groups = Vec::new();
    for (tag, list) in &frame.items {
        let Some(meta) = metadata::get(*tag) else {
            log::warn!(
                "skipping {} item(s) in frame {}: type is not registered",
                list.len(),
                frame.id()
            );
            continue;
        };
        let Some(item_codec) = codec::codec_for(&meta.class_name) else {
            log::warn!(
                "skipping {} item(s) in frame {}: no codec for class {}",
                list.len(),
                frame.id(),
                meta.class_name
            );
            continue;
        };
        let mut records = Vec::with_capacity(list.len());
        for item in list {
            records.push(ItemRecord {
                class_name: meta.class_name.clone(),
                bytes: item_codec.save_binary(item.as_ref())?,
            });
        }
        groups.push(records);
    }
    Ok(groups)
}

fn decode(record: GraphRecord) -> Result<EnvironmentGraph, GraphError> {
    if record.header.version > FORMAT_VERSION {
        return Err(GraphError::Archive(format!(
            "unsupported archive version {}",
            record.header.version
        )));
    }
    let mut graph = EnvironmentGraph::with_environment(record.header.environment);

    let mut vertices = Vec::with_capacity(record.frames.len());
    for frame in &record.frames {
        let vertex = graph.add_frame(&frame.id)?;
        vertices.push(vertex);
    }

    for frame in &record.frames {
        for group in &frame.item_groups {
            for item_record in group {
                match load_item(item_record) {
                    Ok(item) => graph.add_item_to_frame(&frame.id, item)?,
                    Err(error) => {
                        log::error!(
                            "dropping item of class {} in frame {}: {error}",
                            item_record.class_name,
                            frame.id
                        );
                    }
                }
            }
        }
    }

    for edge in &record.edges {
        let source = vertex_at(&vertices, edge.source)?;
        let target = vertex_at(&vertices, edge.target)?;
        graph.insert_raw_edge(source, target, edge.transform.clone());
    }

    // Pairing is the only structural invariant checked on load.
    for edge in graph.edges().collect::<Vec<_>>() {
        let Some((source, target)) = graph.edge_endpoints(edge) else {
            continue;
        };
        if !graph.contains_edge_between(target, source) {
            let origin = graph.frame_id(source).cloned().unwrap_or_default();
            let target = graph.frame_id(target).cloned().unwrap_or_default();
            return Err(GraphError::Archive(format!(
                "archive contains unpaired edge {origin} -> {target}"
            )));
        }
    }

    Ok(graph)
}

fn vertex_at(vertices: &[NodeIndex], index: u64) -> Result<NodeIndex, GraphError> {
    vertices
        .get(index as usize)
        .copied()
        .ok_or_else(|| GraphError::Archive(format!("edge references unknown vertex {index}")))
}

fn load_item(record: &ItemRecord) -> Result<ItemRef, GraphError> {
    let item_codec = codec::codec_for(&record.class_name).ok_or_else(|| {
        GraphError::Archive(format!("no codec for class {}", record.class_name))
    })?;
    item_codec.load_binary(&record.bytes)
}

pub(crate) fn save_to_bytes(graph: &EnvironmentGraph) -> Result<Vec<u8>, GraphError> {
    Ok(bincode::serialize(&encode(graph)?)?)
}

pub(crate) fn load_from_bytes(bytes: &[u8]) -> Result<EnvironmentGraph, GraphError> {
    decode(bincode::deserialize(bytes)?)
}

pub(crate) fn save_to_file(graph: &EnvironmentGraph, path: &FilePath) -> Result<(), GraphError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &encode(graph)?)?;
    Ok(())
}

pub(crate) fn load_from_file(path: &FilePath) -> Result<EnvironmentGraph, GraphError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    decode(bincode::deserialize_from(reader)?)
}

/// Serializes a single item through its registered codec, prefixed with the
/// class-name header.
pub fn save_item_to_bytes(item: &ItemRef) -> Result<Vec<u8>, GraphError> {
    let class_name = item
        .class_name()
        .ok_or_else(|| GraphError::Archive("item type is not registered".into()))?;
    let item_codec = codec::codec_for(&class_name)
        .ok_or_else(|| GraphError::Archive(format!("no codec for class {class_name}")))?;
    let record = ItemRecord {
        bytes: item_codec.save_binary(item.as_ref())?,
        class_name,
    };
    Ok(bincode::serialize(&record)?)
}

/// Loads a single item written by [`save_item_to_bytes`].
pub fn load_item_from_bytes(bytes: &[u8]) -> Result<ItemRef, GraphError> {
    let record: ItemRecord = bincode::deserialize(bytes)?;
    load_item(&record)
}
