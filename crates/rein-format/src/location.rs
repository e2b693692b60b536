//! Shared-node back-references.
//!
//! A node consumed by several layers is serialized in full exactly once, at
//! its first appearance in the stream; every other reference is a compact
//! tagged code naming that first appearance by `(direction, layer, slot)`.
//! The code is a pure space saving on the wire and means nothing once the
//! graph is live.

use std::collections::HashMap;

use rein_core::{Graph, NodeId};

use crate::error::{FormatError, Result};

/// Tag byte of an input-direction location code.
pub const TAG_INPUT: u8 = 0x81;
/// Tag byte of an output-direction location code.
pub const TAG_OUTPUT: u8 = 0x82;

/// Which slot table of the referenced layer a code points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The node first appeared as a layer input (graph inputs, constants).
    Input,
    /// The node first appeared as a layer output (ordinary producers).
    Output,
}

/// A decoded back-reference: `(direction, layer, slot)`.
///
/// Layer indices are capped at 2^16 and slot indices at 2^8 by the wire
/// encoding; that is a documented ceiling on graph size and per-node
/// fan-out, enforced loudly at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationCode {
    /// Slot table the code points into.
    pub direction: Direction,
    /// Index of the referenced layer.
    pub layer: u16,
    /// Slot index within that layer's table.
    pub slot: u8,
}

impl LocationCode {
    /// Build a code, rejecting indices beyond the field widths.
    pub fn try_new(direction: Direction, layer: usize, slot: usize) -> Result<Self> {
        if layer > u16::MAX as usize || slot > u8::MAX as usize {
            tracing::error!(layer, slot, "graph exceeds location code field widths");
            return Err(FormatError::LocationOverflow { layer, slot });
        }
        Ok(Self {
            direction,
            layer: layer as u16,
            slot: slot as u8,
        })
    }

    /// Pack into the wire representation:
    /// `(tag << 56) | (layer << 8) | slot`.
    pub fn encode(self) -> u64 {
        let tag = match self.direction {
            Direction::Input => TAG_INPUT,
            Direction::Output => TAG_OUTPUT,
        };
        ((tag as u64) << 56) | ((self.layer as u64) << 8) | self.slot as u64
    }

    /// Exact inverse of [`LocationCode::encode`].
    ///
    /// Returns `None` for values that are not location codes (wrong tag or
    /// nonzero filler bits) — such values are inline offsets on the wire.
    pub fn decode(raw: u64) -> Option<Self> {
        let direction = match (raw >> 56) as u8 {
            TAG_INPUT => Direction::Input,
            TAG_OUTPUT => Direction::Output,
            _ => return None,
        };
        if (raw >> 24) & 0xFFFF_FFFF != 0 {
            return None;
        }
        Some(Self {
            direction,
            layer: ((raw >> 8) & 0xFFFF) as u16,
            slot: (raw & 0xFF) as u8,
        })
    }

    /// Whether a raw wire value carries a location tag.
    pub fn is_location(raw: u64) -> bool {
        matches!((raw >> 56) as u8, TAG_INPUT | TAG_OUTPUT)
    }
}

/// Find where `node` first appears in the serialized stream.
///
/// Scans every layer's output slots first — most nodes are ordinary
/// producer outputs — then every layer's input slots, which covers graph
/// inputs and constants, nodes that are never outputs. `Ok(None)` means the
/// node is referenced by no layer at all.
pub fn find_first_appearance(graph: &Graph, node: NodeId) -> Result<Option<LocationCode>> {
    for (li, &layer_id) in graph.layers().iter().enumerate() {
        let layer = graph
            .node(layer_id)
            .ok_or_else(|| FormatError::Malformed(format!("layer {li} missing from arena")))?;
        for (si, slot) in layer.outputs.iter().enumerate() {
            if *slot == Some(node) {
                return LocationCode::try_new(Direction::Output, li, si).map(Some);
            }
        }
    }
    for (li, &layer_id) in graph.layers().iter().enumerate() {
        let layer = graph
            .node(layer_id)
            .ok_or_else(|| FormatError::Malformed(format!("layer {li} missing from arena")))?;
        for (si, slot) in layer.inputs.iter().enumerate() {
            if *slot == Some(node) {
                return LocationCode::try_new(Direction::Input, li, si).map(Some);
            }
        }
    }
    Ok(None)
}

/// Precomputed first-appearance map for a whole graph.
///
/// Same semantics as [`find_first_appearance`] per node, built in one pass
/// over the edges so the dump loop has an O(1) "already placed" lookup.
#[derive(Debug)]
pub struct LocationIndex {
    map: HashMap<NodeId, LocationCode>,
}

impl LocationIndex {
    /// Index every node referenced by `graph`'s layers.
    pub fn build(graph: &Graph) -> Result<Self> {
        let mut map = HashMap::new();
        for (li, &layer_id) in graph.layers().iter().enumerate() {
            let layer = graph
                .node(layer_id)
                .ok_or_else(|| FormatError::Malformed(format!("layer {li} missing from arena")))?;
            for (si, slot) in layer.outputs.iter().enumerate() {
                if let Some(node) = slot {
                    map.entry(*node)
                        .or_insert(LocationCode::try_new(Direction::Output, li, si)?);
                }
            }
        }
        for (li, &layer_id) in graph.layers().iter().enumerate() {
            let layer = graph.node(layer_id).expect("checked above");
            for (si, slot) in layer.inputs.iter().enumerate() {
                if let Some(node) = slot {
                    map.entry(*node)
                        .or_insert(LocationCode::try_new(Direction::Input, li, si)?);
                }
            }
        }
        Ok(Self { map })
    }

    /// First appearance of `node`, if any layer references it.
    pub fn locate(&self, node: NodeId) -> Option<LocationCode> {
        self.map.get(&node).copied()
    }
}
