use std::collections::BTreeMap;

use plinth_common::Meta;
use serde::{Deserialize, Serialize};

use crate::{InfluenceEntry, Result};

/// The drawing area.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub width: f64,
    pub height: f64,
    pub margin_x: f64,
    pub margin_y: f64,
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            width: 1200.0,
            height: 800.0,
            margin_x: 40.0,
            margin_y: 40.0,
        }
    }
}

impl Frame {
    pub fn inner_width(&self) -> f64 {
        (self.width - 2.0 * self.margin_x).max(0.0)
    }

    pub fn inner_height(&self) -> f64 {
        (self.height - 2.0 * self.margin_y).max(0.0)
    }
}

/// An axis-aligned block rectangle. `y` grows downward; `top < bottom`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Block {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    /// Length of the horizontal intersection of the two x-ranges. Negative
    /// when the ranges are disjoint.
    pub fn x_overlap(&self, other: &Block) -> f64 {
        self.right.min(other.right) - self.left.max(other.left)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Simple,
    HandDrawn,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VizType {
    #[default]
    Tower,
    NodeLink,
}

/// Which direction support weights flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlowDirection {
    #[default]
    BottomUp,
    TopDown,
}

#[derive(Clone, Debug)]
pub struct LayoutOptions {
    pub frame: Frame,
    pub style: Style,
    pub viz: VizType,
    pub seed: u64,
    pub flow: FlowDirection,
    /// Minimum horizontal gap between blocks in a row.
    pub gap: f64,
    /// Minimum x-intersection between the blocks of an edge.
    pub min_overlap: f64,
    /// Randomize: lower bound of the odd-row width shrink factor.
    pub width_shrink: f64,
    pub min_block_width: f64,
    /// Height of auxiliary-only rows, as a share of a regular row height.
    pub aux_row_scale: f64,
    pub max_fix_rounds: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            frame: Frame::default(),
            style: Style::default(),
            viz: VizType::default(),
            seed: 0,
            flow: FlowDirection::default(),
            gap: 8.0,
            min_overlap: 10.0,
            width_shrink: 0.85,
            min_block_width: 24.0,
            aux_row_scale: 0.2,
            max_fix_rounds: 10,
        }
    }
}

/// A positioned block plus the node facts the renderer needs. Value copies:
/// a layout never points back into the graph it came from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub block: Block,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub brittle: bool,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

/// A finished tower layout. Read-only after build; the transforms
/// ([`Layout::randomize`], [`Layout::merge`]) produce new layouts.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub frame: Frame,
    pub style: Style,
    pub viz: VizType,
    pub seed: u64,
    pub randomized: bool,
    pub merged: bool,
    pub rows: BTreeMap<usize, Vec<String>>,
    pub blocks: BTreeMap<String, LayoutBlock>,
    pub nebraska: Option<Vec<InfluenceEntry>>,
    /// Edges whose overlap stayed under the minimum after the repair rounds.
    pub overlap_violations: usize,
}

impl Layout {
    pub fn with_nebraska(mut self, ranking: Vec<InfluenceEntry>) -> Self {
        self.nebraska = Some(ranking);
        self
    }

    pub fn to_wire(&self) -> WireLayout {
        let blocks = self
            .blocks
            .iter()
            .map(|(id, b)| WireBlock {
                id: id.clone(),
                label: b.label.clone(),
                x: b.block.left,
                y: b.block.top,
                width: b.block.width(),
                height: b.block.height(),
                url: b.url.clone(),
                brittle: b.brittle,
                meta: b.meta.clone(),
            })
            .collect();
        WireLayout {
            frame: self.frame,
            style: self.style,
            viz: self.viz,
            seed: self.seed,
            randomized: self.randomized,
            merged: self.merged,
            rows: self.rows.clone(),
            blocks,
            nebraska: self.nebraska.clone(),
            overlap_violations: self.overlap_violations,
        }
    }

    pub fn from_wire(wire: WireLayout) -> Self {
        let blocks = wire
            .blocks
            .into_iter()
            .map(|b| {
                (
                    b.id,
                    LayoutBlock {
                        block: Block {
                            left: b.x,
                            right: b.x + b.width,
                            top: b.y,
                            bottom: b.y + b.height,
                        },
                        label: b.label,
                        url: b.url,
                        brittle: b.brittle,
                        meta: b.meta,
                    },
                )
            })
            .collect();
        Layout {
            frame: wire.frame,
            style: wire.style,
            viz: wire.viz,
            seed: wire.seed,
            randomized: wire.randomized,
            merged: wire.merged,
            rows: wire.rows,
            blocks,
            nebraska: wire.nebraska,
            overlap_violations: wire.overlap_violations,
        }
    }

    /// Canonical JSON bytes; maps are ordered, so the same layout always
    /// serializes identically.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_wire())?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let wire: WireLayout = serde_json::from_slice(bytes)?;
        Ok(Layout::from_wire(wire))
    }
}

/// Serialized form of a [`Layout`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireLayout {
    pub frame: Frame,
    pub style: Style,
    pub viz: VizType,
    pub seed: u64,
    #[serde(default)]
    pub randomized: bool,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub rows: BTreeMap<usize, Vec<String>>,
    #[serde(default)]
    pub blocks: Vec<WireBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nebraska: Option<Vec<InfluenceEntry>>,
    #[serde(default)]
    pub overlap_violations: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireBlock {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub brittle: bool,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}
