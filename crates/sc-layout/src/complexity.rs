use sc_core::Flowchart;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::LayoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityClass {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplexityReport {
    pub class: ComplexityClass,
    pub node_count: usize,
    pub edge_count: usize,
    /// Edges per node.
    pub edge_density: f32,
    pub max_layer_width: usize,
    /// Longest display label in grapheme clusters.
    pub longest_label: usize,
}

/// Uniform node size and gaps used by coordinate assignment.
///
/// `node_spacing` is the gap between neighbors inside a layer (horizontal in
/// top-down diagrams), `layer_spacing` the gap between consecutive layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpacingParams {
    pub node_width: f32,
    pub node_height: f32,
    pub node_spacing: f32,
    pub layer_spacing: f32,
}

const CHAR_WIDTH: f32 = 7.5;
const LABEL_PADDING: f32 = 24.0;
const MIN_NODE_WIDTH: f32 = 48.0;

struct ClassProfile {
    base_width: f32,
    max_width: f32,
    height: f32,
    /// Gap inside a layer as a fraction of node width.
    node_spacing_ratio: f32,
    /// Gap between layers as a fraction of node height.
    layer_spacing_ratio: f32,
}

const fn profile(class: ComplexityClass) -> ClassProfile {
    match class {
        ComplexityClass::Simple => ClassProfile {
            base_width: 140.0,
            max_width: 220.0,
            height: 56.0,
            node_spacing_ratio: 0.45,
            layer_spacing_ratio: 1.4,
        },
        ComplexityClass::Moderate => ClassProfile {
            base_width: 120.0,
            max_width: 180.0,
            height: 50.0,
            node_spacing_ratio: 0.35,
            layer_spacing_ratio: 1.2,
        },
        ComplexityClass::Complex => ClassProfile {
            base_width: 100.0,
            max_width: 140.0,
            height: 44.0,
            node_spacing_ratio: 0.25,
            layer_spacing_ratio: 1.0,
        },
    }
}

#[must_use]
pub fn analyze(chart: &Flowchart, layers: &[Vec<usize>]) -> ComplexityReport {
    let node_count = chart.nodes.len();
    let edge_count = chart.edges.len();
    let edge_density = if node_count == 0 {
        0.0
    } else {
        edge_count as f32 / node_count as f32
    };
    let max_layer_width = layers.iter().map(Vec::len).max().unwrap_or(0);
    let longest_label = chart
        .nodes
        .iter()
        .map(|node| node.display_label().graphemes(true).count())
        .max()
        .unwrap_or(0);

    let class = if node_count > 20 || edge_density > 2.0 || max_layer_width > 6 {
        ComplexityClass::Complex
    } else if node_count > 8 || edge_density > 1.3 || max_layer_width > 3 {
        ComplexityClass::Moderate
    } else {
        ComplexityClass::Simple
    };

    ComplexityReport {
        class,
        node_count,
        edge_count,
        edge_density,
        max_layer_width,
        longest_label,
    }
}

/// Node size and spacing for a report.
///
/// Widths grow with the longest label up to a per-class cap. Complex
/// diagrams additionally shrink nodes so their widest layer fits
/// `config.target_width`, down to a fixed floor.
#[must_use]
pub fn spacing_for(report: &ComplexityReport, config: &LayoutConfig) -> SpacingParams {
    let profile = profile(report.class);
    let label_width = report.longest_label as f32 * CHAR_WIDTH + LABEL_PADDING;
    let mut node_width = label_width.clamp(profile.base_width, profile.max_width);

    if report.class == ComplexityClass::Complex && report.max_layer_width > 1 {
        let slots = report.max_layer_width as f32;
        let gaps = (report.max_layer_width - 1) as f32 * profile.node_spacing_ratio;
        let fitted = (config.target_width - 2.0 * config.margin).max(0.0) / (slots + gaps);
        node_width = node_width.min(fitted).max(MIN_NODE_WIDTH);
    }

    SpacingParams {
        node_width,
        node_height: profile.height,
        node_spacing: node_width * profile.node_spacing_ratio,
        layer_spacing: profile.height * profile.layer_spacing_ratio,
    }
}
