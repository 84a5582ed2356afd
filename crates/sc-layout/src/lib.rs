#![forbid(unsafe_code)]

//! Layered flowchart layout.
//!
//! The pipeline runs cycle breaking, layer assignment, crossing
//! minimization, complexity analysis, coordinate assignment and edge routing
//! in that order. Every call starts from scratch and is deterministic: the
//! same flowchart and config always give the same layout.

mod complexity;
pub mod config;
mod coordinates;
mod cycles;
mod graph;
mod layering;
mod ordering;
mod routing;

use std::collections::BTreeMap;

use sc_core::{Flowchart, GraphDirection, NodeShape};
use serde::Serialize;
use tracing::debug;

pub use complexity::{ComplexityClass, ComplexityReport, SpacingParams};
pub use config::{ConfigError, LayoutConfig, MAX_ITERATION_CAP};
pub use routing::{RouteKind, RoutedEdge};

use complexity::{analyze, spacing_for};
use coordinates::assign_coordinates;
use cycles::find_back_edges;
use graph::LayoutGraph;
use layering::assign_layers;
use ordering::minimize_crossings;
use routing::route_edges;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LayoutPoint {
    pub x: f32,
    pub y: f32,
}

impl LayoutPoint {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box; `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LayoutRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutRect {
    #[must_use]
    pub fn from_center(center: LayoutPoint, width: f32, height: f32) -> Self {
        Self {
            x: center.x - width / 2.0,
            y: center.y - height / 2.0,
            width,
            height,
        }
    }

    #[must_use]
    pub fn center(self) -> LayoutPoint {
        LayoutPoint {
            x: self.x + (self.width / 2.0),
            y: self.y + (self.height / 2.0),
        }
    }

    #[must_use]
    pub fn padded(self, padding: f32) -> Self {
        Self {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + 2.0 * padding,
            height: self.height + 2.0 * padding,
        }
    }

    #[must_use]
    pub fn contains(self, point: LayoutPoint) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LayoutSize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePlacement {
    pub node_index: usize,
    pub node_id: String,
    pub layer: usize,
    /// Position inside the layer after crossing minimization.
    pub order: usize,
    pub center: LayoutPoint,
    pub bounds: LayoutRect,
    pub shape: NodeShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LayoutStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub layer_count: usize,
    pub back_edge_count: usize,
    /// Crossings of the layer assigner's id-sorted ordering.
    pub crossings_before: usize,
    pub crossings_after: usize,
    pub crossing_passes: usize,
    pub transpose_swaps: usize,
    /// Layering had to force a start node because none had in-degree zero.
    pub seeded_layering: bool,
    pub detoured_edges: usize,
    /// Detoured edges whose best attempt still touches an obstacle.
    pub unresolved_edges: usize,
    /// Sum of polyline lengths over all routed edges.
    pub total_edge_length: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutStageSnapshot {
    pub stage: &'static str,
    pub node_count: usize,
    pub edge_count: usize,
    pub back_edges: usize,
    pub layer_count: usize,
    pub crossing_count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LayoutTrace {
    pub snapshots: Vec<LayoutStageSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowchartLayout {
    pub direction: GraphDirection,
    /// Node ids per layer, in final order.
    pub layers: Vec<Vec<String>>,
    /// One placement per flowchart node, indexed like `Flowchart::nodes`.
    pub nodes: Vec<NodePlacement>,
    pub positions: BTreeMap<String, LayoutPoint>,
    pub routed_edges: Vec<RoutedEdge>,
    /// Indexes of edges excluded from layering.
    pub back_edges: Vec<usize>,
    pub canvas: LayoutSize,
    pub spacing: SpacingParams,
    pub complexity: ComplexityReport,
    pub stats: LayoutStats,
}

impl FlowchartLayout {
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodePlacement> {
        self.nodes.iter().find(|node| node.node_id == id)
    }

    #[must_use]
    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.node(id).map(|node| node.layer)
    }

    #[must_use]
    pub fn is_back_edge(&self, edge_index: usize) -> bool {
        self.back_edges.binary_search(&edge_index).is_ok()
    }

    #[must_use]
    pub fn routed_edge(&self, edge_index: usize) -> Option<&RoutedEdge> {
        self.routed_edges
            .iter()
            .find(|routed| routed.edge_index == edge_index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracedLayout {
    pub layout: FlowchartLayout,
    pub trace: LayoutTrace,
}

#[must_use]
pub fn layout_flowchart(chart: &Flowchart) -> FlowchartLayout {
    layout_flowchart_traced(chart, &LayoutConfig::default()).layout
}

#[must_use]
pub fn layout_flowchart_with_config(chart: &Flowchart, config: &LayoutConfig) -> FlowchartLayout {
    layout_flowchart_traced(chart, config).layout
}

/// Run the full pipeline and keep a snapshot after every stage.
///
/// Invalid config values fall back to their defaults instead of failing.
#[must_use]
pub fn layout_flowchart_traced(chart: &Flowchart, config: &LayoutConfig) -> TracedLayout {
    let config = config.sanitized();
    let mut trace = LayoutTrace::default();
    let graph = LayoutGraph::from_flowchart(chart);
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();

    let back_edges = find_back_edges(&graph);
    debug!(node_count, edge_count, back_edges = back_edges.len(), "cycle breaking");
    push_snapshot(&mut trace, "cycle_breaking", &graph, back_edges.len(), 0, 0);

    let layering = assign_layers(&graph, &back_edges);
    let crossings_initial =
        ordering::total_crossings_for(&graph, &layering.layers, &layering.layer_of);
    debug!(
        layers = layering.layers.len(),
        seeded = layering.seeded,
        "layer assignment"
    );
    push_snapshot(
        &mut trace,
        "layer_assignment",
        &graph,
        back_edges.len(),
        layering.layers.len(),
        crossings_initial,
    );

    let layer_of = layering.layer_of;
    let ordering = minimize_crossings(
        &graph,
        layering.layers,
        &layer_of,
        config.crossing_passes,
        config.transpose_rounds,
    );
    debug!(
        before = ordering.crossings_before,
        after = ordering.crossings_after,
        passes = ordering.passes,
        swaps = ordering.transpose_swaps,
        "crossing minimization"
    );
    push_snapshot(
        &mut trace,
        "crossing_minimization",
        &graph,
        back_edges.len(),
        ordering.layers.len(),
        ordering.crossings_after,
    );

    let complexity = analyze(chart, &ordering.layers);
    let spacing = spacing_for(&complexity, &config);
    debug!(
        class = complexity.class.as_str(),
        node_width = spacing.node_width,
        node_spacing = spacing.node_spacing,
        "complexity analysis"
    );
    push_snapshot(
        &mut trace,
        "complexity_analysis",
        &graph,
        back_edges.len(),
        ordering.layers.len(),
        ordering.crossings_after,
    );

    let coordinates = assign_coordinates(
        &graph,
        &ordering.layers,
        &layer_of,
        chart.direction,
        &spacing,
        &config,
    );
    debug!(
        width = coordinates.canvas.width,
        height = coordinates.canvas.height,
        "coordinate assignment"
    );
    push_snapshot(
        &mut trace,
        "coordinate_assignment",
        &graph,
        back_edges.len(),
        ordering.layers.len(),
        ordering.crossings_after,
    );

    let boxes: Vec<LayoutRect> = coordinates
        .centers
        .iter()
        .map(|center| LayoutRect::from_center(*center, spacing.node_width, spacing.node_height))
        .collect();
    let routed_edges = route_edges(chart, &graph, &boxes, &back_edges, &config);
    let detoured_edges = routed_edges
        .iter()
        .filter(|routed| routed.kind == RouteKind::Orthogonal)
        .count();
    let unresolved_edges = routed_edges.iter().filter(|routed| !routed.clear).count();
    debug!(
        routed = routed_edges.len(),
        detoured_edges, unresolved_edges, "edge routing"
    );
    push_snapshot(
        &mut trace,
        "edge_routing",
        &graph,
        back_edges.len(),
        ordering.layers.len(),
        ordering.crossings_after,
    );

    let mut order_of = vec![0_usize; node_count];
    for layer in &ordering.layers {
        for (order, node) in layer.iter().enumerate() {
            order_of[*node] = order;
        }
    }

    let nodes: Vec<NodePlacement> = chart
        .nodes
        .iter()
        .enumerate()
        .map(|(node_index, node)| NodePlacement {
            node_index,
            node_id: node.id.clone(),
            layer: layer_of[node_index],
            order: order_of[node_index],
            center: coordinates.centers[node_index],
            bounds: boxes[node_index],
            shape: node.shape,
        })
        .collect();

    let mut positions = BTreeMap::new();
    for placement in &nodes {
        positions
            .entry(placement.node_id.clone())
            .or_insert(placement.center);
    }

    let layers: Vec<Vec<String>> = ordering
        .layers
        .iter()
        .map(|layer| layer.iter().map(|node| graph.node_ids[*node].to_string()).collect())
        .collect();

    let stats = LayoutStats {
        node_count,
        edge_count,
        layer_count: layers.len(),
        back_edge_count: back_edges.len(),
        crossings_before: ordering.crossings_before,
        crossings_after: ordering.crossings_after,
        crossing_passes: ordering.passes,
        transpose_swaps: ordering.transpose_swaps,
        seeded_layering: layering.seeded,
        detoured_edges,
        unresolved_edges,
        total_edge_length: routed_edges
            .iter()
            .map(|routed| polyline_length(&routed.points()))
            .sum(),
    };

    TracedLayout {
        layout: FlowchartLayout {
            direction: chart.direction,
            layers,
            nodes,
            positions,
            routed_edges,
            back_edges: back_edges.edge_indexes.iter().copied().collect(),
            canvas: coordinates.canvas,
            spacing,
            complexity,
            stats,
        },
        trace,
    }
}

fn polyline_length(points: &[LayoutPoint]) -> f32 {
    points
        .windows(2)
        .map(|pair| {
            let dx = pair[1].x - pair[0].x;
            let dy = pair[1].y - pair[0].y;
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

fn push_snapshot(
    trace: &mut LayoutTrace,
    stage: &'static str,
    graph: &LayoutGraph<'_>,
    back_edges: usize,
    layer_count: usize,
    crossing_count: usize,
) {
    trace.snapshots.push(LayoutStageSnapshot {
        stage,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        back_edges,
        layer_count,
        crossing_count,
    });
}
