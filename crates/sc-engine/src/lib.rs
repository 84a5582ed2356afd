#![forbid(unsafe_code)]

//! Text in, layout out.
//!
//! [`process`] parses diagram text and, for flowcharts, runs the layered
//! layout. The result is plain serializable data for a renderer. Every
//! input produces an output: unknown kinds come back as an unsupported
//! passthrough and malformed lines only add warnings.

use std::collections::BTreeMap;

use sc_core::{Diagram, DiagramKind, EdgeStyle, Flowchart, GraphDirection, NodeShape, Style};
use sc_layout::{
    LayoutConfig, LayoutPoint, LayoutSize, LayoutStats, LayoutTrace, RoutedEdge,
    layout_flowchart_traced,
};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Flowchart,
    Unsupported,
}

impl OutputKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOutput {
    pub id: String,
    /// Label to draw; the id for bare nodes.
    pub label: String,
    pub shape: NodeShape,
    /// Class styles overlaid by the node's own `style` directive.
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeOutput {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub style: EdgeStyle,
    pub color: Option<String>,
    pub link_style: Style,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramOutput {
    pub diagram_kind: OutputKind,
    /// Kind named by the header, also for unsupported diagrams.
    pub detected_kind: DiagramKind,
    /// Original text of an unsupported diagram, byte for byte.
    pub unsupported_source: Option<String>,
    pub direction: Option<GraphDirection>,
    pub nodes: Vec<NodeOutput>,
    pub edges: Vec<EdgeOutput>,
    pub positions: BTreeMap<String, LayoutPoint>,
    pub routed_edges: Vec<RoutedEdge>,
    pub canvas_size: LayoutSize,
    pub layers: Vec<Vec<String>>,
    pub back_edges: Vec<usize>,
    pub warnings: Vec<String>,
    pub stats: Option<LayoutStats>,
    pub trace: LayoutTrace,
}

impl DiagramOutput {
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        self.diagram_kind == OutputKind::Unsupported
    }

    #[must_use]
    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|member| member == id))
    }

    fn unsupported(kind: DiagramKind, source: String, warnings: Vec<String>) -> Self {
        Self {
            diagram_kind: OutputKind::Unsupported,
            detected_kind: kind,
            unsupported_source: Some(source),
            direction: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            positions: BTreeMap::new(),
            routed_edges: Vec::new(),
            canvas_size: LayoutSize::default(),
            layers: Vec::new(),
            back_edges: Vec::new(),
            warnings,
            stats: None,
            trace: LayoutTrace::default(),
        }
    }
}

#[must_use]
pub fn process(input: &str) -> DiagramOutput {
    process_with_config(input, &LayoutConfig::default())
}

#[must_use]
pub fn process_with_config(input: &str, config: &LayoutConfig) -> DiagramOutput {
    let parsed = sc_parser::parse(input);
    match parsed.diagram {
        Diagram::Unsupported { kind, source } => {
            debug!(kind = kind.as_str(), "unsupported diagram passed through");
            DiagramOutput::unsupported(kind, source, parsed.warnings)
        }
        Diagram::Flowchart(chart) => layout_output(&chart, parsed.warnings, config),
    }
}

fn layout_output(chart: &Flowchart, warnings: Vec<String>, config: &LayoutConfig) -> DiagramOutput {
    let traced = layout_flowchart_traced(chart, config);
    let layout = traced.layout;
    debug!(
        nodes = chart.nodes.len(),
        edges = chart.edges.len(),
        warnings = warnings.len(),
        "flowchart laid out"
    );

    let nodes = chart
        .nodes
        .iter()
        .map(|node| NodeOutput {
            id: node.id.clone(),
            label: node.display_label().to_string(),
            shape: node.shape,
            style: chart.resolved_node_style(&node.id),
        })
        .collect();

    let edges = chart
        .edges
        .iter()
        .enumerate()
        .map(|(edge_index, edge)| EdgeOutput {
            from: edge.from.clone(),
            to: edge.to.clone(),
            label: edge.label.clone(),
            style: edge.style,
            color: chart.resolved_edge_color(edge_index),
            link_style: chart.resolved_edge_style(edge_index),
        })
        .collect();

    DiagramOutput {
        diagram_kind: OutputKind::Flowchart,
        detected_kind: DiagramKind::Flowchart,
        unsupported_source: None,
        direction: Some(chart.direction),
        nodes,
        edges,
        positions: layout.positions,
        routed_edges: layout.routed_edges,
        canvas_size: layout.canvas,
        layers: layout.layers,
        back_edges: layout.back_edges,
        warnings,
        stats: Some(layout.stats),
        trace: traced.trace,
    }
}

/// One-line JSON summary of a pipeline run.
#[must_use]
pub fn evidence_json(output: &DiagramOutput) -> String {
    let stats = output.stats.unwrap_or_default();
    let mut route_kinds: BTreeMap<&str, usize> = BTreeMap::new();
    for routed in &output.routed_edges {
        *route_kinds.entry(routed.kind.as_str()).or_insert(0) += 1;
    }
    json!({
        "diagram_kind": output.diagram_kind.as_str(),
        "detected_kind": output.detected_kind.as_str(),
        "node_count": output.nodes.len(),
        "edge_count": output.edges.len(),
        "layer_count": output.layers.len(),
        "back_edge_count": output.back_edges.len(),
        "crossings_before": stats.crossings_before,
        "crossings_after": stats.crossings_after,
        "crossing_passes": stats.crossing_passes,
        "route_kinds": route_kinds,
        "detoured_edges": stats.detoured_edges,
        "unresolved_edges": stats.unresolved_edges,
        "canvas": [output.canvas_size.width, output.canvas_size.height],
        "stages": output.trace.snapshots.iter().map(|snapshot| snapshot.stage).collect::<Vec<_>>(),
        "warning_count": output.warnings.len(),
    })
    .to_string()
}
