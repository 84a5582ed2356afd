#![forbid(unsafe_code)]

//! Diagram model for StreamChart.
//!
//! Everything here is plain data produced by `sc-parser` and consumed by
//! `sc-layout`. Styling lives in side tables keyed by node id or edge index so
//! that layout never has to look at it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    Class,
    State,
    Er,
    Gantt,
    Pie,
    Journey,
    Mindmap,
    Timeline,
    QuadrantChart,
    Requirement,
    GitGraph,
    XyChart,
    #[default]
    Unknown,
}

impl DiagramKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequence",
            Self::Class => "class",
            Self::State => "state",
            Self::Er => "er",
            Self::Gantt => "gantt",
            Self::Pie => "pie",
            Self::Journey => "journey",
            Self::Mindmap => "mindmap",
            Self::Timeline => "timeline",
            Self::QuadrantChart => "quadrantChart",
            Self::Requirement => "requirementDiagram",
            Self::GitGraph => "gitGraph",
            Self::XyChart => "xyChart",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GraphDirection {
    #[default]
    TopDown,
    BottomToTop,
    LeftToRight,
    RightToLeft,
}

impl GraphDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopDown => "TD",
            Self::BottomToTop => "BT",
            Self::LeftToRight => "LR",
            Self::RightToLeft => "RL",
        }
    }

    /// Map a header token (`TD`, `TB`, `BT`, `LR`, `RL`) to a direction.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TD" | "TB" => Some(Self::TopDown),
            "BT" => Some(Self::BottomToTop),
            "LR" => Some(Self::LeftToRight),
            "RL" => Some(Self::RightToLeft),
            _ => None,
        }
    }

    /// True when layers advance along the x axis.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftToRight | Self::RightToLeft)
    }

    /// True when layer 0 sits at the far end of the layer axis.
    #[must_use]
    pub const fn is_reversed(self) -> bool {
        matches!(self, Self::BottomToTop | Self::RightToLeft)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum NodeShape {
    #[default]
    Rectangle,
    RoundedRect,
    Stadium,
    Subroutine,
    Cylinder,
    Circle,
    Rhombus,
    Hexagon,
    Parallelogram,
    Trapezoid,
    Asymmetric,
}

impl NodeShape {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::RoundedRect => "roundedRect",
            Self::Stadium => "stadium",
            Self::Subroutine => "subroutine",
            Self::Cylinder => "cylinder",
            Self::Circle => "circle",
            Self::Rhombus => "rhombus",
            Self::Hexagon => "hexagon",
            Self::Parallelogram => "parallelogram",
            Self::Trapezoid => "trapezoid",
            Self::Asymmetric => "asymmetric",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dotted,
    Thick,
}

impl EdgeStyle {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Dotted => "dotted",
            Self::Thick => "thick",
        }
    }
}

/// Visual properties from `style`, `linkStyle` and `classDef` directives.
///
/// Known properties get their own field; anything else is kept verbatim in
/// `extra` so a renderer can still use it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Style {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Style {
    /// Parse a `prop:value,prop:value` declaration list.
    ///
    /// Commas inside parentheses (`rgb(1,2,3)`) do not split declarations.
    /// Entries without a colon or with an empty name are ignored.
    #[must_use]
    pub fn parse_declarations(input: &str) -> Self {
        let mut style = Self::default();
        for declaration in split_declarations(input) {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim().trim_end_matches(';').trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }
            style.set(name, value);
        }
        style
    }

    pub fn set(&mut self, name: &str, value: &str) {
        let value = value.to_string();
        match name {
            "fill" => self.fill = Some(value),
            "stroke" => self.stroke = Some(value),
            "stroke-width" => self.stroke_width = Some(value),
            "color" => self.text_color = Some(value),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Overlay `other` on top of `self`; properties set in `other` win.
    pub fn merge_from(&mut self, other: &Self) {
        if other.fill.is_some() {
            self.fill.clone_from(&other.fill);
        }
        if other.stroke.is_some() {
            self.stroke.clone_from(&other.stroke);
        }
        if other.stroke_width.is_some() {
            self.stroke_width.clone_from(&other.stroke_width);
        }
        if other.text_color.is_some() {
            self.text_color.clone_from(&other.text_color);
        }
        for (name, value) in &other.extra {
            self.extra.insert(name.clone(), value.clone());
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fill.is_none()
            && self.stroke.is_none()
            && self.stroke_width.is_none()
            && self.text_color.is_none()
            && self.extra.is_empty()
    }
}

fn split_declarations(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (index, ch) in input.char_indices() {
        match ch {
            '(' => depth = depth.saturating_add(1),
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Node {
    pub id: String,
    pub label: Option<String>,
    pub shape: NodeShape,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
}

impl Node {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// The text a renderer should draw: the label, or the id for bare nodes.
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub style: EdgeStyle,
    /// Color from a trailing `:::name` on the edge statement.
    pub color: Option<String>,
}

impl Edge {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Flowchart {
    pub direction: GraphDirection,
    /// Declaration order.
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub node_styles: BTreeMap<String, Style>,
    pub link_styles: BTreeMap<usize, Style>,
    pub default_link_style: Option<Style>,
    pub class_defs: BTreeMap<String, Style>,
}

impl Flowchart {
    #[must_use]
    pub fn new(direction: GraphDirection) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn find_node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Class styles in the order the classes were attached, then the node's
    /// own `style` entry on top.
    #[must_use]
    pub fn resolved_node_style(&self, id: &str) -> Style {
        let mut resolved = Style::default();
        if let Some(node) = self.node(id) {
            for class in &node.classes {
                if let Some(class_style) = self.class_defs.get(class) {
                    resolved.merge_from(class_style);
                }
            }
        }
        if let Some(own) = self.node_styles.get(id) {
            resolved.merge_from(own);
        }
        resolved
    }

    #[must_use]
    pub fn resolved_edge_style(&self, edge_index: usize) -> Style {
        let mut resolved = self.default_link_style.clone().unwrap_or_default();
        if let Some(own) = self.link_styles.get(&edge_index) {
            resolved.merge_from(own);
        }
        resolved
    }

    /// `:::color` override first, then the edge's stroke from `linkStyle`.
    #[must_use]
    pub fn resolved_edge_color(&self, edge_index: usize) -> Option<String> {
        let edge = self.edges.get(edge_index)?;
        edge.color
            .clone()
            .or_else(|| self.resolved_edge_style(edge_index).stroke)
    }
}

/// A parsed diagram.
///
/// Only flowcharts are modelled; every other kind keeps the raw text so a
/// caller can display it literally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Diagram {
    Flowchart(Flowchart),
    Unsupported { kind: DiagramKind, source: String },
}

impl Diagram {
    #[must_use]
    pub fn kind(&self) -> DiagramKind {
        match self {
            Self::Flowchart(_) => DiagramKind::Flowchart,
            Self::Unsupported { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub fn as_flowchart(&self) -> Option<&Flowchart> {
        match self {
            Self::Flowchart(flowchart) => Some(flowchart),
            Self::Unsupported { .. } => None,
        }
    }

    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{Diagram, DiagramKind, Edge, Flowchart, GraphDirection, Node, Style};

    #[test]
    fn direction_tokens_map_tb_to_top_down() {
        assert_eq!(GraphDirection::from_token("TB"), Some(GraphDirection::TopDown));
        assert_eq!(GraphDirection::from_token("TD"), Some(GraphDirection::TopDown));
        assert_eq!(GraphDirection::from_token("RL"), Some(GraphDirection::RightToLeft));
        assert_eq!(GraphDirection::from_token("lr"), None);
        assert!(GraphDirection::RightToLeft.is_horizontal());
        assert!(GraphDirection::BottomToTop.is_reversed());
        assert!(!GraphDirection::TopDown.is_reversed());
    }

    #[test]
    fn style_declarations_split_known_and_extra_properties() {
        let style = Style::parse_declarations("fill:#ff0000, stroke:#000,stroke-width:2px,color:#fff,font-size:12px");
        assert_eq!(style.fill.as_deref(), Some("#ff0000"));
        assert_eq!(style.stroke.as_deref(), Some("#000"));
        assert_eq!(style.stroke_width.as_deref(), Some("2px"));
        assert_eq!(style.text_color.as_deref(), Some("#fff"));
        assert_eq!(style.extra.get("font-size").map(String::as_str), Some("12px"));
    }

    #[test]
    fn style_declarations_keep_commas_inside_parentheses() {
        let style = Style::parse_declarations("fill:rgb(1,2,3),stroke:#000");
        assert_eq!(style.fill.as_deref(), Some("rgb(1,2,3)"));
        assert_eq!(style.stroke.as_deref(), Some("#000"));
    }

    #[test]
    fn style_declarations_ignore_garbage() {
        let style = Style::parse_declarations("nonsense,:x,fill:");
        assert!(style.is_empty());
    }

    #[test]
    fn node_style_overlays_class_styles() {
        let mut chart = Flowchart::new(GraphDirection::TopDown);
        let mut node = Node::new("A");
        node.classes.push("hot".to_string());
        chart.nodes.push(node);
        chart
            .class_defs
            .insert("hot".to_string(), Style::parse_declarations("fill:#f00,stroke:#111"));
        chart
            .node_styles
            .insert("A".to_string(), Style::parse_declarations("fill:#0f0"));

        let resolved = chart.resolved_node_style("A");
        assert_eq!(resolved.fill.as_deref(), Some("#0f0"));
        assert_eq!(resolved.stroke.as_deref(), Some("#111"));
    }

    #[test]
    fn edge_color_prefers_inline_override() {
        let mut chart = Flowchart::new(GraphDirection::TopDown);
        chart.edges.push(Edge::new("A", "B"));
        let mut colored = Edge::new("B", "C");
        colored.color = Some("blue".to_string());
        chart.edges.push(colored);
        chart.default_link_style = Some(Style::parse_declarations("stroke:#999"));
        chart
            .link_styles
            .insert(1, Style::parse_declarations("stroke:#f00"));

        assert_eq!(chart.resolved_edge_color(0).as_deref(), Some("#999"));
        assert_eq!(chart.resolved_edge_color(1).as_deref(), Some("blue"));
        assert_eq!(chart.resolved_edge_color(7), None);
    }

    #[test]
    fn display_label_falls_back_to_id() {
        let mut node = Node::new("raw");
        assert_eq!(node.display_label(), "raw");
        node.label = Some("Pretty".to_string());
        assert_eq!(node.display_label(), "Pretty");
    }

    #[test]
    fn unsupported_diagram_serializes_raw_source() {
        let diagram = Diagram::Unsupported {
            kind: DiagramKind::Pie,
            source: "pie title Test".to_string(),
        };
        assert_eq!(diagram.kind(), DiagramKind::Pie);
        assert!(diagram.as_flowchart().is_none());
        let json = serde_json::to_value(&diagram).unwrap();
        assert_eq!(json["unsupported"]["source"], "pie title Test");
    }
}
