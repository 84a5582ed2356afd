use std::collections::BTreeMap;

use sc_core::{Edge, EdgeStyle, Flowchart, GraphDirection, Node, NodeShape, Style};

/// Accumulates one flowchart while its statements are lowered.
pub(crate) struct FlowchartBuilder {
    chart: Flowchart,
    node_index_by_id: BTreeMap<String, usize>,
    warnings: Vec<String>,
}

impl FlowchartBuilder {
    pub(crate) fn new(direction: GraphDirection) -> Self {
        Self {
            chart: Flowchart::new(direction),
            node_index_by_id: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub(crate) fn node_count(&self) -> usize {
        self.chart.nodes.len()
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.chart.edges.len()
    }

    pub(crate) fn finish(mut self) -> (Flowchart, Vec<String>) {
        let edge_count = self.chart.edges.len();
        let dangling: Vec<usize> = self
            .chart
            .link_styles
            .keys()
            .copied()
            .filter(|index| *index >= edge_count)
            .collect();
        for index in dangling {
            self.warnings.push(format!(
                "linkStyle {index} refers to a missing edge ({edge_count} edges declared)"
            ));
        }
        (self.chart, self.warnings)
    }

    /// Register `id` once. A later mention may fill in a missing label or
    /// upgrade a plain rectangle to a more specific shape; nothing else changes.
    pub(crate) fn intern_node(
        &mut self,
        id: &str,
        label: Option<&str>,
        shape: NodeShape,
    ) -> Option<usize> {
        let normalized_id = id.trim();
        if normalized_id.is_empty() {
            self.add_warning("Encountered empty node identifier; skipped node");
            return None;
        }

        if let Some(existing) = self.node_index_by_id.get(normalized_id).copied() {
            if let Some(node) = self.chart.nodes.get_mut(existing) {
                if node.label.is_none() {
                    node.label = clean_label(label);
                }
                if node.shape == NodeShape::Rectangle && shape != NodeShape::Rectangle {
                    node.shape = shape;
                }
            }
            return Some(existing);
        }

        let index = self.chart.nodes.len();
        self.chart.nodes.push(Node {
            id: normalized_id.to_string(),
            label: clean_label(label),
            shape,
            classes: Vec::new(),
        });
        self.node_index_by_id
            .insert(normalized_id.to_string(), index);
        Some(index)
    }

    pub(crate) fn push_edge(
        &mut self,
        from: usize,
        to: usize,
        style: EdgeStyle,
        label: Option<&str>,
        color: Option<&str>,
    ) {
        let (Some(from_node), Some(to_node)) = (self.chart.nodes.get(from), self.chart.nodes.get(to))
        else {
            return;
        };
        let edge = Edge {
            from: from_node.id.clone(),
            to: to_node.id.clone(),
            label: clean_label(label),
            style,
            color: clean_label(color),
        };
        self.chart.edges.push(edge);
    }

    /// Attach `class` to an existing node. Returns false if the node is unknown.
    pub(crate) fn add_class_to_node(&mut self, id: &str, class: &str) -> bool {
        let Some(index) = self.node_index_by_id.get(id.trim()).copied() else {
            return false;
        };
        let Some(node) = self.chart.nodes.get_mut(index) else {
            return false;
        };
        let class = class.trim();
        if !class.is_empty() && !node.classes.iter().any(|existing| existing == class) {
            node.classes.push(class.to_string());
        }
        true
    }

    pub(crate) fn set_node_style(&mut self, id: &str, style: &Style) {
        self.chart
            .node_styles
            .entry(id.trim().to_string())
            .or_default()
            .merge_from(style);
    }

    pub(crate) fn set_link_style(&mut self, edge_index: usize, style: &Style) {
        self.chart
            .link_styles
            .entry(edge_index)
            .or_default()
            .merge_from(style);
    }

    pub(crate) fn set_default_link_style(&mut self, style: &Style) {
        self.chart
            .default_link_style
            .get_or_insert_with(Style::default)
            .merge_from(style);
    }

    pub(crate) fn define_class(&mut self, name: &str, style: &Style) {
        self.chart
            .class_defs
            .entry(name.trim().to_string())
            .or_default()
            .merge_from(style);
    }
}

fn clean_label(input: Option<&str>) -> Option<String> {
    let raw = input?;
    let cleaned = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim_matches('`')
        .trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
