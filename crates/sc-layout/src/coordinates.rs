use sc_core::GraphDirection;

use crate::complexity::SpacingParams;
use crate::config::LayoutConfig;
use crate::graph::LayoutGraph;
use crate::{LayoutPoint, LayoutSize};

/// Node centers indexed like `Flowchart::nodes`, in canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Coordinates {
    pub(crate) centers: Vec<LayoutPoint>,
    pub(crate) canvas: LayoutSize,
}

/// Turn ordered layers into centers.
///
/// Layers sit at evenly spaced positions along the primary axis (y for
/// TD/BT, x for LR/RL, reversed for BT/RL). Across a layer every node aims
/// for the median of its neighbors: parents on the way down, then all
/// neighbors on the way back up. The minimizer's order is kept; crowded
/// nodes are pushed towards the end of the layer and the layer is shifted
/// back by the mean drift. The result is centered horizontally on a canvas
/// at least `config.target_width` wide.
pub(crate) fn assign_coordinates(
    graph: &LayoutGraph<'_>,
    layers: &[Vec<usize>],
    layer_of: &[usize],
    direction: GraphDirection,
    spacing: &SpacingParams,
    config: &LayoutConfig,
) -> Coordinates {
    let horizontal = direction.is_horizontal();
    let (cross_extent, primary_extent) = if horizontal {
        (spacing.node_height, spacing.node_width)
    } else {
        (spacing.node_width, spacing.node_height)
    };
    let min_gap = cross_extent + spacing.node_spacing;
    let neighbors = neighbor_lists(graph);
    let mut cross = vec![0.0_f32; graph.node_count()];

    for layer in layers {
        let ideal: Vec<f32> = layer
            .iter()
            .enumerate()
            .map(|(order, node)| {
                let anchors = neighbors[*node]
                    .iter()
                    .filter(|other| layer_of[**other] < layer_of[*node])
                    .map(|other| cross[*other])
                    .collect();
                median_of(anchors).unwrap_or_else(|| centered_slot(order, layer.len(), min_gap))
            })
            .collect();
        place_layer(layer, &ideal, min_gap, &mut cross);
    }

    for layer in layers.iter().rev() {
        let ideal: Vec<f32> = layer
            .iter()
            .map(|node| {
                let anchors = neighbors[*node]
                    .iter()
                    .filter(|other| layer_of[**other] != layer_of[*node])
                    .map(|other| cross[*other])
                    .collect();
                median_of(anchors).unwrap_or(cross[*node])
            })
            .collect();
        place_layer(layer, &ideal, min_gap, &mut cross);
    }

    let layer_count = layers.len();
    let step = primary_extent + spacing.layer_spacing;
    let mut centers: Vec<LayoutPoint> = cross
        .iter()
        .enumerate()
        .map(|(node, across)| {
            let layer = layer_of[node];
            let rank = if direction.is_reversed() {
                layer_count.saturating_sub(1) - layer
            } else {
                layer
            };
            let along = rank as f32 * step;
            if horizontal {
                LayoutPoint::new(along, *across)
            } else {
                LayoutPoint::new(*across, along)
            }
        })
        .collect();

    let canvas = recenter(&mut centers, spacing, config);
    Coordinates { centers, canvas }
}

/// Undirected neighbor lists without self-loops.
fn neighbor_lists(graph: &LayoutGraph<'_>) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); graph.node_count()];
    for (_, source, target) in graph.edges() {
        if source != target {
            neighbors[source].push(target);
            neighbors[target].push(source);
        }
    }
    neighbors
}

fn centered_slot(order: usize, len: usize, min_gap: f32) -> f32 {
    (order as f32 - (len.saturating_sub(1)) as f32 / 2.0) * min_gap
}

fn median_of(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Place one layer in its given order; nodes are not re-sorted by ideal
/// position, so the crossing count from the minimizer is preserved.
fn place_layer(layer: &[usize], ideal: &[f32], min_gap: f32, cross: &mut [f32]) {
    let mut placed: Vec<f32> = Vec::with_capacity(layer.len());
    for target in ideal.iter().copied() {
        let position = match placed.last() {
            Some(previous) => target.max(*previous + min_gap),
            None => target,
        };
        placed.push(position);
    }

    // The cascade only pushes one way; pull the layer back by the mean drift.
    let drift = if placed.is_empty() {
        0.0
    } else {
        ideal
            .iter()
            .zip(&placed)
            .map(|(target, position)| target - position)
            .sum::<f32>()
            / placed.len() as f32
    };
    for (node, position) in layer.iter().zip(placed) {
        cross[*node] = position + drift;
    }
}

fn recenter(centers: &mut [LayoutPoint], spacing: &SpacingParams, config: &LayoutConfig) -> LayoutSize {
    if centers.is_empty() {
        return LayoutSize {
            width: config.target_width,
            height: 2.0 * config.margin,
        };
    }

    let half_width = spacing.node_width / 2.0;
    let half_height = spacing.node_height / 2.0;
    let (mut min_x, mut max_x) = (f32::MAX, f32::MIN);
    let (mut min_y, mut max_y) = (f32::MAX, f32::MIN);
    for center in centers.iter() {
        min_x = min_x.min(center.x - half_width);
        max_x = max_x.max(center.x + half_width);
        min_y = min_y.min(center.y - half_height);
        max_y = max_y.max(center.y + half_height);
    }

    let content_width = max_x - min_x;
    let content_height = max_y - min_y;
    let width = (content_width + 2.0 * config.margin).max(config.target_width);
    let height = content_height + 2.0 * config.margin;
    let shift_x = (width - content_width) / 2.0 - min_x;
    let shift_y = config.margin - min_y;
    for center in centers.iter_mut() {
        center.x += shift_x;
        center.y += shift_y;
    }

    LayoutSize { width, height }
}
