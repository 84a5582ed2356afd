use tracing::trace;

use crate::graph::LayoutGraph;

/// Result of crossing minimization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ordering {
    pub(crate) layers: Vec<Vec<usize>>,
    pub(crate) crossings_before: usize,
    pub(crate) crossings_after: usize,
    pub(crate) passes: usize,
    pub(crate) transpose_swaps: usize,
}

/// Undirected neighbors of every node in the layer directly above and below.
struct LayerAdjacency {
    up: Vec<Vec<usize>>,
    down: Vec<Vec<usize>>,
}

impl LayerAdjacency {
    fn build(graph: &LayoutGraph<'_>, layer_of: &[usize]) -> Self {
        let node_count = graph.node_count();
        let mut up = vec![Vec::new(); node_count];
        let mut down = vec![Vec::new(); node_count];
        for (_, source, target) in graph.edges() {
            let (source_layer, target_layer) = (layer_of[source], layer_of[target]);
            if source_layer + 1 == target_layer {
                down[source].push(target);
                up[target].push(source);
            } else if target_layer + 1 == source_layer {
                down[target].push(source);
                up[source].push(target);
            }
        }
        Self { up, down }
    }
}

/// Bounded median sweeps with transpose refinement.
///
/// Each sweep reorders one layer by the median position of its neighbors in
/// the previous (forward) or next (backward) layer, then transposes adjacent
/// pairs while that strictly lowers crossings. The best ordering seen is
/// returned, so the final count never exceeds the initial one.
pub(crate) fn minimize_crossings(
    graph: &LayoutGraph<'_>,
    layers: Vec<Vec<usize>>,
    layer_of: &[usize],
    max_passes: usize,
    transpose_rounds: usize,
) -> Ordering {
    let adjacency = LayerAdjacency::build(graph, layer_of);
    let crossings_before = total_crossings(&adjacency, &layers, graph.node_count());
    let mut best = layers.clone();
    let mut best_crossings = crossings_before;
    let mut current = layers;
    let mut passes = 0_usize;
    let mut transpose_swaps = 0_usize;

    if current.len() > 1 && best_crossings > 0 {
        let mut position = positions(&current, graph.node_count());
        for pass in 0..max_passes {
            passes = pass + 1;
            let previous = current.clone();

            for layer_index in 1..current.len() {
                reorder_by_median(&mut current[layer_index], &adjacency.up, &position);
                refresh_positions(&current[layer_index], &mut position);
                transpose_swaps += transpose(
                    &mut current,
                    layer_index,
                    &adjacency,
                    &mut position,
                    transpose_rounds,
                );
            }
            for layer_index in (0..current.len() - 1).rev() {
                reorder_by_median(&mut current[layer_index], &adjacency.down, &position);
                refresh_positions(&current[layer_index], &mut position);
                transpose_swaps += transpose(
                    &mut current,
                    layer_index,
                    &adjacency,
                    &mut position,
                    transpose_rounds,
                );
            }

            let crossings = total_crossings(&adjacency, &current, graph.node_count());
            trace!(pass, crossings, "crossing minimization pass");
            if crossings < best_crossings {
                best_crossings = crossings;
                best.clone_from(&current);
            }
            if best_crossings == 0 || current == previous {
                break;
            }
        }
    }

    Ordering {
        layers: best,
        crossings_before,
        crossings_after: best_crossings,
        passes,
        transpose_swaps,
    }
}

fn positions(layers: &[Vec<usize>], node_count: usize) -> Vec<usize> {
    let mut position = vec![0_usize; node_count];
    for layer in layers {
        refresh_positions(layer, &mut position);
    }
    position
}

fn refresh_positions(layer: &[usize], position: &mut [usize]) {
    for (index, node) in layer.iter().enumerate() {
        position[*node] = index;
    }
}

fn median(values: &mut [usize]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid] as f32)
    } else {
        Some((values[mid - 1] + values[mid]) as f32 / 2.0)
    }
}

/// Stable sort by neighbor median; nodes without neighbors go last.
fn reorder_by_median(layer: &mut [usize], neighbors: &[Vec<usize>], position: &[usize]) {
    let mut scored: Vec<(Option<f32>, usize, usize)> = layer
        .iter()
        .enumerate()
        .map(|(current_index, node)| {
            let mut neighbor_positions: Vec<usize> =
                neighbors[*node].iter().map(|n| position[*n]).collect();
            (median(&mut neighbor_positions), current_index, *node)
        })
        .collect();

    scored.sort_by(|left, right| match (left.0, right.0) {
        (Some(lhs), Some(rhs)) => lhs.total_cmp(&rhs).then_with(|| left.1.cmp(&right.1)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => left.1.cmp(&right.1),
    });

    for (slot, (_, _, node)) in layer.iter_mut().zip(scored) {
        *slot = node;
    }
}

/// Crossings between `layer` and both adjacent layers.
fn local_crossings(
    layers: &[Vec<usize>],
    layer_index: usize,
    adjacency: &LayerAdjacency,
    position: &[usize],
) -> usize {
    let mut count = 0;
    if layer_index > 0 {
        count += crossings_between(&layers[layer_index - 1], &adjacency.down, position);
    }
    if layer_index + 1 < layers.len() {
        count += crossings_between(&layers[layer_index], &adjacency.down, position);
    }
    count
}

/// Swap adjacent nodes while that strictly lowers crossings with the
/// neighboring layers. Returns the number of swaps kept.
fn transpose(
    layers: &mut [Vec<usize>],
    layer_index: usize,
    adjacency: &LayerAdjacency,
    position: &mut [usize],
    max_rounds: usize,
) -> usize {
    let mut swaps = 0;
    if layers[layer_index].len() < 2 {
        return swaps;
    }
    let mut current = local_crossings(layers, layer_index, adjacency, position);

    for _ in 0..max_rounds {
        let mut improved = false;
        for i in 0..layers[layer_index].len() - 1 {
            if current == 0 {
                return swaps;
            }
            layers[layer_index].swap(i, i + 1);
            position[layers[layer_index][i]] = i;
            position[layers[layer_index][i + 1]] = i + 1;

            let trial = local_crossings(layers, layer_index, adjacency, position);
            if trial < current {
                current = trial;
                swaps += 1;
                improved = true;
            } else {
                layers[layer_index].swap(i, i + 1);
                position[layers[layer_index][i]] = i;
                position[layers[layer_index][i + 1]] = i + 1;
            }
        }
        if !improved {
            break;
        }
    }
    swaps
}

/// Inversions among the targets of edges leaving `upper` for the next layer.
fn crossings_between(upper: &[usize], down: &[Vec<usize>], position: &[usize]) -> usize {
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for node in upper {
        for target in &down[*node] {
            pairs.push((position[*node], position[*target]));
        }
    }
    pairs.sort_unstable();
    let mut targets: Vec<usize> = pairs.into_iter().map(|(_, target)| target).collect();
    count_inversions(&mut targets)
}

pub(crate) fn total_crossings_for(
    graph: &LayoutGraph<'_>,
    layers: &[Vec<usize>],
    layer_of: &[usize],
) -> usize {
    let adjacency = LayerAdjacency::build(graph, layer_of);
    total_crossings(&adjacency, layers, graph.node_count())
}

fn total_crossings(adjacency: &LayerAdjacency, layers: &[Vec<usize>], node_count: usize) -> usize {
    let position = positions(layers, node_count);
    layers
        .iter()
        .take(layers.len().saturating_sub(1))
        .map(|layer| crossings_between(layer, &adjacency.down, &position))
        .sum()
}

fn count_inversions(values: &mut [usize]) -> usize {
    if values.len() <= 1 {
        return 0;
    }

    let mid = values.len() / 2;
    let mut inversions = count_inversions(&mut values[..mid]) + count_inversions(&mut values[mid..]);

    let mut merged = Vec::with_capacity(values.len());
    let (left, right) = values.split_at(mid);
    let (mut left_idx, mut right_idx) = (0_usize, 0_usize);
    while left_idx < left.len() && right_idx < right.len() {
        if left[left_idx] <= right[right_idx] {
            merged.push(left[left_idx]);
            left_idx += 1;
        } else {
            merged.push(right[right_idx]);
            inversions += left.len() - left_idx;
            right_idx += 1;
        }
    }
    merged.extend_from_slice(&left[left_idx..]);
    merged.extend_from_slice(&right[right_idx..]);
    values.copy_from_slice(&merged);
    inversions
}

#[cfg(test)]
mod tests {
    use sc_core::{Edge, Flowchart, GraphDirection, Node};

    use super::{count_inversions, median, minimize_crossings, total_crossings_for};
    use crate::cycles::find_back_edges;
    use crate::graph::LayoutGraph;
    use crate::layering::assign_layers;

    fn chart(ids: &[&str], edges: &[(&str, &str)]) -> Flowchart {
        let mut chart = Flowchart::new(GraphDirection::TopDown);
        chart.nodes = ids.iter().map(|id| Node::new(*id)).collect();
        chart.edges = edges.iter().map(|(from, to)| Edge::new(*from, *to)).collect();
        chart
    }

    #[test]
    fn inversions_match_brute_force() {
        let values = [3_usize, 1, 2, 5, 4, 0, 2];
        let mut brute = 0;
        for i in 0..values.len() {
            for j in i + 1..values.len() {
                if values[i] > values[j] {
                    brute += 1;
                }
            }
        }
        let mut sorted = values;
        assert_eq!(count_inversions(&mut sorted), brute);
        assert!(sorted.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn median_uses_middle_values() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [4, 0, 9]), Some(4.0));
        assert_eq!(median(&mut [1, 0, 3, 6]), Some(2.0));
    }

    #[test]
    fn crossed_pairs_are_untangled() {
        // Id order puts a/b and x/y so both edges cross.
        let chart = chart(&["a", "b", "x", "y"], &[("a", "y"), ("b", "x")]);
        let graph = LayoutGraph::from_flowchart(&chart);
        let layering = assign_layers(&graph, &find_back_edges(&graph));
        let ordering = minimize_crossings(&graph, layering.layers, &layering.layer_of, 8, 10);
        assert_eq!(ordering.crossings_before, 1);
        assert_eq!(ordering.crossings_after, 0);
        assert!(ordering.passes >= 1);
    }

    #[test]
    fn complete_bipartite_keeps_its_unavoidable_crossing() {
        let chart = chart(&["A", "B", "C", "D"], &[("A", "C"), ("A", "D"), ("B", "C"), ("B", "D")]);
        let graph = LayoutGraph::from_flowchart(&chart);
        let layering = assign_layers(&graph, &find_back_edges(&graph));
        let ordering = minimize_crossings(&graph, layering.layers, &layering.layer_of, 8, 10);
        assert_eq!(ordering.crossings_after, 1);
        assert_eq!(
            total_crossings_for(&graph, &ordering.layers, &layering.layer_of),
            ordering.crossings_after
        );
    }

    #[test]
    fn layer_membership_is_preserved() {
        let chart = chart(
            &["r", "a", "b", "c", "x", "y", "z"],
            &[("r", "a"), ("r", "b"), ("r", "c"), ("a", "z"), ("b", "y"), ("c", "x"), ("a", "x")],
        );
        let graph = LayoutGraph::from_flowchart(&chart);
        let layering = assign_layers(&graph, &find_back_edges(&graph));
        let ordering =
            minimize_crossings(&graph, layering.layers.clone(), &layering.layer_of, 8, 10);
        for (before, after) in layering.layers.iter().zip(&ordering.layers) {
            let mut before = before.clone();
            let mut after = after.clone();
            before.sort_unstable();
            after.sort_unstable();
            assert_eq!(before, after);
        }
        assert!(ordering.crossings_after <= ordering.crossings_before);
    }
}
