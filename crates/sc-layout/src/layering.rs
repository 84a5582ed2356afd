use crate::cycles::BackEdges;
use crate::graph::LayoutGraph;

/// Layers as node indexes, plus the layer of every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layering {
    pub(crate) layers: Vec<Vec<usize>>,
    pub(crate) layer_of: Vec<usize>,
    /// True when no node had in-degree zero and one had to be forced.
    pub(crate) seeded: bool,
}

/// Kahn-style frontier layering over the non-back edges.
///
/// Every frontier is sorted by id. Nodes never reached end up in one extra
/// trailing layer, also sorted by id.
pub(crate) fn assign_layers(graph: &LayoutGraph<'_>, back_edges: &BackEdges) -> Layering {
    let node_count = graph.node_count();
    let mut in_degree = vec![0_usize; node_count];
    for (edge_index, _, target) in graph.edges() {
        if !back_edges.contains_edge(edge_index) {
            in_degree[target] += 1;
        }
    }

    let mut placed = vec![false; node_count];
    let mut frontier: Vec<usize> = (0..node_count).filter(|node| in_degree[*node] == 0).collect();
    let mut seeded = false;
    if frontier.is_empty() && node_count > 0 {
        let mut all: Vec<usize> = (0..node_count).collect();
        graph.sort_by_id(&mut all);
        frontier.push(all[0]);
        seeded = true;
    }

    let mut layers: Vec<Vec<usize>> = Vec::new();
    while !frontier.is_empty() {
        graph.sort_by_id(&mut frontier);
        for node in &frontier {
            placed[*node] = true;
        }

        let mut next = Vec::new();
        for node in &frontier {
            for edge_index in graph.outgoing[*node].iter().copied() {
                if back_edges.contains_edge(edge_index) {
                    continue;
                }
                let Some((_, target)) = graph.endpoints[edge_index] else {
                    continue;
                };
                if placed[target] {
                    continue;
                }
                in_degree[target] = in_degree[target].saturating_sub(1);
                if in_degree[target] == 0 {
                    next.push(target);
                }
            }
        }
        layers.push(std::mem::replace(&mut frontier, next));
    }

    let mut residue: Vec<usize> = (0..node_count).filter(|node| !placed[*node]).collect();
    if !residue.is_empty() {
        graph.sort_by_id(&mut residue);
        layers.push(residue);
    }

    let mut layer_of = vec![0_usize; node_count];
    for (layer_index, layer) in layers.iter().enumerate() {
        for node in layer {
            layer_of[*node] = layer_index;
        }
    }

    Layering {
        layers,
        layer_of,
        seeded,
    }
}
