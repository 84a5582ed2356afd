use std::collections::BTreeSet;

use crate::graph::LayoutGraph;

/// Edges left out of layering so the rest of the graph is acyclic.
///
/// Keys are `(source, target)` node index pairs; every edge with a key in
/// `keys` is excluded, which is what `edge_indexes` lists. Excluded edges
/// are still routed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackEdges {
    pub keys: BTreeSet<(usize, usize)>,
    pub edge_indexes: BTreeSet<usize>,
}

impl BackEdges {
    #[must_use]
    pub fn contains_edge(&self, edge_index: usize) -> bool {
        self.edge_indexes.contains(&edge_index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edge_indexes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edge_indexes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    OnStack,
    Done,
}

/// Depth-first back-edge detection with an explicit stack.
///
/// Roots are tried in declaration order and outgoing edges in declaration
/// order, so the result depends only on the input. Self-loops always count
/// as back-edges.
pub(crate) fn find_back_edges(graph: &LayoutGraph<'_>) -> BackEdges {
    let node_count = graph.node_count();
    let mut state = vec![VisitState::Unvisited; node_count];
    let mut keys = BTreeSet::new();
    // (node, next outgoing slot)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..node_count {
        if state[root] != VisitState::Unvisited {
            continue;
        }
        state[root] = VisitState::OnStack;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, slot) = *frame;
            let Some(edge_index) = graph.outgoing[node].get(slot).copied() else {
                state[node] = VisitState::Done;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            let Some((_, target)) = graph.endpoints[edge_index] else {
                continue;
            };
            match state[target] {
                VisitState::Unvisited => {
                    state[target] = VisitState::OnStack;
                    stack.push((target, 0));
                }
                VisitState::OnStack => {
                    keys.insert((node, target));
                }
                VisitState::Done => {}
            }
        }
    }

    let edge_indexes = graph
        .edges()
        .filter(|(_, source, target)| keys.contains(&(*source, *target)))
        .map(|(edge_index, _, _)| edge_index)
        .collect();

    BackEdges { keys, edge_indexes }
}

#[cfg(test)]
mod tests {
    use sc_core::{Edge, Flowchart, GraphDirection, Node};

    use super::find_back_edges;
    use crate::graph::LayoutGraph;

    fn chart(ids: &[&str], edges: &[(&str, &str)]) -> Flowchart {
        let mut chart = Flowchart::new(GraphDirection::TopDown);
        chart.nodes = ids.iter().map(|id| Node::new(*id)).collect();
        chart.edges = edges.iter().map(|(from, to)| Edge::new(*from, *to)).collect();
        chart
    }

    #[test]
    fn acyclic_graph_has_no_back_edges() {
        let chart = chart(&["A", "B", "C", "D"], &[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")]);
        let back = find_back_edges(&LayoutGraph::from_flowchart(&chart));
        assert!(back.is_empty());
    }

    #[test]
    fn closing_edge_of_a_cycle_is_the_back_edge() {
        let chart = chart(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("B", "A")]);
        let back = find_back_edges(&LayoutGraph::from_flowchart(&chart));
        assert_eq!(back.edge_indexes.into_iter().collect::<Vec<_>>(), vec![2]);
        assert!(back.keys.contains(&(1, 0)));
    }

    #[test]
    fn self_loop_is_a_back_edge() {
        let chart = chart(&["A", "B"], &[("A", "A"), ("A", "B")]);
        let back = find_back_edges(&LayoutGraph::from_flowchart(&chart));
        assert!(back.contains_edge(0));
        assert!(!back.contains_edge(1));
    }

    #[test]
    fn parallel_copies_of_a_back_edge_share_its_key() {
        let chart = chart(&["A", "B"], &[("A", "B"), ("B", "A"), ("B", "A")]);
        let back = find_back_edges(&LayoutGraph::from_flowchart(&chart));
        assert_eq!(back.len(), 2);
        assert_eq!(back.keys.len(), 1);
    }

    #[test]
    fn long_chain_does_not_overflow_the_stack() {
        let ids: Vec<String> = (0..50_000).map(|i| format!("n{i}")).collect();
        let mut chart = Flowchart::new(GraphDirection::TopDown);
        chart.nodes = ids.iter().map(|id| Node::new(id.as_str())).collect();
        chart.edges = ids.windows(2).map(|pair| Edge::new(pair[0].as_str(), pair[1].as_str())).collect();
        chart.edges.push(Edge::new("n49999", "n0"));

        let back = find_back_edges(&LayoutGraph::from_flowchart(&chart));
        assert_eq!(back.len(), 1);
        assert!(back.contains_edge(chart.edges.len() - 1));
    }
}
