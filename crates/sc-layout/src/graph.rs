use rustc_hash::FxHashMap;
use sc_core::Flowchart;

/// Index-based view of a flowchart: nodes are positions in `Flowchart::nodes`,
/// edges keep their declaration index.
#[derive(Debug, Clone)]
pub(crate) struct LayoutGraph<'c> {
    pub(crate) node_ids: Vec<&'c str>,
    /// `(source, target)` per edge index; `None` when an endpoint is unknown.
    pub(crate) endpoints: Vec<Option<(usize, usize)>>,
    /// Outgoing edge indexes per node, in declaration order.
    pub(crate) outgoing: Vec<Vec<usize>>,
}

impl<'c> LayoutGraph<'c> {
    pub(crate) fn from_flowchart(chart: &'c Flowchart) -> Self {
        let node_ids: Vec<&str> = chart.nodes.iter().map(|node| node.id.as_str()).collect();
        let mut index_by_id: FxHashMap<&str, usize> = FxHashMap::default();
        for (index, id) in node_ids.iter().copied().enumerate() {
            index_by_id.entry(id).or_insert(index);
        }

        let mut outgoing = vec![Vec::new(); node_ids.len()];
        let endpoints = chart
            .edges
            .iter()
            .enumerate()
            .map(|(edge_index, edge)| {
                let source = index_by_id.get(edge.from.as_str()).copied()?;
                let target = index_by_id.get(edge.to.as_str()).copied()?;
                outgoing[source].push(edge_index);
                Some((source, target))
            })
            .collect();

        Self {
            node_ids,
            endpoints,
            outgoing,
        }
    }

    pub(crate) fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Resolved edges as `(edge_index, source, target)`.
    pub(crate) fn edges(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.endpoints
            .iter()
            .enumerate()
            .filter_map(|(index, endpoints)| endpoints.map(|(s, t)| (index, s, t)))
    }

    /// Node indexes sorted by id, ties by declaration order.
    pub(crate) fn sort_by_id(&self, nodes: &mut [usize]) {
        nodes.sort_by(|left, right| {
            self.node_ids[*left]
                .cmp(self.node_ids[*right])
                .then_with(|| left.cmp(right))
        });
    }
}
