use std::collections::BTreeMap;

use proptest::prelude::*;
use sc_core::{Diagram, Edge, Flowchart, GraphDirection, Node};
use sc_layout::{FlowchartLayout, LayoutPoint, RouteKind, layout_flowchart};

fn direction_strategy() -> impl Strategy<Value = GraphDirection> {
    prop_oneof![
        Just(GraphDirection::TopDown),
        Just(GraphDirection::BottomToTop),
        Just(GraphDirection::LeftToRight),
        Just(GraphDirection::RightToLeft),
    ]
}

fn chart_strategy() -> impl Strategy<Value = Flowchart> {
    (1_usize..14, direction_strategy()).prop_flat_map(|(node_count, direction)| {
        prop::collection::vec((0..node_count, 0..node_count), 0..(node_count * 2 + 1)).prop_map(
            move |pairs| {
                let mut chart = Flowchart::new(direction);
                chart.nodes = (0..node_count).map(|i| Node::new(format!("n{i}"))).collect();
                chart.edges = pairs
                    .into_iter()
                    .map(|(from, to)| Edge::new(format!("n{from}"), format!("n{to}")))
                    .collect();
                chart
            },
        )
    })
}

fn cross_axis(layout: &FlowchartLayout, point: LayoutPoint) -> f32 {
    if layout.direction.is_horizontal() {
        point.y
    } else {
        point.x
    }
}

fn polyline_hits(points: &[LayoutPoint], rect: &sc_layout::LayoutRect) -> bool {
    points.windows(2).any(|segment| {
        (0..=64).any(|step| {
            let t = step as f32 / 64.0;
            let probe = LayoutPoint::new(
                segment[0].x + (segment[1].x - segment[0].x) * t,
                segment[0].y + (segment[1].y - segment[0].y) * t,
            );
            let inner = sc_layout::LayoutRect {
                x: rect.x + 0.01,
                y: rect.y + 0.01,
                width: rect.width - 0.02,
                height: rect.height - 0.02,
            };
            inner.contains(probe)
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn every_node_lands_in_exactly_one_layer(chart in chart_strategy()) {
        let layout = layout_flowchart(&chart);
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for id in layout.layers.iter().flatten() {
            *seen.entry(id.as_str()).or_insert(0) += 1;
        }
        prop_assert_eq!(seen.len(), chart.nodes.len());
        prop_assert!(seen.values().all(|count| *count == 1));
    }

    #[test]
    fn forward_edges_point_to_later_layers(chart in chart_strategy()) {
        let layout = layout_flowchart(&chart);
        for (edge_index, edge) in chart.edges.iter().enumerate() {
            if layout.is_back_edge(edge_index) {
                continue;
            }
            let from = layout.layer_of(&edge.from);
            let to = layout.layer_of(&edge.to);
            prop_assert!(from < to, "edge {} {:?} -> {:?}", edge_index, from, to);
        }
    }

    #[test]
    fn same_layer_neighbors_keep_minimum_spacing(chart in chart_strategy()) {
        let layout = layout_flowchart(&chart);
        let extent = if layout.direction.is_horizontal() {
            layout.spacing.node_height
        } else {
            layout.spacing.node_width
        };
        let min_gap = extent + layout.spacing.node_spacing;
        for layer in &layout.layers {
            for pair in layer.windows(2) {
                let a = cross_axis(&layout, layout.positions[&pair[0]]);
                let b = cross_axis(&layout, layout.positions[&pair[1]]);
                prop_assert!((b - a).abs() >= min_gap - 0.01, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn minimization_never_adds_crossings(chart in chart_strategy()) {
        let layout = layout_flowchart(&chart);
        prop_assert!(layout.stats.crossings_after <= layout.stats.crossings_before);
    }

    #[test]
    fn layout_is_deterministic(chart in chart_strategy()) {
        let first = layout_flowchart(&chart);
        let second = layout_flowchart(&chart);
        prop_assert_eq!(&first.positions, &second.positions);
        prop_assert_eq!(&first.routed_edges, &second.routed_edges);
    }

    #[test]
    fn clear_paths_avoid_third_nodes(chart in chart_strategy()) {
        let layout = layout_flowchart(&chart);
        for routed in &layout.routed_edges {
            if !routed.clear {
                continue;
            }
            let edge = &chart.edges[routed.edge_index];
            let points = routed.path_points();
            for placement in &layout.nodes {
                if placement.node_id == edge.from || placement.node_id == edge.to {
                    continue;
                }
                let padded = placement.bounds.padded(8.0);
                prop_assert!(!polyline_hits(&points, &padded), "edge {} crosses {}", routed.edge_index, placement.node_id);
            }
        }
    }
}

#[test]
fn skip_edge_routes_around_the_node_in_between() {
    let parsed = sc_parser::parse("flowchart TD\nA --> B\nB --> C\nA --> C");
    let Diagram::Flowchart(chart) = parsed.diagram else {
        panic!("expected a flowchart");
    };
    let layout = layout_flowchart(&chart);
    assert_eq!(layout.layers, vec![vec!["A"], vec!["B"], vec!["C"]]);

    let skip = layout.routed_edge(2).expect("A --> C is routed");
    assert_eq!(skip.kind, RouteKind::Orthogonal);
    assert!(skip.clear);
    assert!(!skip.waypoints.is_empty());

    let middle = layout.node("B").expect("B is placed").bounds.padded(8.0);
    assert!(!polyline_hits(&skip.points(), &middle));
}

#[test]
fn diamond_has_three_layers_and_no_crossings() {
    let parsed = sc_parser::parse("graph TD\nA --> B\nA --> C\nB --> D\nC --> D");
    let chart = parsed.diagram.as_flowchart().expect("flowchart").clone();
    let layout = layout_flowchart(&chart);
    assert_eq!(layout.layers, vec![vec!["A"], vec!["B", "C"], vec!["D"]]);
    assert_eq!(layout.stats.crossings_after, 0);
    assert!(layout.back_edges.is_empty());
}

#[test]
fn wide_layer_fits_the_target_width() {
    let mut source = String::from("flowchart TD\n");
    for i in 0..7 {
        source.push_str(&format!("root --> leaf{i}\n"));
    }
    let parsed = sc_parser::parse(&source);
    let chart = parsed.diagram.as_flowchart().expect("flowchart").clone();
    let layout = layout_flowchart(&chart);
    assert_eq!(layout.complexity.class, sc_layout::ComplexityClass::Complex);
    assert!(layout.canvas.width <= 640.0 + 0.01);
}

#[test]
fn self_loop_in_a_crowded_layer_avoids_its_siblings() {
    let mut source = String::from("flowchart TD\n");
    for i in 0..8 {
        source.push_str(&format!("root --> a{i}\n"));
    }
    source.push_str("a3 --> a3\n");
    let parsed = sc_parser::parse(&source);
    let chart = parsed.diagram.as_flowchart().expect("flowchart").clone();
    let layout = layout_flowchart(&chart);
    assert_eq!(layout.complexity.class, sc_layout::ComplexityClass::Complex);

    let self_loop = layout
        .routed_edges
        .iter()
        .find(|routed| routed.kind == RouteKind::SelfLoop)
        .expect("a3 loop is routed");
    assert!(self_loop.clear);
    assert!(self_loop.back_edge);
    for placement in &layout.nodes {
        if placement.node_id == "a3" {
            continue;
        }
        let padded = placement.bounds.padded(8.0);
        assert!(
            !polyline_hits(&self_loop.points(), &padded),
            "loop crosses {}",
            placement.node_id
        );
    }
}
