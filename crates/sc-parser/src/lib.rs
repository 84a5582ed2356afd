#![forbid(unsafe_code)]

//! Text to [`Diagram`].
//!
//! The first significant line picks the diagram kind. Flowcharts are parsed
//! statement by statement; everything else is returned as
//! [`Diagram::Unsupported`] with the input untouched. Parsing never fails:
//! anything unusable is skipped and reported in [`ParseResult::warnings`].

mod flowchart;
mod flowchart_builder;

use std::collections::BTreeMap;

use sc_core::{Diagram, DiagramKind};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    pub diagram: Diagram,
    pub warnings: Vec<String>,
}

/// Parse DSL text. Total over all inputs, including half-streamed ones.
#[must_use]
pub fn parse(input: &str) -> ParseResult {
    let kind = detect_kind(input);
    if kind != DiagramKind::Flowchart {
        let warnings = if input.trim().is_empty() {
            vec!["Empty input".to_string()]
        } else {
            Vec::new()
        };
        return ParseResult {
            diagram: Diagram::Unsupported {
                kind,
                source: input.to_string(),
            },
            warnings,
        };
    }

    let (chart, warnings) = flowchart::parse_flowchart(input);
    ParseResult {
        diagram: Diagram::Flowchart(chart),
        warnings,
    }
}

/// Classify the input by the keyword on its first non-comment line.
#[must_use]
pub fn detect_kind(input: &str) -> DiagramKind {
    let Some(first_line) = first_significant_line(input) else {
        return DiagramKind::Unknown;
    };
    let keyword = first_line
        .split(|c: char| c.is_whitespace() || c == ';')
        .next()
        .unwrap_or_default();
    kind_for_keyword(keyword)
}

fn kind_for_keyword(keyword: &str) -> DiagramKind {
    match keyword {
        "graph" | "flowchart" => DiagramKind::Flowchart,
        "sequenceDiagram" => DiagramKind::Sequence,
        "classDiagram" | "classDiagram-v2" => DiagramKind::Class,
        "stateDiagram" | "stateDiagram-v2" => DiagramKind::State,
        "erDiagram" => DiagramKind::Er,
        "gantt" => DiagramKind::Gantt,
        "pie" => DiagramKind::Pie,
        "journey" => DiagramKind::Journey,
        "mindmap" => DiagramKind::Mindmap,
        "timeline" => DiagramKind::Timeline,
        "quadrantChart" => DiagramKind::QuadrantChart,
        "requirementDiagram" => DiagramKind::Requirement,
        "gitGraph" => DiagramKind::GitGraph,
        "xychart-beta" | "xychart" => DiagramKind::XyChart,
        _ => DiagramKind::Unknown,
    }
}

fn first_significant_line(input: &str) -> Option<&str> {
    input
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !flowchart::is_comment(line))
}

/// Compact JSON summary of a parse, for tooling and fuzz evidence.
#[must_use]
pub fn parse_evidence_json(parsed: &ParseResult) -> String {
    let chart = parsed.diagram.as_flowchart();
    let (node_count, edge_count) =
        chart.map_or((0, 0), |chart| (chart.nodes.len(), chart.edges.len()));
    let mut shapes: BTreeMap<&str, usize> = BTreeMap::new();
    let mut edge_styles: BTreeMap<&str, usize> = BTreeMap::new();
    let mut self_loops = 0_usize;
    if let Some(chart) = chart {
        for node in &chart.nodes {
            *shapes.entry(node.shape.as_str()).or_insert(0) += 1;
        }
        for edge in &chart.edges {
            *edge_styles.entry(edge.style.as_str()).or_insert(0) += 1;
            self_loops += usize::from(edge.is_self_loop());
        }
    }
    json!({
        "diagram_kind": parsed.diagram.kind().as_str(),
        "direction": chart.map(|chart| chart.direction.as_str()),
        "node_count": node_count,
        "edge_count": edge_count,
        "shapes": shapes,
        "edge_styles": edge_styles,
        "self_loops": self_loops,
        "warning_count": parsed.warnings.len(),
        "warnings": parsed.warnings.clone(),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::{detect_kind, parse, parse_evidence_json};
    use proptest::prelude::*;
    use sc_core::{Diagram, DiagramKind, GraphDirection, NodeShape};

    #[test]
    fn detects_flowchart_keywords() {
        assert_eq!(detect_kind("flowchart LR\nA-->B"), DiagramKind::Flowchart);
        assert_eq!(detect_kind("graph TD\nA-->B"), DiagramKind::Flowchart);
        assert_eq!(detect_kind("graph"), DiagramKind::Flowchart);
        assert_eq!(detect_kind("%% leading comment\n\n  graph TD"), DiagramKind::Flowchart);
    }

    #[test]
    fn keyword_must_be_a_whole_word() {
        assert_eq!(detect_kind("graphTD\nA-->B"), DiagramKind::Unknown);
        assert_eq!(detect_kind("flowcharts"), DiagramKind::Unknown);
    }

    #[test]
    fn detects_sibling_kinds() {
        let cases = [
            ("sequenceDiagram\nAlice->>Bob: hi", DiagramKind::Sequence),
            ("classDiagram\nA <|-- B", DiagramKind::Class),
            ("stateDiagram-v2\n[*] --> S", DiagramKind::State),
            ("erDiagram\nA ||--o{ B : has", DiagramKind::Er),
            ("gantt\ntitle T", DiagramKind::Gantt),
            ("pie title Test", DiagramKind::Pie),
            ("journey\ntitle T", DiagramKind::Journey),
            ("mindmap\n  root", DiagramKind::Mindmap),
            ("timeline\n2020 : x", DiagramKind::Timeline),
            ("quadrantChart\ntitle Q", DiagramKind::QuadrantChart),
            ("requirementDiagram\n", DiagramKind::Requirement),
            ("gitGraph\ncommit", DiagramKind::GitGraph),
            ("xychart-beta\nx-axis [a]", DiagramKind::XyChart),
        ];
        for (input, expected) in cases {
            assert_eq!(detect_kind(input), expected, "{input}");
        }
    }

    #[test]
    fn unsupported_input_preserves_text_exactly() {
        let input = "pie title Test\n\"A\":1";
        let result = parse(input);
        assert_eq!(
            result.diagram,
            Diagram::Unsupported {
                kind: DiagramKind::Pie,
                source: input.to_string(),
            }
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn empty_input_is_unknown_with_warning() {
        let result = parse("   \n");
        assert_eq!(result.diagram.kind(), DiagramKind::Unknown);
        assert_eq!(result.warnings, vec!["Empty input".to_string()]);
    }

    #[test]
    fn parses_decision_flowchart() {
        let result = parse("flowchart TD\nA[Start] --> B{Check}\nB -->|Yes| C[Done]\nB -->|No| A");
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        let Diagram::Flowchart(chart) = result.diagram else {
            panic!("expected flowchart");
        };
        assert_eq!(chart.direction, GraphDirection::TopDown);
        assert_eq!(chart.nodes.len(), 3);
        assert_eq!(chart.edges.len(), 3);
        assert_eq!(chart.nodes[1].shape, NodeShape::Rhombus);
        assert_eq!(chart.edges[1].label.as_deref(), Some("Yes"));
        assert_eq!(chart.edges[2].from, "B");
        assert_eq!(chart.edges[2].to, "A");
    }

    #[test]
    fn style_before_declaration_lands_in_side_table() {
        let result = parse("flowchart TD\nstyle A fill:#ff0000,stroke:#000\nA[Hi]");
        let Diagram::Flowchart(chart) = result.diagram else {
            panic!("expected flowchart");
        };
        assert_eq!(
            chart.node_styles.get("A").and_then(|s| s.fill.as_deref()),
            Some("#ff0000")
        );
        assert_eq!(chart.nodes[0].label.as_deref(), Some("Hi"));
    }

    #[test]
    fn evidence_json_contains_counts_and_kind() {
        let parsed = parse("graph LR\nA --> B\nB -.-> C{{Hex}}\nC --> C");
        let evidence: serde_json::Value =
            serde_json::from_str(&parse_evidence_json(&parsed)).unwrap();
        assert_eq!(evidence["diagram_kind"], "flowchart");
        assert_eq!(evidence["direction"], "LR");
        assert_eq!(evidence["node_count"], 3);
        assert_eq!(evidence["edge_count"], 3);
        assert_eq!(evidence["shapes"]["rectangle"], 2);
        assert_eq!(evidence["shapes"]["hexagon"], 1);
        assert_eq!(evidence["edge_styles"]["solid"], 2);
        assert_eq!(evidence["edge_styles"]["dotted"], 1);
        assert_eq!(evidence["self_loops"], 1);
        assert_eq!(evidence["warning_count"], 0);

        let unsupported: serde_json::Value =
            serde_json::from_str(&parse_evidence_json(&parse("pie\n\"a\": 1"))).unwrap();
        assert!(unsupported["direction"].is_null());
    }

    #[test]
    fn streaming_prefixes_never_lose_complete_statements() {
        let full = "flowchart LR\nA[Start] --> B{Check}\nB -->|Yes| C[Done]\n";
        let complete = parse(full);
        let Diagram::Flowchart(complete_chart) = complete.diagram else {
            panic!("expected flowchart");
        };
        // Cutting inside the last line keeps the first edge intact.
        let cut = full.len() - 6;
        let partial = parse(&full[..cut]);
        let Diagram::Flowchart(partial_chart) = partial.diagram else {
            panic!("expected flowchart");
        };
        assert_eq!(partial_chart.edges[0], complete_chart.edges[0]);
        assert!(partial_chart.edges.len() <= complete_chart.edges.len());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_parse_is_total(input in ".{0,256}") {
            let _ = parse(&input);
        }

        #[test]
        fn prop_flowchart_edges_reference_existing_nodes(body in "[A-D \\-\\->\\[\\]{}()|a-z\\n]{0,200}") {
            let input = format!("flowchart TD\n{body}");
            let result = parse(&input);
            let Diagram::Flowchart(chart) = result.diagram else {
                return Err(TestCaseError::fail("expected flowchart"));
            };
            for edge in &chart.edges {
                prop_assert!(chart.find_node_index(&edge.from).is_some());
                prop_assert!(chart.find_node_index(&edge.to).is_some());
            }
            let mut ids: Vec<&str> = chart.nodes.iter().map(|n| n.id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), chart.nodes.len());
        }

        #[test]
        fn prop_parse_is_deterministic(input in ".{0,200}") {
            prop_assert_eq!(parse(&input), parse(&input));
        }
    }
}
