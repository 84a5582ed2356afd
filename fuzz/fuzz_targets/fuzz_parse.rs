#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let parsed = sc_parser::parse(text);
    if let Some(chart) = parsed.diagram.as_flowchart() {
        for edge in &chart.edges {
            assert!(chart.node(&edge.from).is_some());
            assert!(chart.node(&edge.to).is_some());
        }
    }
    let _ = sc_parser::parse_evidence_json(&parsed);
});
