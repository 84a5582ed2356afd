#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };
    // Force the flowchart path so layout runs on every input.
    let text = format!("flowchart TD\n{body}");
    let output = sc_engine::process(&text);

    assert_eq!(output.positions.len(), output.nodes.len());
    assert_eq!(output.routed_edges.len(), output.edges.len());
    let layered: usize = output.layers.iter().map(Vec::len).sum();
    assert_eq!(layered, output.nodes.len());
    for point in output.positions.values() {
        assert!(point.x.is_finite() && point.y.is_finite());
    }

    let evidence = sc_engine::evidence_json(&output);
    assert!(serde_json::from_str::<serde_json::Value>(&evidence).is_ok());
});
