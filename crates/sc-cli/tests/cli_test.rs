//! Smoke tests for the `sc-cli` binary.

use std::io::Write;
use std::process::{Command, Output};

fn sc_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sc-cli"))
        .args(args)
        .env_remove("SC_CROSSING_PASSES")
        .output()
        .expect("sc-cli runs")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn layout_of_inline_text_has_positions_for_every_node() {
    let output = sc_cli(&["layout", "flowchart LR\nA[Start] --> B{Check}\nB -->|Yes| C"]);
    let value = stdout_json(&output);
    assert_eq!(value["diagram_kind"], "flowchart");
    let positions = value["positions"].as_object().expect("positions map");
    assert_eq!(positions.len(), 3);
    assert_eq!(value["routed_edges"].as_array().map(Vec::len), Some(2));
    assert!(value["canvas_size"]["width"].as_f64().unwrap_or(0.0) > 0.0);
}

#[test]
fn layout_reads_a_file_and_a_toml_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let diagram = dir.path().join("chart.mmd");
    std::fs::write(&diagram, "graph TD\nA --> B\nB --> C\nA --> C\n").expect("write diagram");
    let config = dir.path().join("layout.toml");
    let mut file = std::fs::File::create(&config).expect("create config");
    writeln!(file, "target_width = 900.0\nmargin = 10.0").expect("write config");

    let output = sc_cli(&[
        "layout",
        diagram.to_str().expect("utf-8 path"),
        "--config",
        config.to_str().expect("utf-8 path"),
    ]);
    let value = stdout_json(&output);
    let width = value["canvas_size"]["width"].as_f64().expect("width");
    assert!((width - 900.0).abs() < 0.01);
    assert_eq!(value["stats"]["detoured_edges"], 1);
}

#[test]
fn invalid_config_value_fails_with_context() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = dir.path().join("layout.json");
    std::fs::write(&config, r#"{ "crossing_passes": 0 }"#).expect("write config");

    let output = sc_cli(&[
        "layout",
        "graph TD\nA --> B",
        "--config",
        config.to_str().expect("utf-8 path"),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid config"), "{stderr}");
}

#[test]
fn environment_overrides_the_pass_cap() {
    let output = Command::new(env!("CARGO_BIN_EXE_sc-cli"))
        .args(["layout", "--evidence", "graph TD\na --> y\nb --> x"])
        .env("SC_CROSSING_PASSES", "1")
        .output()
        .expect("sc-cli runs");
    let value = stdout_json(&output);
    assert_eq!(value["crossing_passes"], 1);
    assert_eq!(value["crossings_after"], 0);

    let output = Command::new(env!("CARGO_BIN_EXE_sc-cli"))
        .args(["layout", "graph TD\nA --> B"])
        .env("SC_CROSSING_PASSES", "lots")
        .output()
        .expect("sc-cli runs");
    assert!(!output.status.success());
}

#[test]
fn unsupported_kind_is_passed_through() {
    let source = "sequenceDiagram\nAlice->>Bob: Hi";
    let value = stdout_json(&sc_cli(&["layout", source]));
    assert_eq!(value["diagram_kind"], "unsupported");
    assert_eq!(value["unsupported_source"], source);
}

#[test]
fn parse_summary_counts_nodes_and_edges() {
    let value = stdout_json(&sc_cli(&["parse", "graph TD\nA --> B --> C"]));
    assert_eq!(value["diagram_kind"], "flowchart");
    assert_eq!(value["node_count"], 3);
    assert_eq!(value["edge_count"], 2);
}

#[test]
fn detect_reports_kind_as_json() {
    let value = stdout_json(&sc_cli(&["detect", "--json", "gantt\ntitle Plan"]));
    assert_eq!(value["diagram_kind"], "gantt");
    assert_eq!(value["supported"], false);
}
