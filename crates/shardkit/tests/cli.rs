use std::{fs, path::Path, process::Command};

use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

const GRAPH: &str = r#"{
    "roots": ["app"],
    "modules": [
        {"id": "app", "name": "./app", "path": "/work/src/app.js", "deps": [
            {"id": "react", "name": "react"},
            {"id": "about", "name": "./about", "dynamic": true}
        ]},
        {"id": "react", "name": "react", "path": "/work/node_modules/react/index.js"},
        {"id": "about", "name": "./about", "path": "/work/src/about.js"}
    ]
}"#;

const CONFIG: &str = r#"
[options]
dest = "dist/app.js"
root_dir = "/work"

[[splitter]]
name = "vendor"
dest = "dist/vendor.js"
match = { path = { regex = "/node_modules/" } }
"#;

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

fn shardkit(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_shardkit"))
        .args(args)
        .output()
        .expect("Failed to run shardkit")
}

fn shard_names(result: &Value) -> Vec<&str> {
    result["shards"]
        .as_array()
        .unwrap()
        .iter()
        .map(|shard| shard["name"].as_str().unwrap())
        .collect()
}

#[test]
fn test_splits_graph_with_config() {
    let temp_dir = TempDir::new().unwrap();
    let graph = write(temp_dir.path(), "graph.json", GRAPH);
    let config = write(temp_dir.path(), "shardkit.toml", CONFIG);
    let output_path = temp_dir.path().join("result.json");

    let output = shardkit(&[
        "--graph",
        &graph,
        "--config",
        &config,
        "--output",
        &output_path.to_string_lossy(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result: Value = serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
    let names = shard_names(&result);
    assert_eq!(names[0], "main");
    assert!(names.contains(&"loader-app.js"));

    let vendor = result["shards"]
        .as_array()
        .unwrap()
        .iter()
        .find(|shard| shard["name"] == "vendor")
        .unwrap();
    assert_eq!(vendor["dest"], "dist/vendor.js");
    assert_eq!(vendor["modules"], serde_json::json!(["react"]));
}

#[test]
fn test_dest_flag_overrides_config_and_prints_to_stdout() {
    let temp_dir = TempDir::new().unwrap();
    let graph = write(temp_dir.path(), "graph.json", GRAPH);
    let config = write(temp_dir.path(), "shardkit.toml", CONFIG);

    let output = shardkit(&["--graph", &graph, "-c", &config, "--dest", "out/index.js"]);
    assert!(output.status.success());

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["shards"][0]["dest"], "out/index.js");
    assert!(shard_names(&result).contains(&"loader-index.js"));
}

#[test]
fn test_missing_graph_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.json");

    let output = shardkit(&["--graph", &missing.to_string_lossy()]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read module graph"));
}

#[test]
fn test_circular_splitters_fail() {
    let temp_dir = TempDir::new().unwrap();
    let graph = write(
        temp_dir.path(),
        "graph.json",
        r#"{
            "roots": ["m"],
            "modules": [
                {"id": "m", "path": "/src/m.js", "deps": [{"id": "a1"}]},
                {"id": "a1", "path": "/src/a/a1.js", "deps": [{"id": "b1"}]},
                {"id": "b1", "path": "/src/b/b1.js", "deps": [{"id": "a2"}]},
                {"id": "a2", "path": "/src/a/a2.js"}
            ]
        }"#,
    );
    let config = write(
        temp_dir.path(),
        "shardkit.toml",
        r#"
[[splitter]]
name = "a.js"
match = "/src/a/"

[[splitter]]
name = "b.js"
match = "/src/b/"
"#,
    );

    let output = shardkit(&["--graph", &graph, "--config", &config]);

    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr)
            .contains("circular reference detected between splitter 'b.js' and splitter 'a.js'")
    );
}
