// Integration tests for the tree-net binary's non-serving commands
//
// Run with: cargo test --test cli_commands_test

use std::process::Command;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tree-net"))
}

#[test]
fn test_show_config_applies_env_and_flags() {
    let output = binary()
        .args(["show-config", "--port", "9100"])
        .env("TREE_NODE_NAME", "node-from-env")
        .env("TREE_PORT", "7000")
        .output()
        .expect("Failed to run tree-net");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["name"], "node-from-env");
    // Flags win over environment
    assert_eq!(config["tree_port"], 9100);
}

#[test]
fn test_show_config_reads_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("node.json");
    std::fs::write(&path, r#"{"name": "file-node", "tree_ip": "127.0.0.1"}"#).unwrap();

    let output = binary()
        .arg("show-config")
        .arg("--config")
        .arg(&path)
        .env_remove("TREE_NODE_NAME")
        .env_remove("TREE_IP")
        .env_remove("TREE_PORT")
        .output()
        .expect("Failed to run tree-net");

    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["name"], "file-node");
    assert_eq!(config["tree_ip"], "127.0.0.1");
    assert_eq!(config["tree_port"], 0);
}

#[test]
fn test_missing_config_file_fails() {
    let output = binary()
        .args(["show-config", "--config", "/nonexistent/tree-net.json"])
        .output()
        .expect("Failed to run tree-net");
    assert!(!output.status.success());
}

#[test]
fn test_listen_fails_on_unresolvable_host() {
    let output = binary()
        .args(["listen", "--ip", "definitely-not-a-host.invalid", "--port", "1"])
        .env_remove("TREE_IP")
        .output()
        .expect("Failed to run tree-net");
    assert!(!output.status.success());
}
