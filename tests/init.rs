use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_quill"))
        .arg("init")
        .env_clear()
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "quill init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".quill.toml");
    assert!(config_path.exists(), ".quill.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[github]"));
    assert!(content.contains("[llm]"));
    assert!(content.contains("[review]"));

    let config: quill_core::QuillConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.llm.model, "gpt-4o");
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".quill.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_quill"))
        .arg("init")
        .env_clear()
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".quill.toml")).unwrap();
    assert_eq!(content, "# existing");
}
