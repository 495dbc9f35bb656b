use std::path::Path;
use std::process::{Command, Output};

const JAVA: &str = "com/acme/Words.java";

fn quickdoc_cmd(fixture: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_quickdoc"));
    cmd.current_dir(Path::new("tests/fixtures").join(fixture));
    cmd.env_remove("QUICKDOC_LOG");
    cmd
}

fn offset_of(file: &str, needle: &str) -> String {
    let text = std::fs::read_to_string(Path::new("tests/fixtures/words").join(file)).unwrap();
    text.find(needle).unwrap().to_string()
}

/// A scratch project holding a copy of the Java fixture.
fn scratch_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("com/acme")).unwrap();
    std::fs::copy(Path::new("tests/fixtures/words").join(JAVA), dir.path().join(JAVA)).unwrap();
    dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn show_prints_the_registered_snippet() {
    let offset = offset_of(JAVA, "groupingBy");
    let output = quickdoc_cmd("words")
        .args(["show", JAVA, "--offset", &offset])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "show failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).starts_with("<h3>Collectors.groupingBy</h3>"));
}

#[test]
fn show_accepts_line_and_column() {
    let output = quickdoc_cmd("words")
        .args(["show", JAVA, "--line", "13", "--column", "32"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "show failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains("Stream.map"));
}

#[test]
fn show_in_tool_window() {
    let offset = offset_of(JAVA, "map(");
    let output = quickdoc_cmd("words")
        .args(["show", JAVA, "--offset", &offset, "--tool-window"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("Stream.map"));
}

#[test]
fn unregistered_member_exits_with_one() {
    let offset = offset_of(JAVA, "toList()");
    let output = quickdoc_cmd("words")
        .args(["show", JAVA, "--offset", &offset])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output).trim(), "No example found.");
}

#[test]
fn blank_position_has_no_documentation() {
    let output = quickdoc_cmd("words")
        .args(["show", JAVA, "--offset", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no documentation"));
}

#[test]
fn unresolved_rust_call_is_described_by_the_provider() {
    let offset = offset_of("src/report.rs", "render_summary");
    let output = quickdoc_cmd("words")
        .args(["show", "src/report.rs", "--offset", &offset])
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("render_summary"));
    assert!(text.contains("Unresolved call with 1 argument(s)."));
}

#[test]
fn key_prints_the_lookup_key() {
    let offset = offset_of(JAVA, "groupingBy");
    let output = quickdoc_cmd("words")
        .args(["key", JAVA, "--offset", &offset])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        "java.util.stream.Collectors.groupingBy2 -> /examples/Collectors/Collectors.groupingBy.html"
    );
}

#[test]
fn examples_lists_the_registry() {
    let output = quickdoc_cmd("words").args(["examples", "--json"]).output().unwrap();
    assert!(output.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 8);
    assert!(entries.iter().any(|e| e["key"] == "java.util.stream.Stream.anyMatch1"));
}

#[test]
fn missing_file_is_an_error() {
    let output = quickdoc_cmd("words")
        .args(["show", "Nope.java", "--offset", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error: file not found"));
}

#[test]
fn malformed_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".quickdoc.toml"), "debounce_ms = \"soon\"").unwrap();
    std::fs::write(dir.path().join("A.java"), "class A {}").unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_quickdoc"))
        .current_dir(dir.path())
        .args(["show", "A.java", "--offset", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn build_output_and_unreadable_files_are_skipped() {
    let dir = scratch_project();
    std::fs::create_dir_all(dir.path().join("target/gen")).unwrap();
    std::fs::write(dir.path().join("target/gen/bindings.rs"), b"\xff\xfe").unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/latin1.rs"), b"// caf\xe9\n").unwrap();
    let offset = offset_of(JAVA, "groupingBy");
    let output = Command::new(env!("CARGO_BIN_EXE_quickdoc"))
        .current_dir(dir.path())
        .env_remove("QUICKDOC_LOG")
        .args(["key", JAVA, "--offset", &offset])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "key failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).starts_with("java.util.stream.Collectors.groupingBy2 -> "));
}

#[test]
fn snippets_dir_overrides_embedded_snippets() {
    let dir = scratch_project();
    std::fs::write(dir.path().join(".quickdoc.toml"), "snippets_dir = \"snippets\"\n").unwrap();
    std::fs::create_dir_all(dir.path().join("snippets/examples/Collectors")).unwrap();
    std::fs::write(
        dir.path().join("snippets/examples/Collectors/Collectors.groupingBy.html"),
        "<p>local grouping</p>",
    )
    .unwrap();
    let offset = offset_of(JAVA, "groupingBy");
    let output = Command::new(env!("CARGO_BIN_EXE_quickdoc"))
        .current_dir(dir.path())
        .env_remove("QUICKDOC_LOG")
        .args(["show", JAVA, "--offset", &offset])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "<p>local grouping</p>");
}
