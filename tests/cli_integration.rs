// CLI integration tests for the get/pick/completion flows.
use std::io::Write;
use std::process::{Command, Output, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_pluckite");
    Command::new(exe)
}

fn run_with_stdin(args: &[&str], input: &str) -> Output {
    let mut child = cmd()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    // The child may exit before draining stdin (argument errors), so a
    // failed write is fine.
    let _ = child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes());
    child.wait_with_output().expect("wait")
}

fn parse_json(text: &str) -> Value {
    serde_json::from_str(text.trim()).expect("valid json")
}

// Tracing lines share stderr with the structured payloads; pick out
// the first line that is JSON.
fn stderr_json(output: &Output) -> Value {
    let text = String::from_utf8_lossy(&output.stderr);
    text.lines()
        .filter_map(|line| serde_json::from_str(line.trim()).ok())
        .next()
        .unwrap_or_else(|| panic!("no json line on stderr: {text}"))
}

fn write_fixture(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, body).expect("write fixture");
    path.to_str().expect("utf8 path").to_string()
}

#[test]
fn get_raw_string_from_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&temp, "config.json", r#"{"name":"alice","port":8080}"#);

    let output = cmd()
        .args(["get", "name", &path, "--as", "string", "--raw"])
        .output()
        .expect("get");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "alice");
}

#[test]
fn get_defaults_to_json_subtree() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&temp, "config.json", r#"{"meta":{"a":1,"b":[true]}}"#);

    let output = cmd().args(["get", "meta", &path]).output().expect("get");
    assert!(output.status.success());
    let value = parse_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(value, parse_json(r#"{"a":1,"b":[true]}"#));
}

#[test]
fn color_always_forces_ansi_through_pipes() {
    let output = run_with_stdin(
        &["--color", "always", "get", "meta"],
        r#"{"meta":{"a":1}}"#,
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\u{1b}["), "{stdout}");
    // Forced color also selects the pretty layout.
    assert!(stdout.lines().count() > 1, "{stdout}");
}

#[test]
fn piped_output_defaults_to_plain_compact_json() {
    let output = run_with_stdin(&["get", "meta"], r#"{"meta":{"a":1}}"#);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("\u{1b}["));
    assert_eq!(stdout.trim(), r#"{"a":1}"#);
}

#[test]
fn get_reads_stdin_when_no_file_given() {
    let output = run_with_stdin(
        &["get", "port", "--as", "uint"],
        r#"{"port": 8080}"#,
    );
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "8080");
}

#[test]
fn missing_field_exits_3_with_json_error() {
    let output = run_with_stdin(&["get", "port", "--as", "uint"], r#"{"name":"alice"}"#);
    assert_eq!(output.status.code(), Some(3));
    let err = stderr_json(&output);
    let obj = err.get("error").and_then(|v| v.as_object()).expect("error object");
    assert_eq!(obj.get("kind").and_then(|v| v.as_str()), Some("NotFound"));
    assert_eq!(obj.get("field").and_then(|v| v.as_str()), Some("port"));
}

#[test]
fn type_mismatch_exits_1() {
    let output = run_with_stdin(&["get", "name", "--as", "uint"], r#"{"name":"alice"}"#);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"].as_str(), Some("Mismatch"));
}

#[test]
fn bare_get_exits_2() {
    let output = cmd().arg("get").output().expect("get");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn unknown_flag_is_invalid_param() {
    let output = cmd()
        .args(["get", "name", "--bogus"])
        .output()
        .expect("get");
    assert_eq!(output.status.code(), Some(2));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"].as_str(), Some("InvalidParam"));
}

#[test]
fn range_violation_exits_1_and_names_the_range() {
    let output = run_with_stdin(
        &["get", "port", "--min", "1", "--max", "64"],
        r#"{"port": 8080}"#,
    );
    assert_eq!(output.status.code(), Some(1));
    let err = stderr_json(&output);
    let message = err["error"]["message"].as_str().expect("message");
    assert!(message.contains("[1, 64]"), "{message}");
}

#[test]
fn range_accepts_boundary_value() {
    let output = run_with_stdin(
        &["get", "port", "--min", "1", "--max", "8080"],
        r#"{"port": 8080}"#,
    );
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "8080");
}

#[test]
fn min_without_max_exits_2() {
    let output = run_with_stdin(&["get", "port", "--min", "1"], r#"{"port": 1}"#);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn default_substitutes_missing_field() {
    let output = run_with_stdin(
        &["get", "port", "--as", "uint", "--default", "9000"],
        r#"{"name":"alice"}"#,
    );
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "9000");
}

#[test]
fn bare_text_default_works_for_strings_only() {
    let output = run_with_stdin(
        &["get", "label", "--as", "string", "--default", "fallback", "--raw"],
        r#"{}"#,
    );
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "fallback");

    let output = run_with_stdin(
        &["get", "port", "--as", "uint", "--default", "fallback"],
        r#"{}"#,
    );
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn capacity_bounds_the_copied_string() {
    let input = r#"{"name":"alice"}"#;

    // "alice" plus the terminator needs 6 bytes.
    let output = run_with_stdin(&["get", "name", "--capacity", "5"], input);
    assert_eq!(output.status.code(), Some(4));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"].as_str(), Some("BufferTooSmall"));

    let output = run_with_stdin(&["get", "name", "--capacity", "6", "--raw"], input);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "alice");
}

#[test]
fn each_extracts_from_every_record() {
    let output = run_with_stdin(
        &["get", "status", "--as", "string", "--each", "--raw"],
        "{\"status\":\"ok\"}\n\n{\"status\":\"retry\"}\n",
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, ["ok", "retry"]);
}

#[test]
fn each_skip_policy_emits_notice_and_succeeds() {
    let output = run_with_stdin(
        &["get", "status", "--as", "string", "--each", "--errors", "skip"],
        "{\"status\":\"ok\"}\n{\"other\":1}\n",
    );
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "\"ok\"");

    let notice = stderr_json(&output);
    let obj = notice.get("notice").and_then(|v| v.as_object()).expect("notice object");
    assert_eq!(obj.get("kind").and_then(|v| v.as_str()), Some("skip"));
    assert_eq!(obj.get("cmd").and_then(|v| v.as_str()), Some("get"));
    assert_eq!(obj.get("field").and_then(|v| v.as_str()), Some("status"));
    assert_eq!(obj["details"]["record"].as_u64(), Some(2));
}

#[test]
fn each_stop_policy_fails_on_first_bad_record() {
    let output = run_with_stdin(
        &["get", "status", "--as", "string", "--each"],
        "{\"other\":1}\n{\"status\":\"ok\"}\n",
    );
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "");
}

#[test]
fn each_skip_with_no_successes_keeps_the_failure_code() {
    let output = run_with_stdin(
        &["get", "status", "--as", "string", "--each", "--errors", "skip"],
        "{\"other\":1}\n",
    );
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn pick_builds_one_object_from_typed_fields() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(
        &temp,
        "config.json",
        r#"{"name":"alice","port":8080,"tags":["a","b"]}"#,
    );

    let output = cmd()
        .args([
            "pick",
            &path,
            "--field",
            "name:string",
            "--field",
            "port:uint",
            "--field",
            "tags:strings",
        ])
        .output()
        .expect("pick");
    assert!(output.status.success());
    let value = parse_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(
        value,
        parse_json(r#"{"name":"alice","port":8080,"tags":["a","b"]}"#)
    );
}

#[test]
fn pick_fails_whole_object_on_one_bad_field() {
    let output = run_with_stdin(
        &["pick", "--field", "name:string", "--field", "port:uint"],
        r#"{"name":"alice"}"#,
    );
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "");
}

#[test]
fn parse_error_exits_6() {
    let output = run_with_stdin(&["get", "name"], "{not json");
    assert_eq!(output.status.code(), Some(6));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"].as_str(), Some("Parse"));
}

#[test]
fn missing_input_file_exits_7() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("absent.json");

    let output = cmd()
        .args(["get", "name", path.to_str().unwrap()])
        .output()
        .expect("get");
    assert_eq!(output.status.code(), Some(7));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"].as_str(), Some("Io"));
}

#[test]
fn completion_mentions_the_binary() {
    let output = cmd().args(["completion", "bash"]).output().expect("completion");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("pluckite"));
}

#[test]
fn help_exits_0() {
    let output = cmd().arg("--help").output().expect("help");
    assert_eq!(output.status.code(), Some(0));
}
