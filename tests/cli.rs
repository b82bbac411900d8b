use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn rtpl_cmd() -> Command {
    Command::cargo_bin("rtpl").unwrap()
}

fn write_template(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn renders_template_with_inline_json() {
    // The packaging smoke test: rtpl -t test.j2 -d '{"name":"Homebrew"}'.
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "test.j2", "Hello, {{ name }}!");

    rtpl_cmd()
        .args(["-t", &template, "-d", r#"{"name":"Homebrew"}"#])
        .assert()
        .success()
        .stdout("Hello, Homebrew!");
}

#[test]
fn renders_from_data_file() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "test.j2", "{{ a }}-{{ b }}");
    let data = dir.path().join("data.json");
    fs::write(&data, r#"{"a":"x","b":"y"}"#).unwrap();

    rtpl_cmd()
        .args(["-t", &template, "--data-file", data.to_str().unwrap()])
        .assert()
        .success()
        .stdout("x-y");
}

#[test]
fn renders_from_yaml_data_file() {
    let dir = TempDir::new().unwrap();
    let template = write_template(
        &dir,
        "hosts.j2",
        "{% for s in servers %}{{ s }}\n{% endfor %}",
    );
    let data = dir.path().join("data.yaml");
    fs::write(&data, "servers:\n  - web-1\n  - db-1\n").unwrap();

    rtpl_cmd()
        .args(["-t", &template, "--data-file", data.to_str().unwrap()])
        .assert()
        .success()
        .stdout("web-1\ndb-1\n");
}

#[test]
fn reads_json_data_from_stdin() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "test.j2", "hi {{ name }}");

    rtpl_cmd()
        .args(["-t", &template, "--data-file", "-"])
        .write_stdin(r#"{"name":"pipe"}"#)
        .assert()
        .success()
        .stdout("hi pipe");
}

#[test]
fn malformed_stdin_data_exits_with_data_code() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "test.j2", "hi");

    rtpl_cmd()
        .args(["-t", &template, "--data-file", "-"])
        .write_stdin("{not json")
        .assert()
        .failure()
        .code(4)
        .stdout("")
        .stderr(predicate::str::contains("data error"));
}

#[test]
fn renders_from_env_prefix() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "test.j2", "hello {{ NAME }}");

    rtpl_cmd()
        .env("RTPLTEST_NAME", "env-world")
        .args(["-t", &template, "--env-prefix", "RTPLTEST_"])
        .assert()
        .success()
        .stdout("hello env-world");
}

#[test]
fn env_prefix_with_no_matches_exits_with_data_code() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "test.j2", "x");

    rtpl_cmd()
        .args(["-t", &template, "--env-prefix", "DEFINITELY_NOT_SET_PREFIX_"])
        .assert()
        .failure()
        .code(4)
        .stdout("")
        .stderr(predicate::str::contains("data error"));
}

#[test]
fn syntax_error_exits_3_with_empty_stdout() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "bad.j2", "{% if flag %}never closed");

    rtpl_cmd()
        .args(["-t", &template, "-d", "{}"])
        .assert()
        .failure()
        .code(3)
        .stdout("")
        .stderr(predicate::str::contains("syntax error"));
}

#[test]
fn data_error_exits_4_with_empty_stdout() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "ok.j2", "hi");

    rtpl_cmd()
        .args(["-t", &template, "-d", "{not json"])
        .assert()
        .failure()
        .code(4)
        .stdout("")
        .stderr(predicate::str::contains("data error"));
}

#[test]
fn render_error_exits_5_with_empty_stdout() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "ok.j2", "prefix {{ missing }}");

    rtpl_cmd()
        .args(["-t", &template, "-d", "{}"])
        .assert()
        .failure()
        .code(5)
        .stdout("")
        .stderr(predicate::str::contains("render error"));
}

#[test]
fn unreadable_template_exits_1() {
    rtpl_cmd()
        .args(["-t", "/no/such/template.j2", "-d", "{}"])
        .assert()
        .failure()
        .code(1)
        .stdout("");
}

#[test]
fn missing_data_source_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "ok.j2", "hi");

    rtpl_cmd()
        .args(["-t", &template])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn writes_output_file_instead_of_stdout() {
    let dir = TempDir::new().unwrap();
    let template = write_template(&dir, "test.j2", "out: {{ v }}");
    let output = dir.path().join("result.txt");

    rtpl_cmd()
        .args([
            "-t",
            &template,
            "-d",
            r#"{"v":42}"#,
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout("");

    assert_eq!(fs::read_to_string(&output).unwrap(), "out: 42");
}

#[test]
fn trim_blocks_flag_changes_newline_handling() {
    let dir = TempDir::new().unwrap();
    let template = write_template(
        &dir,
        "loop.j2",
        "{% for x in xs %}\n{{ x }}\n{% endfor %}\n",
    );
    let data = r#"{"xs":[1,2]}"#;

    rtpl_cmd()
        .args(["-t", &template, "-d", data, "--trim-blocks"])
        .assert()
        .success()
        .stdout("1\n2\n");

    rtpl_cmd()
        .args(["-t", &template, "-d", data])
        .assert()
        .success()
        .stdout("\n1\n\n2\n\n");
}

#[test]
fn max_depth_flag_rejects_deep_nesting() {
    let dir = TempDir::new().unwrap();
    let template = write_template(
        &dir,
        "deep.j2",
        "{% if a %}{% if a %}x{% endif %}{% endif %}",
    );

    rtpl_cmd()
        .args(["-t", &template, "-d", r#"{"a":true}"#, "--max-depth", "1"])
        .assert()
        .failure()
        .code(3);

    rtpl_cmd()
        .args(["-t", &template, "-d", r#"{"a":true}"#])
        .assert()
        .success()
        .stdout("x");
}

#[test]
fn help_names_the_tool() {
    rtpl_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--template"))
        .stdout(predicate::str::contains("--data-file"));
}
