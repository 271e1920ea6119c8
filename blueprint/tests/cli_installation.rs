//! CLI tests for the `blueprint` binary.
//!
//! Spawns the binary against a temporary storage directory and checks
//! stdout and exit codes.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use blueprint::exit_codes;

fn blueprint(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_blueprint"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run blueprint")
}

fn write_config(dir: &Path) {
    fs::write(
        dir.join("blueprint.toml"),
        "root = \"remote\"\nidentity = \"me@example.com\"\nproduct = \"tool\"\n",
    )
    .expect("config");
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn whereis_without_installation_exits_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(temp.path());

    let output = blueprint(temp.path(), &["whereis", "--user"]);

    assert_eq!(output.status.code(), Some(exit_codes::NOT_FOUND));
}

#[test]
fn install_then_whereis_reports_user_folder() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(temp.path());

    let output = blueprint(temp.path(), &["install"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "/Users/me@example.com/.tool\n");
    assert!(temp.path().join("remote/Users/me@example.com/.tool").is_dir());

    let global_only = blueprint(temp.path(), &["whereis"]);
    assert_eq!(global_only.status.code(), Some(exit_codes::NOT_FOUND));

    let output = blueprint(temp.path(), &["whereis", "--user"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "/Users/me@example.com/.tool\n");
}

#[test]
fn existing_lists_each_installation_with_scope() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(temp.path());
    assert!(blueprint(temp.path(), &["install"]).status.success());
    assert!(blueprint(temp.path(), &["install", "--global"]).status.success());

    let output = blueprint(temp.path(), &["existing"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        stdout(&output),
        "/Users/me@example.com/.tool\tuser\n/Applications/tool\tglobal\n"
    );
}

#[test]
fn upload_show_and_files_work_together() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(temp.path());
    assert!(blueprint(temp.path(), &["install"]).status.success());
    fs::write(temp.path().join("local.yml"), "version: 1\nname: demo\n").expect("local");

    let output = blueprint(temp.path(), &["upload", "settings/demo.yml", "local.yml"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "/Users/me@example.com/.tool/settings/demo.yml\n");

    let output = blueprint(temp.path(), &["show", "settings/demo.yml"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let shown: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json");
    assert_eq!(shown, serde_json::json!({"version": 1, "name": "demo"}));

    let output = blueprint(temp.path(), &["files"]);
    assert_eq!(stdout(&output), "settings/demo.yml\n");
}

#[test]
fn show_unknown_extension_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(temp.path());
    assert!(blueprint(temp.path(), &["install", "--global"]).status.success());

    let output = blueprint(temp.path(), &["show", "notes.txt"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn publish_uploads_artifact_and_version() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(temp.path());
    assert!(blueprint(temp.path(), &["install", "--global"]).status.success());
    fs::write(temp.path().join("tool-0.2.0.tar.gz"), b"archive").expect("artifact");

    let output = blueprint(
        temp.path(),
        &["publish", "--release", "0.2.0", "tool-0.2.0.tar.gz"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "/Applications/tool/wheels/tool-0.2.0.tar.gz\n");
    let recorded = fs::read_to_string(temp.path().join("remote/Applications/tool/version.json"))
        .expect("version.json");
    assert!(recorded.contains("\"version\": \"0.2.0\""), "{recorded}");
}

#[test]
fn init_writes_config_that_later_commands_use() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = blueprint(
        temp.path(),
        &["--product", "tool", "init", "--root", "remote", "--identity", "a@example.com"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let written = fs::read_to_string(temp.path().join("blueprint.toml")).expect("config");
    assert!(written.contains("identity = \"a@example.com\""), "{written}");

    let output = blueprint(temp.path(), &["install"]);
    assert_eq!(stdout(&output), "/Users/a@example.com/.tool\n");
    assert!(temp.path().join("remote/Users/a@example.com/.tool").is_dir());

    let again = blueprint(temp.path(), &["init"]);
    assert_eq!(again.status.code(), Some(exit_codes::INVALID));
    let forced = blueprint(temp.path(), &["init", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[test]
fn uninstall_removes_the_current_installation() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(temp.path());
    assert!(blueprint(temp.path(), &["install", "--global"]).status.success());
    fs::write(temp.path().join("local.yml"), "name: demo\n").expect("local");
    assert!(blueprint(temp.path(), &["upload", "demo.yml", "local.yml"]).status.success());

    let output = blueprint(temp.path(), &["uninstall"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "/Applications/tool\n");
    assert!(!temp.path().join("remote/Applications/tool").exists());
    let output = blueprint(temp.path(), &["uninstall"]);
    assert_eq!(output.status.code(), Some(exit_codes::NOT_FOUND));
}
