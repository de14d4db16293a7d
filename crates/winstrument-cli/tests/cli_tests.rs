mod common;
use common::TestFixture;
use predicates::prelude::*;

#[test]
fn test_run_without_engine_fails() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("run")
        .arg("C:\\Tools\\app.exe")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:").and(predicate::str::contains("--replay")));
}

#[test]
fn test_run_then_show_grep() {
    let fixture = TestFixture::new();
    fixture.run_app(&["socket"]).expect("run failed");

    let output = fixture
        .command()
        .arg("show")
        .arg("socket")
        .arg("--format")
        .arg("grep")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("socket|"));
    assert!(lines[0].ends_with("|C:\\Tools\\app.exe|function:connect|dest:10.0.0.1:443"));
    assert!(lines[1].contains("|bytes:512"));
}

#[test]
fn test_unloaded_probe_output_is_not_stored() {
    let fixture = TestFixture::new();
    fixture.run_app(&["socket"]).expect("run failed");

    fixture
        .command()
        .arg("show")
        .arg("pipes")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No stored output for pipes"));
}

#[test]
fn test_show_json_is_flattened() {
    let fixture = TestFixture::new();
    fixture.run_app(&["socket", "pipes"]).expect("run failed");

    let output = fixture
        .command()
        .arg("show")
        .arg("pipes")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = parsed.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["probe"], "pipes");
    assert_eq!(rows[0]["name"], "\\\\.\\pipe\\app-ipc");
}

#[test]
fn test_show_table_ellipsizes_target() {
    let fixture = TestFixture::new();
    fixture.run_app(&["socket"]).expect("run failed");

    fixture
        .command()
        .arg("show")
        .arg("socket")
        .assert()
        .success()
        .stdout(predicate::str::contains("C:/.../app.exe"));
}

#[test]
fn test_export_all_writes_every_probe() {
    let fixture = TestFixture::new();
    fixture.run_app(&["socket", "pipes"]).expect("run failed");
    let file = fixture.path("all.txt");

    fixture
        .command()
        .arg("export-all")
        .arg(&file)
        .arg("--format")
        .arg("grep")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 messages"));

    let content = std::fs::read_to_string(&file).unwrap();
    assert_eq!(content.lines().filter(|l| l.starts_with("socket|")).count(), 2);
    assert_eq!(content.lines().filter(|l| l.starts_with("pipes|")).count(), 1);
}

#[test]
fn test_export_single_probe() {
    let fixture = TestFixture::new();
    fixture.run_app(&["socket"]).expect("run failed");
    let file = fixture.path("socket.json");

    fixture
        .command()
        .arg("export")
        .arg("socket")
        .arg(&file)
        .arg("--format")
        .arg("json")
        .assert()
        .success();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
}

#[test]
fn test_clear_removes_output() {
    let fixture = TestFixture::new();
    fixture.run_app(&["socket"]).expect("run failed");

    fixture
        .command()
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 2 messages"));

    fixture
        .command()
        .arg("show")
        .arg("socket")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_config_set_and_get() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["config", "set", "core", "target", "C:\\Tools\\app.exe"])
        .assert()
        .success();

    fixture
        .command()
        .args(["config", "get", "core", "target"])
        .assert()
        .success()
        .stdout("target=C:\\Tools\\app.exe\n");

    fixture
        .command()
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("verbosity=0"));
}

#[test]
fn test_run_uses_configured_target() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["config", "set", "core", "target", "C:\\Tools\\app.exe"])
        .assert()
        .success();

    fixture
        .command()
        .arg("run")
        .arg("--replay")
        .arg(fixture.recording("app.json"))
        .arg("--probe")
        .arg("socket")
        .assert()
        .success()
        .stdout(predicate::str::contains("socket       2 messages"));
}

#[test]
fn test_missing_target_finishes_cleanly() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("run")
        .arg("--replay")
        .arg(fixture.recording("app.json"))
        .arg("--probe")
        .arg("socket")
        .arg("C:\\missing.exe")
        .assert()
        .success()
        .stdout(predicate::str::contains("socket       0 messages"));
}

#[test]
fn test_probes_lists_builtins() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("probes")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("file_rw")
                .and(predicate::str::contains("com_hijack"))
                .and(predicate::str::contains("impersonate")),
        );
}

#[test]
fn test_info_reads_metadata_file() {
    let fixture = TestFixture::new();
    std::fs::write(
        fixture.data_dir().join("probes.toml"),
        "[socket]\ndescription = \"Outbound Winsock connections\"\n",
    )
    .unwrap();

    fixture
        .command()
        .args(["info", "socket"])
        .assert()
        .success()
        .stdout("Outbound Winsock connections\n");

    fixture
        .command()
        .args(["info", "nosuchprobe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown probe: nosuchprobe"));
}
