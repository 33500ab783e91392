use std::fs;
use std::time::Duration;

use tempfile::tempdir;

#[allow(deprecated)]
fn cargo_bin() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("feed_replayer").expect("binary not built")
}

fn stderr_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stderr.clone()).unwrap()
}

#[test]
fn overwrite_replay_leaves_final_batch_on_disk() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("feed.dat");
    fs::write(&input, "h1\nh2\nh3\nh4\nr1\nr2\nr3\n").unwrap();

    cargo_bin()
        .arg(&input)
        .arg("--folder")
        .arg(dir.path())
        .arg("--out_file")
        .arg("out.dat")
        .arg("--overwrite")
        .arg("--delay")
        .arg("0")
        .timeout(Duration::from_secs(10))
        .assert()
        .success();

    let written = fs::read_to_string(dir.path().join("out.dat")).unwrap();
    assert_eq!(written, "h1\nh2\nh3\nh4\nr3\n");
}

#[test]
fn run_file_overrides_command_line_increment() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("feed.dat");
    let contents = "h1\nh2\nh3\nh4\nr1\nr2\nr3\n";
    fs::write(&input, contents).unwrap();
    let run_file = dir.path().join("run.txt");
    fs::write(&run_file, "increment = 5\n# single batch, no second handshake\n").unwrap();

    cargo_bin()
        .arg(&input)
        .arg("--folder")
        .arg(dir.path())
        .arg("--out_file")
        .arg("out.dat")
        .arg("--delay")
        .arg("0")
        .arg("--run_file")
        .arg(&run_file)
        .timeout(Duration::from_secs(10))
        .assert()
        .success();

    let written = fs::read_to_string(dir.path().join("out.dat")).unwrap();
    assert_eq!(written, contents);
}

#[test]
fn missing_input_ends_normally_with_logged_error() {
    let dir = tempdir().unwrap();
    let assert = cargo_bin()
        .arg(dir.path().join("absent.dat"))
        .timeout(Duration::from_secs(10))
        .assert()
        .success();
    assert!(stderr_of(assert).contains("input file not found"));
}

#[test]
fn input_output_collision_is_refused_before_writing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("feed.dat");
    let contents = "h1\nh2\nh3\nh4\nr1\n";
    fs::write(&input, contents).unwrap();

    let assert = cargo_bin()
        .arg(&input)
        .arg("--folder")
        .arg(dir.path())
        .arg("--overwrite")
        .arg("--delay")
        .arg("0")
        .timeout(Duration::from_secs(10))
        .assert()
        .success();

    assert!(stderr_of(assert).contains("refusing to overwrite input with output"));
    assert_eq!(fs::read_to_string(&input).unwrap(), contents);
}

#[test]
fn missing_run_file_ends_normally_with_logged_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("feed.dat");
    fs::write(&input, "h1\nh2\nh3\nh4\nr1\n").unwrap();

    let assert = cargo_bin()
        .arg(&input)
        .arg("--run_file")
        .arg(dir.path().join("absent-run.txt"))
        .timeout(Duration::from_secs(10))
        .assert()
        .success();
    assert!(stderr_of(assert).contains("run file not found"));
    assert!(!dir.path().join("out.dat").exists());
}

#[test]
fn unparseable_run_file_value_ends_normally_with_logged_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("feed.dat");
    fs::write(&input, "h1\nh2\nh3\nh4\nr1\n").unwrap();
    let run_file = dir.path().join("run.txt");
    fs::write(&run_file, "header_lines = nope\n").unwrap();

    let assert = cargo_bin()
        .arg(&input)
        .arg("--folder")
        .arg(dir.path())
        .arg("--out_file")
        .arg("out.dat")
        .arg("--run_file")
        .arg(&run_file)
        .timeout(Duration::from_secs(10))
        .assert()
        .success();
    assert!(stderr_of(assert).contains("not a valid integer"));
    assert!(!dir.path().join("out.dat").exists());
}

#[test]
fn underscore_flag_spellings_are_accepted() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("feed.dat");
    fs::write(&input, "h1\nh2\nr1\n\nr2\n").unwrap();
    let run_file = dir.path().join("run.txt");
    fs::write(&run_file, "increment = 5\n").unwrap();

    cargo_bin()
        .arg(&input)
        .arg("--folder")
        .arg(dir.path())
        .arg("--out_file")
        .arg("out.dat")
        .arg("--header_lines")
        .arg("2")
        .arg("--log_level")
        .arg("2")
        .arg("--skip_empty")
        .arg("--run_file")
        .arg(&run_file)
        .arg("--delay")
        .arg("0")
        .timeout(Duration::from_secs(10))
        .assert()
        .success();

    let written = fs::read_to_string(dir.path().join("out.dat")).unwrap();
    assert_eq!(written, "h1\nh2\nr1\nr2\n");
}

#[test]
fn version_flag_prints_package_version() {
    let assert = cargo_bin().arg("--version").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
