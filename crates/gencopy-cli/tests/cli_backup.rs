mod common;

use std::fs;
use std::path::Path;
use std::time::Duration;

use common::{run_with_timeout, TestContext};
use filetime::{set_file_mtime, FileTime};

const TIMEOUT: Duration = Duration::from_secs(30);

fn versions_in(dir: &Path, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.starts_with(prefix))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn assert_success(output: &std::process::Output) {
    assert!(
        output.status.success(),
        "gencopy failed ({:?})\nstdout:\n{}\nstderr:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn once_backs_up_directory_files() {
    let ctx = TestContext::new();
    let data = ctx.workspace.join("data");
    fs::create_dir_all(data.join("nested")).expect("data dir");
    fs::write(data.join("report.csv"), b"a,b\n1,2\n").expect("write report");
    fs::write(data.join("notes.txt"), b"hello").expect("write notes");
    fs::write(data.join("scratch.tmp"), b"skip me").expect("write scratch");
    fs::write(data.join("nested").join("deep.txt"), b"not copied").expect("write nested");

    let mut cmd = ctx.command();
    cmd.args(["--once", "-g", "3", "-x", "*.tmp"]).arg(&data);
    let output = run_with_timeout(cmd, TIMEOUT);
    assert_success(&output);

    let backup = data.join("_old");
    let reports = versions_in(&backup, "report_");
    assert_eq!(reports.len(), 1, "{reports:?}");
    assert!(reports[0].ends_with(".csv"));
    assert_eq!(
        fs::read(backup.join(&reports[0])).expect("read version"),
        b"a,b\n1,2\n"
    );
    assert_eq!(versions_in(&backup, "notes_").len(), 1);
    assert!(versions_in(&backup, "scratch_").is_empty());
    assert!(versions_in(&backup, "deep_").is_empty());
    assert!(!data.join("nested").join("_old").exists());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 copied"), "stdout:\n{stdout}");
}

#[test]
fn unchanged_file_is_not_copied_twice() {
    let ctx = TestContext::new();
    let file = ctx.workspace.join("ledger.txt");
    fs::write(&file, b"v1").expect("write ledger");
    set_file_mtime(&file, FileTime::from_unix_time(1_600_000_000, 0)).expect("set mtime");
    let vault = ctx.workspace.join("vault");

    for _ in 0..2 {
        let mut cmd = ctx.command();
        cmd.arg("--once").arg("-b").arg(&vault).arg(&file);
        assert_success(&run_with_timeout(cmd, TIMEOUT));
    }

    assert_eq!(versions_in(&vault, "ledger_").len(), 1);
    assert!(!ctx.workspace.join("_old").exists());
}

#[test]
fn job_list_and_settings_file_are_used() {
    let ctx = TestContext::new();
    let a = ctx.workspace.join("a.log");
    let b = ctx.workspace.join("b.log");
    fs::write(&a, b"a").expect("write a");
    fs::write(&b, b"b").expect("write b");

    let jobs = ctx.workspace.join("jobs.csv");
    fs::write(
        &jobs,
        format!("# path,generation,destination\n{},2,backups\n", a.display()),
    )
    .expect("write jobs");
    fs::write(
        ctx.config_dir.join("gencopy.toml"),
        format!(
            "inputs = [{:?}]\njob_list = {:?}\n",
            b.display().to_string(),
            jobs.display().to_string()
        ),
    )
    .expect("write settings");

    let mut cmd = ctx.command();
    cmd.arg("--once");
    assert_success(&run_with_timeout(cmd, TIMEOUT));

    assert_eq!(versions_in(&ctx.workspace.join("backups"), "a_").len(), 1);
    assert_eq!(versions_in(&ctx.workspace.join("_old"), "b_").len(), 1);
}

#[test]
fn failed_file_sets_exit_status() {
    let ctx = TestContext::new();
    let good = ctx.workspace.join("good.txt");
    fs::write(&good, b"ok").expect("write good");
    let missing = ctx.workspace.join("missing.txt");

    let mut cmd = ctx.command();
    cmd.arg("--once").arg(&missing).arg(&good);
    let output = run_with_timeout(cmd, TIMEOUT);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.txt"), "stderr:\n{stderr}");
    assert_eq!(versions_in(&ctx.workspace.join("_old"), "good_").len(), 1);
}

#[test]
fn no_inputs_is_a_usage_error() {
    let ctx = TestContext::new();
    let mut cmd = ctx.command();
    cmd.arg("--once");
    let output = run_with_timeout(cmd, TIMEOUT);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nothing to back up"), "stderr:\n{stderr}");
}
