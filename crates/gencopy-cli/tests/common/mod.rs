use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::tempdir;

use wait_timeout::ChildExt;

pub struct TestContext {
    pub _work: tempfile::TempDir,
    pub workspace: PathBuf,
    pub config_dir: PathBuf,
    pub cli_bin: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let work = tempdir().expect("tempdir");
        let workspace = work.path().to_path_buf();

        let config_dir = workspace.join("config");
        fs::create_dir_all(&config_dir).expect("config dir");

        Self {
            _work: work,
            workspace,
            config_dir,
            cli_bin: PathBuf::from(env!("CARGO_BIN_EXE_gencopy")),
        }
    }

    /// A `gencopy` command isolated from the user's settings file.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cli_bin);
        cmd.arg("--config-dir").arg(&self.config_dir);
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> std::process::Output {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().expect("spawn command");

    match child.wait_timeout(timeout).expect("wait for process") {
        Some(_status) => child
            .wait_with_output()
            .expect("collect command output after completion"),
        None => {
            let _ = child.kill();
            let output = child
                .wait_with_output()
                .expect("collect output after killing command");
            panic!(
                "command timed out after {:?}\nstdout:\n{}\nstderr:\n{}",
                timeout,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
    }
}
