#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

impl CmdResult {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Parse every stdout line as JSON.
    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                serde_json::from_str(l).unwrap_or_else(|e| {
                    panic!("stdout line is not JSON ({e}): {l}; log: {}", self.log_path.display())
                })
            })
            .collect()
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_ubp") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "ubp.exe" } else { "ubp" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve ubp binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_with_env(case_name, args, &[])
}

pub fn run_cli_case_with_env(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let root = std::env::temp_dir().join("ubp-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .env_remove("UBP_OUTPUT_FORMAT")
        .env("UBP_CONFIG", root.join("absent-config.toml"))
        .env("UBP_ACTIVITY_LOG", root.join("activity.jsonl"));
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("execute ubp command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("env={env:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Stand-in for the ubus CLI: a shell script that answers each method from
/// `<method>.json` in its directory, fails it when `<method>.exit` exists,
/// and appends every method it is asked for to `calls.log`.
pub struct FakeUbus {
    dir: TempDir,
}

impl FakeUbus {
    #[cfg(unix)]
    pub fn new() -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("create fake ubus dir");
        let script = dir.path().join("ubus");
        fs::write(
            &script,
            r#"#!/bin/sh
dir=$(dirname "$0")
method="$5"
echo "$method" >> "$dir/calls.log"
if [ -f "$dir/$method.exit" ]; then
  echo "Command failed: scripted failure" >&2
  exit "$(cat "$dir/$method.exit")"
fi
if [ -f "$dir/$method.json" ]; then
  cat "$dir/$method.json"
else
  echo '{}'
fi
"#,
        )
        .expect("write fake ubus");
        let mut perms = fs::metadata(&script).expect("stat fake ubus").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).expect("chmod fake ubus");
        Self { dir }
    }

    /// Agent reporting the given installed version and service state.
    #[cfg(unix)]
    pub fn healthy(installed: &str, running: bool, update_available: bool) -> Self {
        let fake = Self::new();
        fake.reply(
            "get_status",
            &serde_json::json!({
                "available": true,
                "installed_version": installed,
                "running_status": u8::from(running),
                "update_available": update_available,
            })
            .to_string(),
        );
        fake
    }

    pub fn reply(&self, method: &str, body: &str) {
        fs::write(self.dir.path().join(format!("{method}.json")), body).expect("write reply");
    }

    pub fn fail(&self, method: &str, exit_code: i32) {
        fs::write(
            self.dir.path().join(format!("{method}.exit")),
            exit_code.to_string(),
        )
        .expect("write exit code");
    }

    pub fn bin(&self) -> String {
        self.dir.path().join("ubus").to_string_lossy().into_owned()
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn activity_log(&self) -> PathBuf {
        self.dir.path().join("activity.jsonl")
    }

    /// Methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls().iter().filter(|m| *m == method).count()
    }

    /// Run `ubp` against this agent with JSON output and a private activity log.
    pub fn run(&self, case_name: &str, args: &[&str]) -> CmdResult {
        let bin = self.bin();
        let log = self.activity_log().to_string_lossy().into_owned();
        run_cli_case_with_env(
            case_name,
            args,
            &[
                ("UBP_AGENT_UBUS_BIN", bin.as_str()),
                ("UBP_ACTIVITY_LOG", log.as_str()),
                ("UBP_OUTPUT_FORMAT", "json"),
            ],
        )
    }
}
