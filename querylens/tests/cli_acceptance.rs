use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn write_config(&self, content: &str) {
        let dir = self.xdg_config.join("querylens");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), content).expect("failed to write config");
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("querylens"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute querylens: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "querylens {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

/// Answer a single HTTP request with `body`; returns the base URL.
fn serve_snapshot_once(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{}", addr)
}

const FINISHED_QUERY: &str = r#"{
  "queryId": "20230101_000000_00007_abc",
  "state": "FINISHED",
  "finalQueryInfo": true,
  "query": "SELECT 42",
  "session": {"user": "cli-test"},
  "queryStats": {"elapsedTime": "2.00s", "totalCpuTime": "1.00s"},
  "outputStage": {
    "stageId": "20230101_000000_00007_abc.0",
    "state": "FINISHED",
    "plan": {},
    "tasks": [{"taskStatus": {"taskId": "20230101_000000_00007_abc.0.0", "state": "FINISHED"}}]
  }
}"#;

#[test]
fn help_lists_options() {
    let env = CliTestEnv::new();
    let output = run_bin(&env, &["--help"]);
    assert_success(&["--help"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--server", "--interval-ms", "--tasks", "--once"] {
        assert!(stdout.contains(flag), "missing {flag} in help:\n{stdout}");
    }
}

#[test]
fn once_prints_dashboard_for_finished_query() {
    let env = CliTestEnv::new();
    let server = serve_snapshot_once(FINISHED_QUERY);
    let args = [
        "20230101_000000_00007_abc",
        "--server",
        server.as_str(),
        "--once",
        "--tasks",
        "all",
    ];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Query 20230101_000000_00007_abc  FINISHED"));
    assert!(stdout.contains("User cli-test"));
    assert!(stdout.contains("Tasks: All"));
    assert!(
        env.xdg_state.join("querylens").exists(),
        "log directory should be created under XDG_STATE_HOME"
    );
}

#[test]
fn once_fails_when_coordinator_unreachable() {
    let env = CliTestEnv::new();
    // Bind then drop to get a port nobody listens on
    let port = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("failed to reserve port")
        .port();
    let server = format!("http://127.0.0.1:{port}");

    let output = run_bin(&env, &["q", "--server", &server, "--once"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to fetch query q"),
        "unexpected stderr:\n{stderr}"
    );
}

#[test]
fn rejects_unknown_task_filter() {
    let env = CliTestEnv::new();
    let output = run_bin(&env, &["q", "--tasks", "sideways", "--once"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown task filter"), "unexpected stderr:\n{stderr}");
}

#[test]
fn rejects_invalid_config_file() {
    let env = CliTestEnv::new();
    env.write_config("[monitor]\nrefresh_interval_ms = 0\n");

    let output = run_bin(&env, &["q", "--once"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to load configuration"),
        "unexpected stderr:\n{stderr}"
    );
}

#[test]
fn live_mode_exits_after_final_snapshot_with_stdin_open() {
    let env = CliTestEnv::new();
    let server = serve_snapshot_once(FINISHED_QUERY);
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("querylens"));

    // Stdin stays piped and unwritten for the whole run
    let mut child = Command::new(bin_path)
        .args(["20230101_000000_00007_abc", "--server", server.as_str()])
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to execute querylens: {e}"));
    let _stdin = child.stdin.take();

    let deadline = Instant::now() + Duration::from_secs(15);
    let status = loop {
        if let Some(status) = child.try_wait().expect("failed to poll child") {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("querylens kept running after the query finished");
        }
        thread::sleep(Duration::from_millis(50));
    };
    assert!(status.success(), "unexpected exit status: {status}");

    let mut stdout = String::new();
    child
        .stdout
        .take()
        .expect("stdout not captured")
        .read_to_string(&mut stdout)
        .expect("failed to read stdout");
    assert!(stdout.contains("Query 20230101_000000_00007_abc  FINISHED"));
}
