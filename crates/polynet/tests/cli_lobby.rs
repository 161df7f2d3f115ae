#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader, Read};
use std::net::SocketAddr;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

struct Server {
    child: Child,
    addr: SocketAddr,
}

impl Server {
    fn start() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_polynet"))
            .args(["--log-level", "error", "--format", "json"])
            .args(["serve", "--bind", "127.0.0.1:0"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("serve command should start");

        let stdout = child.stdout.take().expect("stdout should be piped");
        let mut line = String::new();
        BufReader::new(stdout)
            .read_line(&mut line)
            .expect("serve should print its address");
        let value: serde_json::Value =
            serde_json::from_str(&line).expect("listening line should be json");
        let addr = value["addr"]
            .as_str()
            .and_then(|addr| addr.parse().ok())
            .expect("listening line should carry the address");
        assert_eq!(value["protocol_version"], "0.1.0");

        Self { child, addr }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn polynet(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_polynet"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .output()
        .expect("polynet should run")
}

fn lobbies_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be json")
}

#[test]
fn created_lobby_is_listed_by_later_clients() {
    let server = Server::start();
    let addr = server.addr.to_string();

    let created = lobbies_json(&polynet(&["lobbies", &addr, "--name", "ada", "--create", "3"]));
    assert_eq!(created["lobbies"][0]["id"], 1);
    assert_eq!(created["lobbies"][0]["max_players"], 3);
    assert_eq!(created["lobbies"][0]["players"], serde_json::json!([]));

    let listed = lobbies_json(&polynet(&["lobbies", &addr]));
    assert_eq!(listed["lobbies"].as_array().map(Vec::len), Some(1));
}

#[test]
fn watch_prints_pushed_changes() {
    let server = Server::start();
    let addr = server.addr.to_string();

    let mut watcher = Command::new(env!("CARGO_BIN_EXE_polynet"))
        .args(["--log-level", "error", "--format", "json"])
        .args(["watch", &addr, "--name", "watcher", "--count", "1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("watch command should start");

    // The watcher only sees changes made after it registered, so keep
    // creating lobbies until it reports one.
    let deadline = Instant::now() + Duration::from_secs(5);
    let status = loop {
        if let Some(status) = watcher.try_wait().expect("watch should be pollable") {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = watcher.kill();
            panic!("watch did not exit");
        }
        let _ = polynet(&["lobbies", &addr, "--create", "2"]);
        thread::sleep(Duration::from_millis(50));
    };
    assert!(status.success());

    let mut stdout = String::new();
    watcher
        .stdout
        .take()
        .expect("stdout should be piped")
        .read_to_string(&mut stdout)
        .expect("watch output should be readable");
    let event: serde_json::Value =
        serde_json::from_str(stdout.lines().next().expect("one change printed"))
            .expect("change should be json");
    assert_eq!(event["event"], "updated");
    assert_eq!(event["lobby"]["max_players"], 2);
}

#[test]
fn refused_connection_returns_transport_code() {
    let vacant = std::net::TcpListener::bind("127.0.0.1:0").expect("vacant should bind");
    let addr = vacant.local_addr().expect("vacant has an address").to_string();
    drop(vacant);

    let output = polynet(&["lobbies", &addr]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn invalid_duration_returns_usage_code() {
    let output = polynet(&["serve", "--bind", "127.0.0.1:0", "--challenge-interval", "soon"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid challenge interval"));
}

#[test]
fn version_reports_package_version() {
    let output = polynet(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("polynet {}", env!("CARGO_PKG_VERSION"))
    );
}
