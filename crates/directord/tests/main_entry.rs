//! End-to-end checks of the `directord` binary.

use std::net::TcpListener;

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_server_flags() {
    Command::cargo_bin("directord")
        .expect("binary built")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--enable-ue-python"));
}

#[test]
fn invalid_port_is_rejected() {
    Command::cargo_bin("directord")
        .expect("binary built")
        .args(["--port", "not-a-port"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--port"));
}

#[test]
fn occupied_port_exits_with_bind_error() {
    let reserved = TcpListener::bind(("127.0.0.1", 0)).expect("reserve port");
    let port = reserved.local_addr().expect("reserved address").port();

    Command::cargo_bin("directord")
        .expect("binary built")
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to bind"));
    drop(reserved);
}
