//! End-to-end protocol tests against a live listener.
//!
//! Wires the real dispatcher behind the real TCP transport on an ephemeral
//! port and drives it with the real client, exercising the full
//! request/response path a deployed daemon serves.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use wpd_config::{DataLayout, Endpoint};
use wpdaemon::{
    CommandDispatcher, DaemonClient, DispatchConnectionHandler, ListenerHandle, ProxyBinary,
    SocketListener,
};

struct LiveDaemon {
    _dir: tempfile::TempDir,
    layout: DataLayout,
    client: DaemonClient,
    handle: Option<ListenerHandle>,
}

impl LiveDaemon {
    fn start() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = DataLayout::rooted_at(dir.path());
        layout.prepare().expect("prepare layout");
        write_fake_proxy(&layout.binary_path(), "sleep 30");

        let dispatcher = Arc::new(CommandDispatcher::new(
            &layout,
            ProxyBinary::at(layout.binary_path()),
        ));
        let listener = SocketListener::bind(&Endpoint::loopback(0)).expect("bind listener");
        let addr = listener.local_addr().expect("local address");
        let handler = Arc::new(DispatchConnectionHandler::new(dispatcher));
        let handle = listener.start(handler).expect("start listener");

        let client = DaemonClient::new(Endpoint::new(addr.ip().to_string(), addr.port()));
        Self {
            _dir: dir,
            layout,
            client,
            handle: Some(handle),
        }
    }

    fn add_config(&self, name: &str) {
        std::fs::write(self.layout.configs_dir().join(name), "[Interface]\n")
            .expect("write config");
    }

    fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
            handle.join().expect("join listener");
        }
    }
}

fn write_fake_proxy(path: &Path, body: &str) {
    // The daemon probes `wireproxy -v` for a version string before it ever
    // launches the proxy, so the stand-in must answer `-v` promptly the way a
    // real binary would; otherwise the probe blocks on `body` (e.g. `sleep
    // 30`) and the client's read times out before spin_up can reply.
    std::fs::write(
        path,
        format!("#!/bin/sh\nif [ \"$1\" = \"-v\" ]; then echo 'wireproxy (fake)'; exit 0; fi\n{body}\n"),
    )
    .expect("write script");
    let mut permissions = std::fs::metadata(path).expect("metadata").permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions).expect("chmod");
}

#[test]
fn daemon_is_discoverable_over_the_wire() {
    let daemon = LiveDaemon::start();
    assert!(daemon.client.is_daemon_running());

    let identity = daemon.client.send("whoami:").expect("whoami");
    assert_eq!(identity.command, "whoami");
    let result = identity.result.expect("identity payload");
    assert_eq!(result["implementation"], "Rust");
    daemon.stop();
}

#[test]
fn listing_and_start_validation_over_the_wire() {
    let daemon = LiveDaemon::start();
    daemon.add_config("eu-west.conf");
    daemon.add_config("us-east.conf");

    let listing = daemon.client.send("available_confs:").expect("listing");
    let result = listing.result.expect("listing payload");
    assert_eq!(result["count"], 2);
    assert_eq!(result["configs"][0], "eu-west.conf");

    let rejected = daemon.client.send("spin_up:absent").expect("spin_up");
    assert_eq!(
        rejected.error.as_deref(),
        Some("Configuration not found: absent.conf")
    );

    let snapshot = daemon.client.send("state:").expect("state");
    assert_eq!(snapshot.result.expect("state payload")["running"], false);
    daemon.stop();
}

#[test]
fn full_session_lifecycle_over_the_wire() {
    let daemon = LiveDaemon::start();
    daemon.add_config("demo.conf");

    let started = daemon.client.send("spin_up:demo").expect("spin_up");
    assert_eq!(started.error, None, "spin_up failed: {started:?}");
    let payload = started.result.expect("start payload");
    assert_eq!(payload["status"], "running");
    assert_eq!(payload["config"], "demo.conf");
    let pid = payload["pid"].as_u64().expect("pid");

    let snapshot = daemon.client.send("state:").expect("state");
    let state = snapshot.result.expect("state payload");
    assert_eq!(state["running"], true);
    assert_eq!(state["pid"].as_u64(), Some(pid));

    let stopped = daemon.client.send("spin_down:").expect("spin_down");
    assert_eq!(stopped.error, None, "spin_down failed: {stopped:?}");
    let payload = stopped.result.expect("stop payload");
    assert_eq!(payload["status"], "stopped");
    assert_eq!(payload["previous_config"], "demo.conf");

    let after = daemon.client.send("state:").expect("state after stop");
    assert_eq!(after.result.expect("state payload")["running"], false);
    daemon.stop();
}

#[test]
fn concurrent_clients_are_serialized_by_the_dispatcher() {
    let daemon = LiveDaemon::start();
    daemon.add_config("demo.conf");

    let mut workers = Vec::new();
    for _ in 0..4 {
        let client = daemon.client.clone();
        workers.push(std::thread::spawn(move || {
            client.send("spin_up:demo").expect("spin_up")
        }));
    }
    let responses: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().expect("worker join"))
        .collect();

    let successes = responses
        .iter()
        .filter(|response| response.error.is_none())
        .count();
    assert_eq!(successes, 1, "exactly one spin_up may win: {responses:?}");
    for failure in responses.iter().filter(|response| response.error.is_some()) {
        let error = failure.error.as_deref().expect("error text");
        assert!(
            error.starts_with("WireProxy is already running"),
            "unexpected error {error}"
        );
    }

    let stopped = daemon.client.send("spin_down:").expect("spin_down");
    assert_eq!(stopped.error, None);
    daemon.stop();
}
