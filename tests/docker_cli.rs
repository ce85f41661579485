//! Integration tests for the docker-backed runtime.
//!
//! These require a running Docker daemon and are marked `#[ignore]`.
//! Run with: `cargo test -- --ignored`

use nodefleet::config::Config;
use nodefleet::docker::{ContainerRuntime, ContainerSpec, DockerCli, ensure_available};
use nodefleet::fleet::FleetManager;
use nodefleet::logsink::FsLogSink;

const TEST_PREFIX: &str = "nodefleet-itest";
const TEST_IMAGE: &str = "alpine:3.20";

fn itest_spec(slot: u32, node_id: u64) -> ContainerSpec {
    ContainerSpec {
        name: format!("{TEST_PREFIX}-{slot}"),
        image: TEST_IMAGE.into(),
        env: vec![("NODE_ID".into(), node_id.to_string())],
        binds: vec![],
        extra_args: vec![],
    }
}

/// Remove leftovers from an earlier failed run.
fn cleanup(cli: &DockerCli) {
    if let Ok(names) = cli.list(TEST_PREFIX) {
        for name in names {
            let _ = cli.remove(&name, true);
        }
    }
}

#[test]
#[ignore]
fn daemon_is_reachable() {
    let version = ensure_available().expect("docker daemon should be reachable");
    assert!(!version.is_empty());
}

#[test]
#[ignore]
fn create_inspect_remove_roundtrip() {
    let cli = DockerCli::new();
    cleanup(&cli);

    let id = cli.create(&itest_spec(1, 900)).expect("create should succeed");
    assert!(!id.is_empty());

    let meta = cli
        .inspect(&format!("{TEST_PREFIX}-1"))
        .expect("inspect should succeed");
    assert_eq!(meta.name, format!("{TEST_PREFIX}-1"));
    assert_eq!(meta.env_var("NODE_ID"), Some("900"));

    cli.remove(&format!("{TEST_PREFIX}-1"), true)
        .expect("remove should succeed");
    assert!(cli.inspect(&format!("{TEST_PREFIX}-1")).is_err());
}

#[test]
#[ignore]
fn list_filters_by_prefix() {
    let cli = DockerCli::new();
    cleanup(&cli);

    cli.create(&itest_spec(1, 901)).unwrap();
    cli.create(&itest_spec(2, 902)).unwrap();

    let names = cli.list(TEST_PREFIX).unwrap();
    assert!(names.contains(&format!("{TEST_PREFIX}-1")));
    assert!(names.contains(&format!("{TEST_PREFIX}-2")));

    cleanup(&cli);
}

#[test]
#[ignore]
fn stop_all_is_idempotent_against_real_daemon() {
    let cli = DockerCli::new();
    cleanup(&cli);

    let cfg = Config {
        container_prefix: TEST_PREFIX.to_string(),
        ..Config::default()
    };
    let tmp = tempfile::tempdir().unwrap();
    let sink = FsLogSink::new(tmp.path());
    let mgr = FleetManager::new(&cfg, &cli, &sink);

    cli.create(&itest_spec(1, 903)).unwrap();
    cli.create(&itest_spec(2, 904)).unwrap();

    assert_eq!(mgr.stop_all().unwrap(), 2);
    assert_eq!(mgr.stop_all().unwrap(), 0);
}
