//! Integration tests for the bootstrap hook

use std::sync::mpsc;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_test::{assert_err, assert_ok};
use ziti_wire::bootstrap::{init, ziti_init, Bootstrap, IdentityConfig, InitOptions};
use ziti_wire::transport::constants::ZITI_PARTIALLY_AUTHENTICATED;
use ziti_wire::transport::MemoryTransport;
use ziti_wire::{Error, Result};

const IDENTITY: &str = r#"{
    "ztAPI": "https://ctrl.example.com:1280",
    "id": { "cert": "pem:CERT", "key": "pem:KEY" }
}"#;

fn options(transport: &Arc<MemoryTransport>) -> InitOptions {
    InitOptions::new(IdentityConfig::from_json(IDENTITY).unwrap(), transport.clone())
}

/// Driver-style callback that records every invocation
fn recorder() -> (
    impl FnOnce(Result<&'static str>) + Send + 'static,
    mpsc::Receiver<Result<&'static str>>,
) {
    let (tx, rx) = mpsc::channel();
    (
        move |result| {
            let _ = tx.send(result);
        },
        rx,
    )
}

#[test]
fn test_sync_failure_reported_once() {
    let transport = Arc::new(MemoryTransport::new());
    transport.set_init_return(-5);
    let (callback, results) = recorder();

    assert_ok!(ziti_init("driver", &options(&transport), Some(callback)));

    match results.try_recv().unwrap() {
        Err(Error::Network(message)) => assert!(message.contains("-5")),
        other => panic!("expected network error, got {:?}", other),
    }
    assert!(results.try_recv().is_err());
}

#[test]
fn test_partial_auth_then_success() {
    let transport = Arc::new(MemoryTransport::new());
    transport.script_init_results(vec![ZITI_PARTIALLY_AUTHENTICATED]);
    let (callback, results) = recorder();

    assert_ok!(ziti_init("driver", &options(&transport), Some(callback)));
    assert!(results.try_recv().is_err());

    assert!(transport.emit_init_result(0));
    assert_eq!(results.try_recv().unwrap().unwrap(), "driver");

    // later events never reach the driver
    assert!(transport.emit_init_result(-1));
    assert!(results.try_recv().is_err());
}

#[test]
fn test_success_hands_back_client() {
    let transport = Arc::new(MemoryTransport::new());
    transport.script_init_results(vec![0]);
    let (callback, results) = recorder();

    assert_ok!(ziti_init("driver", &options(&transport), Some(callback)));
    assert_eq!(results.try_recv().unwrap().unwrap(), "driver");
    assert_eq!(transport.init_controllers(), vec!["https://ctrl.example.com:1280"]);
}

#[test]
fn test_missing_callback_rejected() {
    let transport = Arc::new(MemoryTransport::new());
    let err = assert_err!(ziti_init::<_, fn(Result<()>)>((), &options(&transport), None));
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(transport.init_calls(), 0);
}

#[tokio::test]
async fn test_async_init_failure() {
    let transport = Arc::new(MemoryTransport::new());
    transport.script_init_results(vec![ZITI_PARTIALLY_AUTHENTICATED, -8]);

    let err = assert_err!(init(&options(&transport)).await);
    assert_eq!(err.to_string(), "network error: ziti_init failed with rc -8");
}

#[tokio::test]
async fn test_concurrent_bootstrap_initializes_once() {
    let transport = Arc::new(MemoryTransport::new());
    transport.script_init_results(vec![0]);
    let bootstrap = Arc::new(Bootstrap::new(options(&transport)));

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let bootstrap = Arc::clone(&bootstrap);
        tasks.spawn(async move { bootstrap.ensure_initialized().await });
    }
    while let Some(result) = tasks.join_next().await {
        assert_ok!(result.unwrap());
    }

    assert!(bootstrap.is_initialized());
    assert_eq!(transport.init_calls(), 1);
}

#[tokio::test]
async fn test_bootstrap_retries_after_failure() {
    let transport = Arc::new(MemoryTransport::new());
    transport.set_init_return(-3);
    let bootstrap = Bootstrap::new(options(&transport));

    assert_err!(bootstrap.ensure_initialized().await);
    assert!(!bootstrap.is_initialized());

    transport.set_init_return(0);
    transport.script_init_results(vec![0]);
    assert_ok!(bootstrap.ensure_initialized().await);
    assert_ok!(bootstrap.ensure_initialized().await);
    assert_eq!(transport.init_calls(), 2);
}
