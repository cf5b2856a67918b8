//! Transport initialization hook

use super::identity::IdentityConfig;
use crate::metrics::labels;
use crate::transport::constants::ZITI_PARTIALLY_AUTHENTICATED;
use crate::transport::{OnInitResult, TransportClient};
use crate::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{oneshot, OnceCell};
use tracing::Instrument;

/// Inputs to the bootstrap hook
#[derive(Clone)]
pub struct InitOptions {
    /// Identity passed to the transport's `init`
    pub identity: IdentityConfig,
    /// Shared transport client
    pub transport: Arc<dyn TransportClient>,
}

impl InitOptions {
    /// Bundle an identity with the transport it initializes
    pub fn new(identity: IdentityConfig, transport: Arc<dyn TransportClient>) -> Self {
        Self {
            identity,
            transport,
        }
    }
}

impl std::fmt::Debug for InitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitOptions")
            .field("identity", &self.identity)
            .field("transport", &"<TransportClient>")
            .finish()
    }
}

/// Callback slot shared by the synchronous and asynchronous result paths.
/// Whichever path reports first takes it; later reports find it empty.
type Slot<H, F> = Arc<Mutex<Option<(F, H)>>>;

/// Initialize the transport on behalf of a driver client
///
/// `callback` receives `Ok(client)` once the controller accepts the identity,
/// or `Err(Error::Network)` if initialization fails. It fires exactly once;
/// intermediate `ZITI_PARTIALLY_AUTHENTICATED` results are ignored.
///
/// A missing callback is a caller bug and is reported immediately.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use ziti_wire::bootstrap::{ziti_init, IdentityConfig, InitOptions};
/// use ziti_wire::transport::MemoryTransport;
///
/// # fn main() -> ziti_wire::Result<()> {
/// let identity = IdentityConfig::from_json(
///     r#"{"ztAPI": "https://ctrl:1280", "id": {"cert": "c", "key": "k"}}"#,
/// )?;
/// let transport = Arc::new(MemoryTransport::new());
/// transport.script_init_results(vec![0]);
/// let options = InitOptions::new(identity, transport);
///
/// ziti_init("driver", &options, Some(|result: ziti_wire::Result<&str>| {
///     assert_eq!(result.unwrap(), "driver");
/// }))?;
/// # Ok(())
/// # }
/// ```
pub fn ziti_init<H, F>(client: H, options: &InitOptions, callback: Option<F>) -> Result<()>
where
    H: Send + 'static,
    F: FnOnce(Result<H>) + Send + 'static,
{
    let callback = callback
        .ok_or_else(|| Error::InvalidArgument("callback function must be provided".into()))?;

    let slot: Slot<H, F> = Arc::new(Mutex::new(Some((callback, client))));
    let async_slot = Arc::clone(&slot);

    let on_result: OnInitResult = Box::new(move |rc| {
        if rc == ZITI_PARTIALLY_AUTHENTICATED {
            tracing::debug!("ignoring PARTIALLY_AUTHENTICATED event from controller");
            crate::metrics::counters::init_completed(labels::RESULT_IGNORED);
            return;
        }
        if rc < 0 {
            report(&async_slot, Err(init_failed(rc)));
        } else {
            report(&async_slot, Ok(()));
        }
    });

    let rc = options.transport.init(&options.identity, on_result);
    if rc < 0 {
        report(&slot, Err(init_failed(rc)));
    }
    Ok(())
}

/// Initialize the transport and wait for the definitive outcome
pub async fn init(options: &InitOptions) -> Result<()> {
    async {
        let (tx, rx) = oneshot::channel();
        ziti_init((), options, Some(move |result: Result<()>| {
            let _ = tx.send(result);
        }))?;

        let result = rx.await.map_err(|_| {
            Error::Network("transport dropped the init callback without a result".into())
        })?;
        if result.is_ok() {
            tracing::info!("transport initialized");
        }
        result
    }
    .instrument(tracing::info_span!(
        "ziti_init",
        controller = %options.identity.controller_url
    ))
    .await
}

/// Runs the bootstrap hook at most once per owner
///
/// A failed attempt is not cached; the next call tries again.
#[derive(Debug)]
pub struct Bootstrap {
    options: InitOptions,
    initialized: OnceCell<()>,
}

impl Bootstrap {
    /// Create an uninitialized bootstrap
    pub fn new(options: InitOptions) -> Self {
        Self {
            options,
            initialized: OnceCell::new(),
        }
    }

    /// Initialize the transport unless a previous call already succeeded
    pub async fn ensure_initialized(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| init(&self.options))
            .await
            .map(|_| ())
    }

    /// Whether initialization has succeeded
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Options this bootstrap runs with
    pub fn options(&self) -> &InitOptions {
        &self.options
    }
}

fn init_failed(rc: i32) -> Error {
    Error::Network(format!("ziti_init failed with rc {}", rc))
}

fn report<H, F>(slot: &Mutex<Option<(F, H)>>, outcome: Result<()>)
where
    F: FnOnce(Result<H>),
{
    let taken = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    match taken {
        Some((callback, client)) => {
            match &outcome {
                Ok(()) => crate::metrics::counters::init_completed(labels::RESULT_OK),
                Err(e) => {
                    tracing::error!(error = %e, "transport initialization failed");
                    crate::metrics::counters::init_completed(labels::RESULT_ERROR);
                }
            }
            callback(outcome.map(|()| client));
        }
        None => tracing::debug!("init outcome already reported, dropping late result"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn identity() -> IdentityConfig {
        IdentityConfig::from_json(r#"{"ztAPI": "https://ctrl:1280", "id": {"cert": "c", "key": "k"}}"#)
            .unwrap()
    }

    fn options(transport: &Arc<MemoryTransport>) -> InitOptions {
        InitOptions::new(identity(), Arc::clone(transport) as Arc<dyn TransportClient>)
    }

    type Outcomes = Arc<Mutex<Vec<std::result::Result<u32, String>>>>;

    fn recorder() -> (Outcomes, impl FnOnce(Result<u32>) + Send + 'static) {
        let outcomes: Outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        let callback = move |result: Result<u32>| {
            sink.lock().unwrap().push(result.map_err(|e| e.to_string()));
        };
        (outcomes, callback)
    }

    #[test]
    fn test_missing_callback_is_rejected_synchronously() {
        let transport = Arc::new(MemoryTransport::new());
        let result = ziti_init::<u32, fn(Result<u32>)>(7, &options(&transport), None);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(transport.init_calls(), 0);
    }

    #[test]
    fn test_sync_failure_reports_network_error_once() {
        let transport = Arc::new(MemoryTransport::new());
        transport.set_init_return(-5);
        let (outcomes, callback) = recorder();

        ziti_init(7, &options(&transport), Some(callback)).unwrap();

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0],
            Err("network error: ziti_init failed with rc -5".to_string())
        );
    }

    #[test]
    fn test_partially_authenticated_is_ignored() {
        let transport = Arc::new(MemoryTransport::new());
        transport.script_init_results(vec![ZITI_PARTIALLY_AUTHENTICATED]);
        let (outcomes, callback) = recorder();

        ziti_init(7, &options(&transport), Some(callback)).unwrap();
        assert!(outcomes.lock().unwrap().is_empty());

        assert!(transport.emit_init_result(0));
        assert_eq!(*outcomes.lock().unwrap(), vec![Ok(7)]);
    }

    #[test]
    fn test_success_reports_client_once() {
        let transport = Arc::new(MemoryTransport::new());
        transport.script_init_results(vec![0]);
        let (outcomes, callback) = recorder();

        ziti_init(7, &options(&transport), Some(callback)).unwrap();
        // later events do not re-fire the callback
        transport.emit_init_result(0);
        transport.emit_init_result(-12);

        assert_eq!(*outcomes.lock().unwrap(), vec![Ok(7)]);
    }

    #[test]
    fn test_async_failure_reports_once() {
        let transport = Arc::new(MemoryTransport::new());
        transport.script_init_results(vec![ZITI_PARTIALLY_AUTHENTICATED, -12, 0]);
        let (outcomes, callback) = recorder();

        ziti_init(7, &options(&transport), Some(callback)).unwrap();

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].as_ref().unwrap_err().contains("rc -12"));
    }

    #[tokio::test]
    async fn test_async_init() {
        let transport = Arc::new(MemoryTransport::new());
        transport.script_init_results(vec![0]);
        init(&options(&transport)).await.unwrap();

        transport.set_init_return(-5);
        let err = init(&options(&transport)).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_runs_once_after_success() {
        let transport = Arc::new(MemoryTransport::new());
        transport.script_init_results(vec![0]);
        let bootstrap = Bootstrap::new(options(&transport));

        assert!(!bootstrap.is_initialized());
        bootstrap.ensure_initialized().await.unwrap();
        bootstrap.ensure_initialized().await.unwrap();

        assert!(bootstrap.is_initialized());
        assert_eq!(transport.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_retries_after_failure() {
        let transport = Arc::new(MemoryTransport::new());
        transport.set_init_return(-5);
        let bootstrap = Bootstrap::new(options(&transport));

        assert!(bootstrap.ensure_initialized().await.is_err());
        assert!(!bootstrap.is_initialized());

        transport.set_init_return(0);
        transport.script_init_results(vec![0]);
        bootstrap.ensure_initialized().await.unwrap();
        assert_eq!(transport.init_calls(), 2);
    }

    #[test]
    fn test_callback_fires_once_under_concurrent_results() {
        let transport = Arc::new(MemoryTransport::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        ziti_init(
            (),
            &options(&transport),
            Some(move |_: Result<()>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let transport = Arc::clone(&transport);
                std::thread::spawn(move || {
                    transport.emit_init_result(0);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
