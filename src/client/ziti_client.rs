//! ZitiClient implementation

use crate::bootstrap::{Bootstrap, IdentityConfig, InitOptions};
use crate::socket::{SocketConfig, ZitiSocket};
use crate::transport::TransportClient;
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Overlay client: one shared transport, its identity and socket defaults
///
/// Every socket built by a client shares the same transport. The transport is
/// initialized at most once, on the first successful [`init`](Self::init) or
/// [`connect`](Self::connect).
pub struct ZitiClient {
    bootstrap: Bootstrap,
    config: SocketConfig,
}

impl ZitiClient {
    /// Create a client with the default socket configuration
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> ziti_wire::Result<()> {
    /// use std::sync::Arc;
    /// use ziti_wire::bootstrap::IdentityConfig;
    /// use ziti_wire::transport::{MemoryTransport, ServiceBehavior};
    /// use ziti_wire::ZitiClient;
    ///
    /// let identity = IdentityConfig::from_file("/etc/ziti/db-client.json")?;
    /// let transport = Arc::new(MemoryTransport::new().with_service("db", ServiceBehavior::Echo));
    ///
    /// let client = ZitiClient::new(transport, identity);
    /// let socket = client.connect("db").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(transport: Arc<dyn TransportClient>, identity: IdentityConfig) -> Self {
        Self::with_config(transport, identity, SocketConfig::default())
    }

    /// Create a client whose sockets use `config`
    pub fn with_config(
        transport: Arc<dyn TransportClient>,
        identity: IdentityConfig,
        config: SocketConfig,
    ) -> Self {
        Self {
            bootstrap: Bootstrap::new(InitOptions::new(identity, transport)),
            config,
        }
    }

    /// Create a client from an identity file
    pub fn from_identity_file(
        transport: Arc<dyn TransportClient>,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let identity = IdentityConfig::from_file(path)?;
        Ok(Self::new(transport, identity))
    }

    /// Initialize the transport unless already done
    pub async fn init(&self) -> Result<()> {
        self.bootstrap.ensure_initialized().await
    }

    /// Whether the transport has been initialized by this client
    pub fn is_initialized(&self) -> bool {
        self.bootstrap.is_initialized()
    }

    /// Build an unconnected socket over the shared transport
    ///
    /// Does not initialize the transport.
    pub fn socket(&self) -> ZitiSocket {
        ZitiSocket::with_config(Arc::clone(self.transport()), self.config.clone())
    }

    /// Initialize if needed, then dial `service` and wait for the connection
    pub async fn connect(&self, service: &str) -> Result<ZitiSocket> {
        self.init().await?;

        let mut socket = self.socket();
        socket.dial(service).await?;
        Ok(socket)
    }

    /// Socket configuration applied to new sockets
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Identity the transport is initialized with
    pub fn identity(&self) -> &IdentityConfig {
        &self.bootstrap.options().identity
    }

    /// Shared transport
    pub fn transport(&self) -> &Arc<dyn TransportClient> {
        &self.bootstrap.options().transport
    }
}

impl std::fmt::Debug for ZitiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZitiClient")
            .field("controller", &self.identity().controller_url)
            .field("initialized", &self.is_initialized())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::IdentityMaterial;
    use crate::socket::SocketState;
    use crate::transport::{MemoryTransport, ServiceBehavior};
    use crate::Error;

    fn identity() -> IdentityConfig {
        IdentityConfig {
            controller_url: "https://ctrl.example.com:1280".into(),
            id: IdentityMaterial {
                cert: "pem:cert".into(),
                key: "pem:key".into(),
                ca: None,
            },
            config_types: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_connect_initializes_once() {
        let transport = Arc::new(MemoryTransport::new().with_service("db", ServiceBehavior::Echo));
        transport.script_init_results(vec![0]);
        let client = ZitiClient::new(transport.clone(), identity());
        assert!(!client.is_initialized());

        let first = client.connect("db").await.unwrap();
        let second = client.connect("db").await.unwrap();

        assert!(client.is_initialized());
        assert_eq!(transport.init_calls(), 1);
        assert_eq!(first.state(), SocketState::Connected);
        assert_ne!(first.handle(), second.handle());
    }

    #[tokio::test]
    async fn test_connect_fails_when_init_fails() {
        let transport = Arc::new(MemoryTransport::new().with_service("db", ServiceBehavior::Echo));
        transport.set_init_return(-5);
        let client = ZitiClient::new(transport.clone(), identity());

        let err = client.connect("db").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(transport.dials().is_empty());
    }

    #[tokio::test]
    async fn test_socket_uses_client_config() {
        let transport = Arc::new(MemoryTransport::new());
        let config = SocketConfig::builder()
            .error_policy(crate::socket::ErrorPolicy::Propagate)
            .build()
            .unwrap();
        let client = ZitiClient::with_config(transport, identity(), config.clone());

        let socket = client.socket();
        assert_eq!(socket.config(), &config);
        assert_eq!(socket.state(), SocketState::Unconnected);
    }
}
