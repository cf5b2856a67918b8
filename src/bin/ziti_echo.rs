//! Echo round trip over the in-process transport
//!
//! Initializes a client, dials an echo service, writes each argument and reads
//! it back. Set `RUST_LOG=ziti_wire=debug` to watch the socket lifecycle.
//!
//! ```text
//! cargo run --bin ziti-echo -- hello overlay
//! ```

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;
use ziti_wire::bootstrap::IdentityConfig;
use ziti_wire::transport::{MemoryTransport, ServiceBehavior};
use ziti_wire::ZitiClient;

const IDENTITY: &str = r#"{
    "ztAPI": "https://controller.local:1280",
    "id": { "cert": "pem:demo-cert", "key": "pem:demo-key" }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ziti_wire=info")),
        )
        .init();

    let transport = Arc::new(MemoryTransport::new().with_service("echo", ServiceBehavior::Echo));
    transport.script_init_results(vec![0]);

    let client = ZitiClient::new(transport, IdentityConfig::from_json(IDENTITY)?);
    let mut socket = client.connect("echo").await?;

    let words: Vec<String> = std::env::args().skip(1).collect();
    let words = if words.is_empty() {
        vec!["hello".to_string()]
    } else {
        words
    };

    for word in &words {
        socket.write_all(word.as_bytes()).await?;

        let mut echoed = vec![0u8; word.len()];
        socket.read_exact(&mut echoed).await?;
        println!("{} -> {}", word, String::from_utf8_lossy(&echoed));
    }

    socket.end().await?;
    Ok(())
}
