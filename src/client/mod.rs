//! High-level client API

mod ziti_client;

pub use ziti_client::ZitiClient;
