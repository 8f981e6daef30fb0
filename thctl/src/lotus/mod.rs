//! Lotus full-node JSON-RPC client.
//!
//! Layered leaf-first: [`transport`] does one HTTP round trip, [`retry`]
//! repeats transient failures, [`client`] maps each remote procedure to a
//! typed method. [`endpoint`] turns configured addresses into URLs.

pub mod client;
pub mod endpoint;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::LotusClient;
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport};
