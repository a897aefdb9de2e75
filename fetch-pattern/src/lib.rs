//! The lifecycle of a single asynchronous fetch, modeled as four mutually
//! exclusive states.
//!
//! A [`FetchStateMachine`] issues exactly one request through a
//! [`Transport`] and moves its [`FetchState`] from `Unloaded` through
//! `Loading` to either `Loaded` or `Error`. A rendering layer reads the
//! state through the guard predicates and calls
//! [`FetchStateMachine::mark_unmounted`] when the consuming view goes away,
//! after which the machine never writes again.
//!
//! ```rust,no_run
//! use fetch_pattern::{FetchRequest, FetchStateMachine, HttpTransport};
//!
//! # async fn run() -> anyhow::Result<()> {
//! #[derive(Clone, serde::Deserialize)]
//! struct Profile {
//!     id: u64,
//! }
//!
//! let transport = HttpTransport::new(reqwest::Client::new());
//! let machine = FetchStateMachine::<Profile>::spawn(
//!     transport,
//!     FetchRequest::get("https://example.com/api/profile"),
//! );
//!
//! if let Some(profile) = machine.settled().await.data() {
//!     println!("loaded profile {}", profile.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod machine;
pub mod state;
pub mod telemetry;
pub mod transport;

pub use config::{ConfigError, TransportConfig};
pub use error::FetchError;
pub use machine::FetchStateMachine;
pub use state::{FetchState, FetchStatus};
pub use transport::{
    FetchRequest, HttpTransport, Transport, TransportError, TransportResponse,
};
