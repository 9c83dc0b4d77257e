//! Deterministic test harness for the Palaver signaling client.
//!
//! In-process implementations of the client's environment and transport
//! boundaries for reproducible testing:
//!
//! - [`SimEnv`]: tokio virtual time + seeded RNG. Under a paused runtime,
//!   timeout tests run instantly and exactly.
//! - [`StubTransport`] / [`ServerScript`]: a scripted far side. Tests
//!   declare how authentication and joins behave, then drive unsolicited
//!   traffic and connection drops through a [`StubHandle`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_env;
pub mod stub_transport;

pub use sim_env::SimEnv;
pub use stub_transport::{AuthOutcome, JoinOutcome, ServerScript, StubHandle, StubTransport};
