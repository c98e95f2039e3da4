//! HTTP surface for receipt intake.
//!
//! `intake_router()` returns a composable `Router`; `server::serve` binds it
//! and runs until Ctrl-C.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::intake_router;
pub use server::serve;
pub use types::AppContext;
