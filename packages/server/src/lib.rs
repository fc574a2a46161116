// Scribe Overlay - API Core
//
// Backend for the in-page explanation overlay: authenticates the caller,
// redacts the selection, and streams a structured explanation back.
// Business logic lives in domains/*, infrastructure seams in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
