// Common test utilities

pub mod fake_surface;
pub mod stub_server;

pub use fake_surface::*;
pub use stub_server::*;
