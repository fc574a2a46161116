// HTTP routes
pub mod explain;
pub mod followup;
pub mod health;

pub use explain::*;
pub use followup::*;
pub use health::*;
