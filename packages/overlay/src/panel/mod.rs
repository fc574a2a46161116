//! In-page explanation panel.

pub mod controller;
pub mod machine;
pub mod surface;

pub use controller::PanelController;
pub use machine::{
    PanelCommand, PanelContent, PanelEvent, PanelMachine, PanelPhase, PanelState, RequestToken,
};
pub use surface::Surface;
