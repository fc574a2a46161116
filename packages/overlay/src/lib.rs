//! Client side of the explanation service.
//!
//! - [`panel`]: the in-page panel and its lifecycle controller
//! - [`selection`]: the floating "Explain" bubble
//! - [`consumer`]: HTTP stream consumer shared by every surface
//! - [`relay`]: background relay and trigger delivery
//! - [`page`]: the standalone explain page
//!
//! Host integration (DOM, extension messaging, storage areas) sits behind
//! the [`panel::Surface`], [`relay::Port`], [`relay::TabMessenger`] and
//! [`storage::KeyValueStore`] traits.

pub mod config;
pub mod consumer;
pub mod credentials;
pub mod error;
pub mod page;
pub mod panel;
pub mod pins;
pub mod relay;
pub mod render;
pub mod selection;
pub mod storage;

pub use config::OverlayConfig;
pub use consumer::ExplainClient;
pub use credentials::{Credential, CredentialStore, StoredCredentials};
pub use error::{OverlayError, Result};
pub use page::{ExplainPage, PageResult};
pub use panel::{PanelController, PanelContent, PanelState, Surface};
pub use pins::{PinStore, PinSubscription};
pub use relay::{deliver_trigger, relay_stream, Port, PortMessage, RelayRequest, TriggerMessage};
pub use render::Rendered;
pub use selection::{BubbleCommand, BubbleEvent, BubbleMachine};
pub use storage::{KeyValueStore, MemoryStore};
