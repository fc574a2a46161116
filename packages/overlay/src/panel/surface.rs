use async_trait::async_trait;

use crate::render::Rendered;

/// The host-side panel element.
///
/// The controller guarantees at most one live surface: `remove` is always
/// called on the old instance before `create` builds a new one, with no
/// suspension in between.
#[async_trait]
pub trait Surface: Send + Sync + 'static {
    fn create(&self, reattached: bool);

    /// Resolves once the surface signals it is ready. The controller bounds
    /// the wait with the mount timeout.
    async fn ready(&self);

    fn render(&self, content: &Rendered);

    fn remove(&self);

    /// False once the host page has removed the element on its own.
    fn is_attached(&self) -> bool;
}
