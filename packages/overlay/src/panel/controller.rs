//! Owns the panel: the state machine, the surface handle, the in-flight
//! request's cancellation token and the pinned-flag subscription.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use explain_stream::PageMetadata;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::machine::{
    PanelCommand, PanelContent, PanelEvent, PanelMachine, PanelState, RequestToken,
};
use super::surface::Surface;
use crate::config::OverlayConfig;
use crate::consumer::ExplainClient;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::pins::{PinStore, PinSubscription};
use crate::render::{self, Rendered};

struct Inner {
    machine: PanelMachine,
    cancel: Option<CancellationToken>,
    surface_present: bool,
    last_rendered: Option<Rendered>,
}

struct Shared<S> {
    surface: S,
    client: ExplainClient,
    credentials: CredentialStore,
    pins: PinStore,
    config: OverlayConfig,
    inner: Mutex<Inner>,
    _pin_subscription: PinSubscription,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Panel lifecycle controller. Cheap to clone; clones share one panel.
pub struct PanelController<S: Surface> {
    shared: Arc<Shared<S>>,
}

impl<S: Surface> Clone for PanelController<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: Surface> PanelController<S> {
    pub async fn new(
        surface: S,
        client: ExplainClient,
        credentials: CredentialStore,
        pins: PinStore,
        config: OverlayConfig,
    ) -> Self {
        let pinned = pins.pinned().await;

        let shared = Arc::new_cyclic(|weak: &Weak<Shared<S>>| {
            let weak = weak.clone();
            let subscription = pins.on_pinned_change(move |pinned| {
                if let Some(shared) = weak.upgrade() {
                    shared.lock().machine.decide(&PanelEvent::PinChanged(pinned));
                }
            });

            Shared {
                surface,
                client,
                credentials,
                pins: pins.clone(),
                config,
                inner: Mutex::new(Inner {
                    machine: PanelMachine::new(pinned),
                    cancel: None,
                    surface_present: false,
                    last_rendered: None,
                }),
                _pin_subscription: subscription,
            }
        });

        Self { shared }
    }

    pub fn state(&self) -> PanelState {
        self.shared.lock().machine.state()
    }

    pub fn surface(&self) -> &S {
        &self.shared.surface
    }

    /// Open the panel for a selection. An empty selection opens it with a
    /// prompt instead of a request.
    pub async fn open(&self, selection: Option<&str>, metadata: PageMetadata) -> Option<JoinHandle<()>> {
        let content = match selection.map(str::trim).filter(|s| !s.is_empty()) {
            Some(text) => PanelContent::Explain {
                text: text.to_string(),
                metadata,
            },
            None => PanelContent::Notice(render::SELECT_TEXT_FIRST.to_string()),
        };
        self.trigger(content).await
    }

    /// Tear down whatever is mounted, mount a fresh surface and, once it is
    /// ready, start the request. Returns the stream task, if one started.
    pub async fn trigger(&self, content: PanelContent) -> Option<JoinHandle<()>> {
        let generation = {
            let mut inner = self.shared.lock();
            match inner.machine.decide(&PanelEvent::Triggered(content)) {
                Some(PanelCommand::Mount {
                    generation,
                    reattach,
                }) => {
                    self.mount(&mut inner, reattach);
                    generation
                }
                _ => return None,
            }
        };
        self.await_ready(generation).await
    }

    /// Close control, Escape or external cancellation.
    pub fn close(&self) {
        let mut inner = self.shared.lock();
        if let Some(PanelCommand::Unmount) = inner.machine.decide(&PanelEvent::CloseRequested) {
            self.unmount(&mut inner);
            debug!("panel closed");
        }
    }

    /// The host page changed its DOM. A pinned panel that was removed comes
    /// back after the reattach debounce.
    pub fn host_mutated(&self) -> Option<JoinHandle<()>> {
        let mut inner = self.shared.lock();

        if inner.surface_present && !self.shared.surface.is_attached() {
            debug!("surface removed by host page");
            inner.surface_present = false;
            inner.machine.decide(&PanelEvent::CloseRequested);
            self.unmount(&mut inner);
        }

        let command = inner.machine.decide(&PanelEvent::HostMutated);
        drop(inner);

        match command {
            Some(PanelCommand::ScheduleReattach) => {
                let this = self.clone();
                Some(tokio::spawn(async move {
                    tokio::time::sleep(this.shared.config.reattach_debounce).await;
                    this.reattach().await;
                }))
            }
            _ => None,
        }
    }

    pub async fn set_pinned(&self, pinned: bool) -> Result<()> {
        self.shared.pins.set_pinned(pinned).await?;
        if !pinned {
            self.shared.pins.invalidate();
        }
        Ok(())
    }

    /// Forget the paired credential and close the panel.
    pub async fn disconnect(&self) -> Result<()> {
        self.close();
        self.shared.pins.invalidate();
        self.shared.credentials.clear().await?;
        info!("overlay disconnected");
        Ok(())
    }

    /// Plain text of the current content, for the copy control.
    pub fn copy_text(&self) -> Option<String> {
        self.shared
            .lock()
            .last_rendered
            .as_ref()
            .map(|r| r.plain_text.clone())
            .filter(|text| !text.is_empty())
    }

    async fn reattach(&self) {
        let pinned = self.shared.pins.pinned().await;

        let generation = {
            let mut inner = self.shared.lock();
            inner.machine.decide(&PanelEvent::PinChanged(pinned));
            match inner.machine.decide(&PanelEvent::ReattachDue) {
                Some(PanelCommand::Mount {
                    generation,
                    reattach,
                }) => {
                    self.mount(&mut inner, reattach);
                    generation
                }
                _ => return,
            }
        };

        info!("pinned panel reattached");
        self.await_ready(generation).await;
    }

    async fn await_ready(&self, generation: u64) -> Option<JoinHandle<()>> {
        if tokio::time::timeout(self.shared.config.mount_timeout, self.shared.surface.ready())
            .await
            .is_err()
        {
            debug!(generation, "surface ready timed out, continuing");
        }

        let mut inner = self.shared.lock();
        match inner.machine.decide(&PanelEvent::SurfaceReady { generation }) {
            Some(PanelCommand::StartStream {
                token,
                text,
                metadata,
            }) => Some(self.start_stream(&mut inner, token, text, metadata)),
            Some(PanelCommand::ShowNotice(message)) => {
                self.show(&mut inner, render::message(&message));
                None
            }
            _ => None,
        }
    }

    /// Runs under the lock: the old surface and its request are gone before
    /// the new surface exists.
    fn mount(&self, inner: &mut Inner, reattach: bool) {
        self.unmount(inner);
        self.shared.surface.create(reattach);
        inner.surface_present = true;
    }

    fn unmount(&self, inner: &mut Inner) {
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        if inner.surface_present {
            self.shared.surface.remove();
            inner.surface_present = false;
        }
        inner.last_rendered = None;
    }

    fn show(&self, inner: &mut Inner, content: Rendered) {
        self.shared.surface.render(&content);
        inner.last_rendered = Some(content);
    }

    fn start_stream(
        &self,
        inner: &mut Inner,
        token: RequestToken,
        text: String,
        metadata: PageMetadata,
    ) -> JoinHandle<()> {
        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());
        self.show(inner, render::loading());

        debug!(request = token.0, chars = text.chars().count(), "starting explanation");
        let this = self.clone();
        tokio::spawn(async move { this.run_stream(token, text, metadata, cancel).await })
    }

    async fn run_stream(
        &self,
        token: RequestToken,
        text: String,
        metadata: PageMetadata,
        cancel: CancellationToken,
    ) {
        // Read before every request; pairing may have changed since mount.
        let credential = match self.shared.credentials.load().await {
            Ok(stored) => stored.map(|c| c.credential()),
            Err(e) => {
                warn!(error = %e, "failed to read credentials");
                None
            }
        };

        let request = self.shared.config.request(text, metadata);
        let result = self
            .shared
            .client
            .explain(&request, credential.as_ref(), &cancel, |text| {
                self.render_if_current(token, render::streaming(text));
            })
            .await;

        let content = match result {
            Ok(outcome) => Some(render::outcome(&outcome)),
            Err(e) if e.is_silent() => None,
            Err(e) => {
                warn!(request = token.0, error = %e, "explanation failed");
                Some(render::message(e.user_message()))
            }
        };
        if let Some(content) = content {
            self.render_if_current(token, content);
        }

        self.shared
            .lock()
            .machine
            .decide(&PanelEvent::StreamFinished { token });
    }

    /// Superseded or closed requests never touch the surface.
    fn render_if_current(&self, token: RequestToken, content: Rendered) -> bool {
        let mut inner = self.shared.lock();
        if inner.machine.state().active_request != Some(token) {
            return false;
        }
        self.show(&mut inner, content);
        true
    }
}
