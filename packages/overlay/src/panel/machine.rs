//! Panel lifecycle state machine.
//!
//! Pure decisions, no IO. The controller feeds events in and executes the
//! returned command against the surface.

use explain_stream::PageMetadata;

/// Identifies one explanation request. Stale completions are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(pub u64);

/// What a trigger asks the panel to show.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelContent {
    Explain { text: String, metadata: PageMetadata },
    /// A notice instead of a request (e.g. nothing was selected)
    Notice(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPhase {
    Unmounted,
    Mounting { reattach: bool },
    Idle,
    Streaming,
}

impl PanelPhase {
    pub fn is_mounted(self) -> bool {
        matches!(self, PanelPhase::Idle | PanelPhase::Streaming)
    }
}

/// Snapshot of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelState {
    pub phase: PanelPhase,
    pub mounted: bool,
    pub pinned: bool,
    pub active_request: Option<RequestToken>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    /// Bubble click, keyboard command or context menu
    Triggered(PanelContent),
    /// The surface for `generation` reported ready, or the mount timeout elapsed
    SurfaceReady { generation: u64 },
    /// Close control, Escape, or external cancellation
    CloseRequested,
    HostMutated,
    /// The reattach debounce elapsed
    ReattachDue,
    StreamFinished { token: RequestToken },
    PinChanged(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    /// Cancel any in-flight request, remove any surface, create a new one
    Mount { generation: u64, reattach: bool },
    StartStream {
        token: RequestToken,
        text: String,
        metadata: PageMetadata,
    },
    ShowNotice(String),
    /// Cancel any in-flight request and remove the surface
    Unmount,
    ScheduleReattach,
}

#[derive(Debug)]
pub struct PanelMachine {
    phase: PanelPhase,
    pinned: bool,
    active_request: Option<RequestToken>,
    pending: Option<PanelContent>,
    generation: u64,
    next_request: u64,
    reattach_scheduled: bool,
}

impl PanelMachine {
    pub fn new(pinned: bool) -> Self {
        Self {
            phase: PanelPhase::Unmounted,
            pinned,
            active_request: None,
            pending: None,
            generation: 0,
            next_request: 0,
            reattach_scheduled: false,
        }
    }

    pub fn state(&self) -> PanelState {
        PanelState {
            phase: self.phase,
            mounted: self.phase.is_mounted(),
            pinned: self.pinned,
            active_request: self.active_request,
        }
    }

    pub fn decide(&mut self, event: &PanelEvent) -> Option<PanelCommand> {
        match event {
            PanelEvent::Triggered(content) => {
                self.pending = Some(content.clone());
                Some(self.begin_mount(false))
            }

            PanelEvent::SurfaceReady { generation } => {
                let reattach = match self.phase {
                    PanelPhase::Mounting { reattach } if *generation == self.generation => reattach,
                    _ => return None,
                };

                match self.pending.take() {
                    Some(PanelContent::Explain { text, metadata }) if !reattach => {
                        self.next_request += 1;
                        let token = RequestToken(self.next_request);
                        self.phase = PanelPhase::Streaming;
                        self.active_request = Some(token);
                        Some(PanelCommand::StartStream {
                            token,
                            text,
                            metadata,
                        })
                    }
                    Some(PanelContent::Notice(message)) => {
                        self.phase = PanelPhase::Idle;
                        Some(PanelCommand::ShowNotice(message))
                    }
                    _ => {
                        self.phase = PanelPhase::Idle;
                        None
                    }
                }
            }

            PanelEvent::CloseRequested => {
                if self.phase == PanelPhase::Unmounted {
                    return None;
                }
                self.phase = PanelPhase::Unmounted;
                self.active_request = None;
                self.pending = None;
                Some(PanelCommand::Unmount)
            }

            PanelEvent::HostMutated => {
                if self.pinned && self.phase == PanelPhase::Unmounted && !self.reattach_scheduled {
                    self.reattach_scheduled = true;
                    Some(PanelCommand::ScheduleReattach)
                } else {
                    None
                }
            }

            PanelEvent::ReattachDue => {
                self.reattach_scheduled = false;
                if self.pinned && self.phase == PanelPhase::Unmounted {
                    self.pending = None;
                    Some(self.begin_mount(true))
                } else {
                    None
                }
            }

            PanelEvent::StreamFinished { token } => {
                if self.phase == PanelPhase::Streaming && self.active_request == Some(*token) {
                    self.phase = PanelPhase::Idle;
                    self.active_request = None;
                }
                None
            }

            PanelEvent::PinChanged(pinned) => {
                self.pinned = *pinned;
                None
            }
        }
    }

    fn begin_mount(&mut self, reattach: bool) -> PanelCommand {
        self.generation += 1;
        self.phase = PanelPhase::Mounting { reattach };
        self.active_request = None;
        PanelCommand::Mount {
            generation: self.generation,
            reattach,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explain(text: &str) -> PanelEvent {
        PanelEvent::Triggered(PanelContent::Explain {
            text: text.into(),
            metadata: PageMetadata::default(),
        })
    }

    #[test]
    fn test_trigger_mounts_then_streams() {
        let mut panel = PanelMachine::new(false);
        assert_eq!(
            panel.decide(&explain("text")),
            Some(PanelCommand::Mount {
                generation: 1,
                reattach: false
            })
        );
        assert!(!panel.state().mounted);

        let command = panel.decide(&PanelEvent::SurfaceReady { generation: 1 });
        assert!(matches!(command, Some(PanelCommand::StartStream { token: RequestToken(1), .. })));
        assert_eq!(panel.state().phase, PanelPhase::Streaming);

        panel.decide(&PanelEvent::StreamFinished {
            token: RequestToken(1),
        });
        assert_eq!(panel.state().phase, PanelPhase::Idle);
        assert_eq!(panel.state().active_request, None);
    }

    #[test]
    fn test_retrigger_supersedes_pending_mount() {
        let mut panel = PanelMachine::new(false);
        panel.decide(&explain("first"));
        panel.decide(&explain("second"));

        assert_eq!(panel.decide(&PanelEvent::SurfaceReady { generation: 1 }), None);
        match panel.decide(&PanelEvent::SurfaceReady { generation: 2 }) {
            Some(PanelCommand::StartStream { text, .. }) => assert_eq!(text, "second"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stale_stream_completion_is_ignored() {
        let mut panel = PanelMachine::new(false);
        panel.decide(&explain("first"));
        panel.decide(&PanelEvent::SurfaceReady { generation: 1 });
        panel.decide(&explain("second"));
        panel.decide(&PanelEvent::SurfaceReady { generation: 2 });

        panel.decide(&PanelEvent::StreamFinished {
            token: RequestToken(1),
        });
        assert_eq!(panel.state().phase, PanelPhase::Streaming);
        assert_eq!(panel.state().active_request, Some(RequestToken(2)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut panel = PanelMachine::new(false);
        panel.decide(&explain("text"));
        assert_eq!(panel.decide(&PanelEvent::CloseRequested), Some(PanelCommand::Unmount));
        assert_eq!(panel.decide(&PanelEvent::CloseRequested), None);
        assert_eq!(panel.decide(&PanelEvent::SurfaceReady { generation: 1 }), None);
    }

    #[test]
    fn test_reattach_only_when_pinned_and_unmounted() {
        let mut panel = PanelMachine::new(false);
        assert_eq!(panel.decide(&PanelEvent::HostMutated), None);

        panel.decide(&PanelEvent::PinChanged(true));
        assert_eq!(
            panel.decide(&PanelEvent::HostMutated),
            Some(PanelCommand::ScheduleReattach)
        );
        // Further mutations fold into the scheduled reattach.
        assert_eq!(panel.decide(&PanelEvent::HostMutated), None);

        assert_eq!(
            panel.decide(&PanelEvent::ReattachDue),
            Some(PanelCommand::Mount {
                generation: 1,
                reattach: true
            })
        );
        assert_eq!(panel.decide(&PanelEvent::SurfaceReady { generation: 1 }), None);
        assert_eq!(panel.state().phase, PanelPhase::Idle);

        assert_eq!(panel.decide(&PanelEvent::HostMutated), None);
    }

    #[test]
    fn test_unpinned_before_debounce_skips_reattach() {
        let mut panel = PanelMachine::new(true);
        panel.decide(&PanelEvent::HostMutated);
        panel.decide(&PanelEvent::PinChanged(false));
        assert_eq!(panel.decide(&PanelEvent::ReattachDue), None);
    }

    #[test]
    fn test_notice_renders_without_request() {
        let mut panel = PanelMachine::new(false);
        panel.decide(&PanelEvent::Triggered(PanelContent::Notice("Select text first.".into())));
        assert_eq!(
            panel.decide(&PanelEvent::SurfaceReady { generation: 1 }),
            Some(PanelCommand::ShowNotice("Select text first.".into()))
        );
        assert_eq!(panel.state().active_request, None);
    }
}
