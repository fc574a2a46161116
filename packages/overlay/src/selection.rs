//! Selection bubble: the floating "Explain" button offered over a selection.
//!
//! `BubbleMachine` decides; the host page owns the element and the timer.

use std::time::Duration;

pub const BUBBLE_WIDTH: f64 = 110.0;
pub const BUBBLE_OFFSET: f64 = 48.0;
pub const VIEWPORT_MARGIN: f64 = 10.0;

/// Selection bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubblePosition {
    pub left: f64,
    pub top: f64,
}

/// Centered above the selection, clamped horizontally, flipped below when
/// there is no room above.
pub fn bubble_position(rect: &Rect, viewport_width: f64) -> BubblePosition {
    let centered = rect.left + rect.width / 2.0 - BUBBLE_WIDTH / 2.0;
    let max_left = viewport_width - BUBBLE_WIDTH - VIEWPORT_MARGIN;
    let left = centered.min(max_left).max(VIEWPORT_MARGIN);

    let mut top = rect.top - BUBBLE_OFFSET;
    if top < VIEWPORT_MARGIN {
        top = rect.bottom() + VIEWPORT_MARGIN;
    }
    BubblePosition { left, top }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BubbleEvent {
    SelectionChanged { text: String, rect: Option<Rect> },
    /// The debounce timer scheduled for `generation` fired
    DebounceElapsed { generation: u64 },
    Scrolled,
    ClickedOutside,
    Clicked,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BubbleCommand {
    ScheduleShow { generation: u64, delay: Duration },
    Show(BubblePosition),
    Hide,
    /// Hide the bubble and open the panel for this text
    Explain { text: String },
}

#[derive(Debug, Clone, PartialEq)]
enum BubbleState {
    Hidden,
    Pending {
        generation: u64,
        text: String,
        position: BubblePosition,
    },
    Visible {
        text: String,
    },
}

/// Bubble state machine. One event in, at most one command out.
#[derive(Debug, Clone)]
pub struct BubbleMachine {
    state: BubbleState,
    generation: u64,
    viewport_width: f64,
    debounce: Duration,
    min_len: usize,
}

impl BubbleMachine {
    pub fn new(viewport_width: f64, debounce: Duration, min_len: usize) -> Self {
        Self {
            state: BubbleState::Hidden,
            generation: 0,
            viewport_width,
            debounce,
            min_len,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, BubbleState::Visible { .. })
    }

    pub fn decide(&mut self, event: &BubbleEvent) -> Option<BubbleCommand> {
        match event {
            BubbleEvent::SelectionChanged { text, rect } => {
                // Any change supersedes a pending show.
                self.generation += 1;
                let text = text.trim();
                match rect {
                    Some(rect) if text.chars().count() >= self.min_len && rect.width > 0.0 => {
                        self.state = BubbleState::Pending {
                            generation: self.generation,
                            text: text.to_string(),
                            position: bubble_position(rect, self.viewport_width),
                        };
                        Some(BubbleCommand::ScheduleShow {
                            generation: self.generation,
                            delay: self.debounce,
                        })
                    }
                    _ => self.hide(),
                }
            }
            BubbleEvent::DebounceElapsed { generation } => match &self.state {
                BubbleState::Pending {
                    generation: pending,
                    text,
                    position,
                } if pending == generation => {
                    let position = *position;
                    self.state = BubbleState::Visible { text: text.clone() };
                    Some(BubbleCommand::Show(position))
                }
                _ => None,
            },
            BubbleEvent::Scrolled | BubbleEvent::ClickedOutside => {
                self.generation += 1;
                self.hide()
            }
            BubbleEvent::Clicked => match std::mem::replace(&mut self.state, BubbleState::Hidden) {
                BubbleState::Visible { text } => Some(BubbleCommand::Explain { text }),
                other => {
                    self.state = other;
                    None
                }
            },
        }
    }

    fn hide(&mut self) -> Option<BubbleCommand> {
        let was_hidden = self.state == BubbleState::Hidden;
        self.state = BubbleState::Hidden;
        (!was_hidden).then_some(BubbleCommand::Hide)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(left: f64, top: f64, width: f64) -> Rect {
        Rect {
            left,
            top,
            width,
            height: 20.0,
        }
    }

    fn machine() -> BubbleMachine {
        BubbleMachine::new(1000.0, Duration::from_millis(300), 3)
    }

    fn select(text: &str, rect: Option<Rect>) -> BubbleEvent {
        BubbleEvent::SelectionChanged {
            text: text.into(),
            rect,
        }
    }

    #[test]
    fn test_position_centered_above() {
        let position = bubble_position(&rect(400.0, 300.0, 200.0), 1000.0);
        assert_eq!(position, BubblePosition { left: 445.0, top: 252.0 });
    }

    #[test]
    fn test_position_clamped_and_flipped() {
        let position = bubble_position(&rect(0.0, 30.0, 20.0), 1000.0);
        assert_eq!(position.left, VIEWPORT_MARGIN);
        assert_eq!(position.top, 60.0);

        let position = bubble_position(&rect(980.0, 300.0, 20.0), 1000.0);
        assert_eq!(position.left, 1000.0 - BUBBLE_WIDTH - VIEWPORT_MARGIN);
    }

    #[test]
    fn test_short_selection_never_schedules() {
        let mut bubble = machine();
        assert_eq!(bubble.decide(&select("ab", Some(rect(10.0, 300.0, 50.0)))), None);
        assert_eq!(bubble.decide(&select("abc", Some(rect(10.0, 300.0, 0.0)))), None);
        assert_eq!(bubble.decide(&select("abc", None)), None);
    }

    #[test]
    fn test_debounce_only_honours_latest_selection() {
        let mut bubble = machine();
        bubble.decide(&select("first selection", Some(rect(10.0, 300.0, 50.0))));
        let latest = bubble.decide(&select("second selection", Some(rect(10.0, 300.0, 50.0))));
        assert_eq!(
            latest,
            Some(BubbleCommand::ScheduleShow {
                generation: 2,
                delay: Duration::from_millis(300)
            })
        );

        assert_eq!(bubble.decide(&BubbleEvent::DebounceElapsed { generation: 1 }), None);
        assert!(matches!(
            bubble.decide(&BubbleEvent::DebounceElapsed { generation: 2 }),
            Some(BubbleCommand::Show(_))
        ));

        assert_eq!(
            bubble.decide(&BubbleEvent::Clicked),
            Some(BubbleCommand::Explain {
                text: "second selection".into()
            })
        );
        assert!(!bubble.is_visible());
    }

    #[test]
    fn test_scroll_hides_and_cancels_pending() {
        let mut bubble = machine();
        bubble.decide(&select("some text", Some(rect(10.0, 300.0, 50.0))));
        assert_eq!(bubble.decide(&BubbleEvent::Scrolled), Some(BubbleCommand::Hide));
        assert_eq!(bubble.decide(&BubbleEvent::DebounceElapsed { generation: 1 }), None);
        assert_eq!(bubble.decide(&BubbleEvent::ClickedOutside), None);
    }
}
