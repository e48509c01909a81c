//! Pointer and keyboard state machine.
//!
//! Raw events go in through [`InputRouter::handle`]; the router answers with
//! [`Intent`]s for the overlay to carry out. Button releases are settled on
//! the next [`InputRouter::tick`] rather than immediately, so a release and
//! the move events around it all land before the click-or-drag decision is
//! made.

use crate::window::{CursorStyle, Point, Size};

/// Pointer travel on either axis, in pixels, that turns a press into a drag.
pub const DRAG_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    /// Modifier that turns a secondary click into a skin change.
    Shift,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown {
        button: PointerButton,
        screen: Point,
    },
    /// `local` is relative to the skin image's top-left corner and
    /// `displayed` is the image's on-screen size.
    PointerMove {
        screen: Point,
        local: Point,
        displayed: Size,
    },
    PointerUp {
        button: PointerButton,
    },
    KeyDown(Key),
    KeyUp(Key),
    ContextMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouterState {
    Idle,
    PendingClick { button: PointerButton, origin: Point },
    Dragging { mode: DragMode, last: Point },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    MoveBy { delta_x: i32, delta_y: i32 },
    ResizeBy { delta_x: i32 },
    SetClickThrough { enabled: bool, forward: bool },
    SetCursor(CursorStyle),
    ToggleAudio,
    CycleSkin,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Release {
    button: PointerButton,
    dragged: bool,
}

#[derive(Debug)]
pub struct InputRouter {
    state: RouterState,
    modifier_held: bool,
    click_through: Option<bool>,
    settling: Option<Release>,
    cycle_on_release: bool,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl InputRouter {
    pub fn new() -> Self {
        Self {
            state: RouterState::Idle,
            modifier_held: false,
            click_through: None,
            settling: None,
            cycle_on_release: false,
        }
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RouterState::Idle
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, RouterState::Dragging { .. })
    }

    /// Feeds one event. `probe` answers whether a point over the image is
    /// opaque and is only consulted while no button is held.
    pub fn handle<F>(&mut self, event: InputEvent, probe: F) -> Vec<Intent>
    where
        F: FnOnce(Point, Size) -> bool,
    {
        let mut intents = Vec::new();

        match event {
            InputEvent::KeyDown(Key::Escape) => intents.push(Intent::Quit),
            InputEvent::KeyDown(Key::Shift) => self.modifier_held = true,
            InputEvent::KeyUp(Key::Shift) => self.modifier_held = false,
            InputEvent::KeyDown(_) | InputEvent::KeyUp(_) => {}
            InputEvent::PointerDown { button, screen } => {
                self.pointer_down(button, screen, &mut intents)
            }
            InputEvent::PointerMove {
                screen,
                local,
                displayed,
            } => self.pointer_move(screen, local, displayed, probe, &mut intents),
            InputEvent::PointerUp { button } => self.pointer_up(button, &mut intents),
            InputEvent::ContextMenu => self.context_menu(&mut intents),
        }

        intents
    }

    /// Settles the last button release. A primary release that never became
    /// a drag toggles audio capture.
    pub fn tick(&mut self) -> Vec<Intent> {
        match self.settling.take() {
            Some(Release {
                button: PointerButton::Primary,
                dragged: false,
            }) => {
                tracing::debug!("click settled, toggling audio");
                vec![Intent::ToggleAudio]
            }
            _ => Vec::new(),
        }
    }

    fn pointer_down(&mut self, button: PointerButton, screen: Point, intents: &mut Vec<Intent>) {
        if !self.is_idle() || button == PointerButton::Other {
            return;
        }
        intents.extend(self.tick());
        self.state = RouterState::PendingClick {
            button,
            origin: screen,
        };
    }

    fn pointer_move<F>(
        &mut self,
        screen: Point,
        local: Point,
        displayed: Size,
        probe: F,
        intents: &mut Vec<Intent>,
    ) where
        F: FnOnce(Point, Size) -> bool,
    {
        match self.state {
            RouterState::Idle => {
                let opaque = probe(local, displayed);
                self.set_click_through(!opaque, intents);
            }
            RouterState::PendingClick { button, origin } => {
                let dx = screen.x - origin.x;
                let dy = screen.y - origin.y;
                if dx.abs() <= DRAG_THRESHOLD && dy.abs() <= DRAG_THRESHOLD {
                    return;
                }
                let mode = if button == PointerButton::Secondary {
                    DragMode::Resize
                } else {
                    DragMode::Move
                };
                tracing::debug!(?mode, "drag started");
                self.set_click_through(false, intents);
                self.state = RouterState::Dragging { mode, last: origin };
                self.emit_drag(screen, intents);
            }
            RouterState::Dragging { .. } => self.emit_drag(screen, intents),
        }
    }

    fn emit_drag(&mut self, screen: Point, intents: &mut Vec<Intent>) {
        let RouterState::Dragging { mode, last } = &mut self.state else {
            return;
        };
        let delta_x = (screen.x - last.x).round() as i32;
        let delta_y = (screen.y - last.y).round() as i32;
        if delta_x == 0 && delta_y == 0 {
            return;
        }
        // Advance by the whole pixels emitted so fractions carry over.
        last.x += f64::from(delta_x);
        last.y += f64::from(delta_y);

        match mode {
            DragMode::Move => intents.push(Intent::MoveBy { delta_x, delta_y }),
            DragMode::Resize if delta_x != 0 => intents.push(Intent::ResizeBy { delta_x }),
            DragMode::Resize => {}
        }
    }

    fn pointer_up(&mut self, button: PointerButton, intents: &mut Vec<Intent>) {
        let dragged = match self.state {
            RouterState::PendingClick { button: held, .. } if held == button => false,
            RouterState::Dragging { mode, .. } if drag_button(mode) == button => true,
            _ => return,
        };

        self.state = RouterState::Idle;
        self.settling = Some(Release { button, dragged });

        if std::mem::take(&mut self.cycle_on_release) && !dragged {
            intents.push(Intent::CycleSkin);
        }
    }

    fn context_menu(&mut self, intents: &mut Vec<Intent>) {
        let just_dragged = self.is_dragging()
            || matches!(self.settling, Some(Release { dragged: true, .. }));
        if just_dragged || !self.modifier_held {
            return;
        }

        match self.state {
            RouterState::Idle => intents.push(Intent::CycleSkin),
            // Menu raised on press: wait for the release so reloads only run
            // from idle.
            RouterState::PendingClick {
                button: PointerButton::Secondary,
                ..
            } => self.cycle_on_release = true,
            _ => {}
        }
    }

    fn set_click_through(&mut self, enabled: bool, intents: &mut Vec<Intent>) {
        if self.click_through == Some(enabled) {
            return;
        }
        self.click_through = Some(enabled);
        intents.push(Intent::SetClickThrough {
            enabled,
            forward: enabled,
        });
        intents.push(Intent::SetCursor(if enabled {
            CursorStyle::Default
        } else {
            CursorStyle::Pointer
        }));
    }
}

fn drag_button(mode: DragMode) -> PointerButton {
    match mode {
        DragMode::Move => PointerButton::Primary,
        DragMode::Resize => PointerButton::Secondary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAYED: Size = Size::new(300.0, 300.0);

    fn down(router: &mut InputRouter, button: PointerButton, x: f64, y: f64) -> Vec<Intent> {
        router.handle(
            InputEvent::PointerDown {
                button,
                screen: Point::new(x, y),
            },
            |_, _| panic!("no probe while pressing"),
        )
    }

    fn move_to(router: &mut InputRouter, x: f64, y: f64, opaque: bool) -> Vec<Intent> {
        router.handle(
            InputEvent::PointerMove {
                screen: Point::new(x, y),
                local: Point::new(x, y),
                displayed: DISPLAYED,
            },
            |_, _| opaque,
        )
    }

    fn up(router: &mut InputRouter, button: PointerButton) -> Vec<Intent> {
        router.handle(InputEvent::PointerUp { button }, |_, _| false)
    }

    fn key(router: &mut InputRouter, event: InputEvent) -> Vec<Intent> {
        router.handle(event, |_, _| false)
    }

    #[test]
    fn click_toggles_audio_after_settle() {
        let mut router = InputRouter::new();
        down(&mut router, PointerButton::Primary, 10.0, 10.0);
        move_to(&mut router, 13.0, 12.0, true);
        assert!(up(&mut router, PointerButton::Primary).is_empty());
        assert!(router.is_idle());
        assert_eq!(router.tick(), [Intent::ToggleAudio]);
        assert!(router.tick().is_empty());
    }

    #[test]
    fn primary_drag_moves_with_frame_to_frame_deltas() {
        let mut router = InputRouter::new();
        down(&mut router, PointerButton::Primary, 100.0, 100.0);
        assert!(move_to(&mut router, 104.0, 100.0, true).is_empty());

        let intents = move_to(&mut router, 108.0, 101.0, true);
        assert_eq!(
            intents,
            [
                Intent::SetClickThrough {
                    enabled: false,
                    forward: false
                },
                Intent::SetCursor(CursorStyle::Pointer),
                Intent::MoveBy {
                    delta_x: 8,
                    delta_y: 1
                },
            ]
        );
        assert_eq!(
            move_to(&mut router, 110.0, 105.0, true),
            [Intent::MoveBy {
                delta_x: 2,
                delta_y: 4
            }]
        );

        up(&mut router, PointerButton::Primary);
        assert!(router.tick().is_empty());
    }

    #[test]
    fn secondary_drag_resizes() {
        let mut router = InputRouter::new();
        down(&mut router, PointerButton::Secondary, 50.0, 50.0);
        let intents = move_to(&mut router, 40.0, 60.0, false);
        assert!(intents.contains(&Intent::ResizeBy { delta_x: -10 }));
        assert_eq!(
            router.state(),
            RouterState::Dragging {
                mode: DragMode::Resize,
                last: Point::new(40.0, 60.0)
            }
        );
        assert!(move_to(&mut router, 40.0, 70.0, false).is_empty());
    }

    #[test]
    fn fractional_moves_accumulate() {
        let mut router = InputRouter::new();
        down(&mut router, PointerButton::Primary, 0.0, 0.0);
        move_to(&mut router, 10.0, 0.0, true);
        let mut total = 0;
        for step in 1..=4 {
            for intent in move_to(&mut router, 10.0 + 0.4 * step as f64, 0.0, true) {
                if let Intent::MoveBy { delta_x, .. } = intent {
                    total += delta_x;
                }
            }
        }
        assert_eq!(total, 2);
    }

    #[test]
    fn hover_switches_click_through_on_change_only() {
        let mut router = InputRouter::new();
        assert_eq!(
            move_to(&mut router, 1.0, 1.0, false),
            [
                Intent::SetClickThrough {
                    enabled: true,
                    forward: true
                },
                Intent::SetCursor(CursorStyle::Default),
            ]
        );
        assert!(move_to(&mut router, 2.0, 1.0, false).is_empty());
        assert_eq!(
            move_to(&mut router, 3.0, 1.0, true)[0],
            Intent::SetClickThrough {
                enabled: false,
                forward: false
            }
        );
    }

    #[test]
    fn shift_context_menu_cycles_skin() {
        let mut router = InputRouter::new();
        key(&mut router, InputEvent::KeyDown(Key::Shift));
        down(&mut router, PointerButton::Secondary, 5.0, 5.0);
        up(&mut router, PointerButton::Secondary);
        assert_eq!(key(&mut router, InputEvent::ContextMenu), [Intent::CycleSkin]);
        assert!(router.tick().is_empty());

        key(&mut router, InputEvent::KeyUp(Key::Shift));
        assert!(key(&mut router, InputEvent::ContextMenu).is_empty());
    }

    #[test]
    fn context_menu_on_press_waits_for_release() {
        let mut router = InputRouter::new();
        key(&mut router, InputEvent::KeyDown(Key::Shift));
        down(&mut router, PointerButton::Secondary, 5.0, 5.0);
        assert!(key(&mut router, InputEvent::ContextMenu).is_empty());
        assert_eq!(up(&mut router, PointerButton::Secondary), [Intent::CycleSkin]);
    }

    #[test]
    fn context_menu_after_drag_is_suppressed() {
        let mut router = InputRouter::new();
        key(&mut router, InputEvent::KeyDown(Key::Shift));
        down(&mut router, PointerButton::Secondary, 0.0, 0.0);
        move_to(&mut router, 20.0, 0.0, true);
        up(&mut router, PointerButton::Secondary);
        assert!(key(&mut router, InputEvent::ContextMenu).is_empty());

        router.tick();
        down(&mut router, PointerButton::Secondary, 0.0, 0.0);
        assert!(key(&mut router, InputEvent::ContextMenu).is_empty());
        move_to(&mut router, 0.0, 30.0, true);
        assert!(!up(&mut router, PointerButton::Secondary).contains(&Intent::CycleSkin));
    }

    #[test]
    fn hit_test_is_skipped_while_a_button_is_held() {
        let calls = std::cell::Cell::new(0);
        let mut router = InputRouter::new();
        let hover = |router: &mut InputRouter, x: f64| {
            router.handle(
                InputEvent::PointerMove {
                    screen: Point::new(x, 0.0),
                    local: Point::new(x, 0.0),
                    displayed: DISPLAYED,
                },
                |_, _| {
                    calls.set(calls.get() + 1);
                    true
                },
            )
        };

        hover(&mut router, 0.0);
        assert_eq!(calls.get(), 1);

        down(&mut router, PointerButton::Primary, 0.0, 0.0);
        hover(&mut router, 3.0);
        assert!(matches!(router.state(), RouterState::PendingClick { .. }));
        hover(&mut router, 30.0);
        assert!(router.is_dragging());
        hover(&mut router, 60.0);
        assert_eq!(calls.get(), 1);

        up(&mut router, PointerButton::Primary);
        hover(&mut router, 61.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn escape_quits_from_any_state() {
        let mut router = InputRouter::new();
        assert_eq!(key(&mut router, InputEvent::KeyDown(Key::Escape)), [Intent::Quit]);
        down(&mut router, PointerButton::Primary, 0.0, 0.0);
        move_to(&mut router, 50.0, 0.0, true);
        assert!(router.is_dragging());
        assert_eq!(key(&mut router, InputEvent::KeyDown(Key::Escape)), [Intent::Quit]);
    }

    #[test]
    fn mismatched_release_is_ignored() {
        let mut router = InputRouter::new();
        down(&mut router, PointerButton::Primary, 0.0, 0.0);
        up(&mut router, PointerButton::Secondary);
        assert!(!router.is_idle());
        up(&mut router, PointerButton::Primary);
        assert!(router.is_idle());
    }

    #[test]
    fn new_press_settles_previous_click_first() {
        let mut router = InputRouter::new();
        down(&mut router, PointerButton::Primary, 0.0, 0.0);
        up(&mut router, PointerButton::Primary);
        assert_eq!(
            down(&mut router, PointerButton::Primary, 0.0, 0.0),
            [Intent::ToggleAudio]
        );
    }
}
