//! Platform surfaces the overlay drives, plus the geometry they share.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{GeneralConfig, Transform2D};

/// Side below which a square resize never goes.
pub const MIN_RESIZE_SIDE: u32 = 100;
/// Minimum size the window system is asked to enforce.
pub const MIN_WINDOW_SIDE: u32 = 50;
/// Gap between the initial window and the work area's bottom-right corner.
pub const SCREEN_MARGIN: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStyle {
    Default,
    Pointer,
}

/// Window operations. Calls are fire-and-forget.
pub trait WindowController {
    /// Grows or shrinks the window by `delta_x`, keeping it square.
    fn resize_by(&mut self, delta_x: i32);
    fn move_by(&mut self, delta_x: i32, delta_y: i32);
    /// When `enabled`, pointer input falls through to the window beneath;
    /// `forward` keeps move events flowing to the overlay meanwhile.
    fn set_click_through(&mut self, enabled: bool, forward: bool);
    fn terminate(&mut self);
}

/// Visual surface hosting the skin image.
pub trait Display {
    fn show_skin(&mut self, path: &Path);
    fn apply_transform(&mut self, transform: Transform2D);
    /// Switches between the active (capturing) and inactive look.
    fn set_active(&mut self, active: bool);
    fn set_cursor(&mut self, cursor: CursorStyle);
    /// Blocking user notice.
    fn notify(&mut self, message: &str);
}

/// New side of a square window after a resize drag.
pub fn resize_square(current: u32, delta_x: i32) -> u32 {
    let side = i64::from(current) + i64::from(delta_x);
    side.clamp(i64::from(MIN_RESIZE_SIDE), i64::from(u32::MAX)) as u32
}

/// Creation parameters for the overlay window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
    pub min_width: u32,
    pub min_height: u32,
    pub transparent: bool,
    pub frameless: bool,
    pub has_shadow: bool,
    pub always_on_top: bool,
}

impl WindowSpec {
    /// Places the configured window at the bottom-right of `work_area`.
    pub fn from_config(config: &GeneralConfig, work_area: (u32, u32)) -> Self {
        let window = &config.window;
        let x = work_area.0 as i32 - window.width as i32 - SCREEN_MARGIN;
        let y = work_area.1 as i32 - window.height as i32 - SCREEN_MARGIN;
        Self {
            width: window.width,
            height: window.height,
            x,
            y,
            min_width: MIN_WINDOW_SIDE,
            min_height: MIN_WINDOW_SIDE,
            transparent: true,
            frameless: true,
            has_shadow: false,
            always_on_top: window.always_on_top,
        }
    }
}
