//! Audio-reactive transform pipeline: band extraction, target curves,
//! exponential smoothing and the randomised horizontal flip.

use std::ops::Range;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{AnimationConfig, FrequencySnapshot, PetError, Result};

pub const BASS_BINS: Range<usize> = 0..4;
pub const MID_BINS: Range<usize> = 10..20;
pub const HIGH_BINS: Range<usize> = 80..120;

/// Smallest snapshot the fixed band ranges can be read from.
pub const MIN_SNAPSHOT_BINS: usize = HIGH_BINS.end;

/// Mean magnitude of the three coarse frequency bands, each in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bands {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
}

impl Bands {
    pub fn extract(snapshot: &FrequencySnapshot) -> Result<Self> {
        let bins = snapshot.bins();
        if bins.len() < MIN_SNAPSHOT_BINS {
            return Err(PetError::ShortSnapshot { len: bins.len() });
        }

        Ok(Self {
            bass: mean(&bins[BASS_BINS]),
            mid: mean(&bins[MID_BINS]),
            high: mean(&bins[HIGH_BINS]),
        })
    }
}

fn mean(bins: &[u8]) -> f32 {
    let sum: u32 = bins.iter().map(|&bin| u32::from(bin)).sum();
    sum as f32 / bins.len() as f32
}

/// 2D transform handed to the display, applied as scale, then skew, then
/// rotation. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    pub scale_x: f32,
    pub scale_y: f32,
    pub skew_x_deg: f32,
    pub rotate_deg: f32,
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
        skew_x_deg: 0.0,
        rotate_deg: 0.0,
    };

    /// CSS-style rendering, handy for logs.
    pub fn to_css(&self) -> String {
        format!(
            "scale({}, {}) skewX({}deg) rotate({}deg)",
            self.scale_x, self.scale_y, self.skew_x_deg, self.rotate_deg
        )
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Smoothed values carried from one frame to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationState {
    pub current_scale: f32,
    pub current_skew: f32,
    pub current_rotate: f32,
    /// Either `1.0` or `-1.0`.
    pub flip_x: f32,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            current_scale: 1.0,
            current_skew: 0.0,
            current_rotate: 0.0,
            flip_x: 1.0,
        }
    }
}

impl AnimationState {
    pub fn transform(&self) -> Transform2D {
        Transform2D {
            scale_x: self.current_scale * self.flip_x,
            scale_y: self.current_scale,
            skew_x_deg: self.current_skew,
            rotate_deg: self.current_rotate,
        }
    }
}

pub fn scale_target(bass: f32, cfg: &AnimationConfig) -> f32 {
    let scale = &cfg.scale;
    ((bass / 255.0).powf(scale.pow) * scale.amp + scale.bias).max(scale.base)
}

/// Skew magnitude from the mid band; negative when the direction bin is even.
pub fn skew_target(mid: f32, snapshot: &FrequencySnapshot, cfg: &AnimationConfig) -> f32 {
    let skew = &cfg.skew;
    let magnitude = (mid / 255.0).powf(skew.pow) * skew.amp;
    match snapshot.get(skew.dir_idx) {
        Some(bin) if bin % 2 == 0 => -magnitude,
        _ => magnitude,
    }
}

pub fn rotate_target(high: f32, cfg: &AnimationConfig) -> f32 {
    (high / 255.0) * cfg.rotate.amp + cfg.rotate.bias
}

pub fn lerp(start: f32, end: f32, amt: f32) -> f32 {
    (1.0 - amt) * start + amt * end
}

/// Per-frame driver owning the persistent [`AnimationState`].
#[derive(Debug, Clone, Default)]
pub struct AnimationEngine {
    state: AnimationState,
}

impl AnimationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: AnimationState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    /// Returns the engine to `{1, 0, 0, 1}`.
    pub fn reset(&mut self) {
        self.state = AnimationState::default();
    }

    /// Advances one frame. The only randomness is the flip draw taken from
    /// `rng`, and only when the bass exceeds the flip threshold.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        snapshot: &FrequencySnapshot,
        cfg: &AnimationConfig,
        rng: &mut R,
    ) -> Result<Transform2D> {
        let bands = Bands::extract(snapshot)?;

        let scale = scale_target(bands.bass, cfg);
        let skew = skew_target(bands.mid, snapshot, cfg);
        let rotate = rotate_target(bands.high, cfg);

        let state = &mut self.state;
        state.current_scale = lerp(state.current_scale, scale, cfg.lerp_amt.scale);
        state.current_skew = lerp(state.current_skew, skew, cfg.lerp_amt.skew);
        state.current_rotate = lerp(state.current_rotate, rotate, cfg.lerp_amt.rotate);

        if bands.bass > cfg.flip.threshold && rng.gen::<f64>() > cfg.flip.prob {
            state.flip_x = -state.flip_x;
        }

        Ok(state.transform())
    }
}
