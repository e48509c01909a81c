//! Core library for the Audio Pet desktop overlay.
//!
//! A transparent always-on-top window shows a skin image that scales, skews,
//! rotates and flips with the system audio. Each module owns one part of
//! that: config documents, the skin catalog, audio capture and frequency
//! analysis, the per-frame animation engine, pixel hit testing for
//! click-through, the pointer/keyboard state machine, and the overlay
//! controller that ties them to the platform window.

pub mod analysis;
pub mod animation;
pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod hittest;
pub mod input;
pub mod overlay;
pub mod window;

pub use analysis::{FrequencyAnalyser, FrequencySnapshot};
pub use animation::{AnimationEngine, AnimationState, Bands, Transform2D};
pub use assets::SkinCatalog;
pub use audio::{
    AsyncCapture, AudioTap, BackgroundCapture, CaptureBackend, CaptureSource, LoopbackStream,
    SampleQueue,
};
pub use config::{AnimationConfig, ConfigStore, GeneralConfig};
pub use error::{PetError, Result};
pub use hittest::{HitTester, PixelBuffer};
pub use input::{InputEvent, InputRouter, Intent};
pub use overlay::{Overlay, OverlayEvent, OverlayPaths};
pub use window::{Display, WindowController, WindowSpec};
