use std::path::Path;

use image::RgbaImage;

use crate::{
    window::{Point, Size},
    PetError, Result,
};

/// Alpha values below this are treated as transparent so anti-aliased edges
/// do not flicker between states.
pub const ALPHA_THRESHOLD: u8 = 10;

/// Decoded RGBA raster of the skin currently on screen.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Decodes an image file. A missing file is reported as
    /// [`PetError::SkinMissing`].
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PetError::SkinMissing(path.to_path_buf()));
        }
        let image = image::open(path)?.into_rgba8();
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Alpha of the buffer pixel under `point`, where `point` is relative to
    /// the image's top-left corner in display coordinates and `displayed` is
    /// the on-screen size of the image.
    pub fn alpha_at(&self, point: Point, displayed: Size) -> Result<u8> {
        if displayed.width <= 0.0 || displayed.height <= 0.0 {
            return Err(PetError::HitTest("image is not laid out".into()));
        }

        let scale_x = f64::from(self.width()) / displayed.width;
        let scale_y = f64::from(self.height()) / displayed.height;
        let px = (point.x * scale_x).floor();
        let py = (point.y * scale_y).floor();

        let inside = px >= 0.0
            && py >= 0.0
            && px < f64::from(self.width())
            && py < f64::from(self.height());
        if !inside {
            return Err(PetError::HitTest(format!("pixel ({px}, {py}) out of bounds")));
        }

        Ok(self.image.get_pixel(px as u32, py as u32)[3])
    }
}

/// Decides whether the pointer is over a visible part of the skin.
#[derive(Debug, Default)]
pub struct HitTester {
    buffer: Option<PixelBuffer>,
}

impl HitTester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the buffer once a skin has been fully decoded.
    pub fn set_buffer(&mut self, buffer: PixelBuffer) {
        self.buffer = Some(buffer);
    }

    /// `true` when the pixel under `point` has alpha of at least
    /// [`ALPHA_THRESHOLD`]. Anything that cannot be read counts as
    /// transparent.
    pub fn is_opaque(&self, point: Point, displayed: Size) -> bool {
        let Some(buffer) = &self.buffer else {
            return false;
        };

        match buffer.alpha_at(point, displayed) {
            Ok(alpha) => alpha >= ALPHA_THRESHOLD,
            Err(err) => {
                tracing::trace!(error = %err, "hit test treated as transparent");
                false
            }
        }
    }
}
