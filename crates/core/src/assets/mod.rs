use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::Result;

/// Extensions recognised as skin images, compared case-insensitively.
pub const SKIN_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Image shown when the assets directory holds no skins.
pub const FALLBACK_SKIN: &str = "default.png";

/// Ordered list of skin images found in the assets directory, plus the index
/// of the one on screen.
#[derive(Debug, Default)]
pub struct SkinCatalog {
    dir: PathBuf,
    skins: Vec<String>,
    current: usize,
}

impl SkinCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            skins: Vec::new(),
            current: 0,
        }
    }

    /// Creates a catalog and scans it once. A missing directory yields an
    /// empty catalog.
    pub fn scan(dir: impl Into<PathBuf>) -> Self {
        let mut catalog = Self::new(dir);
        catalog.rescan();
        catalog
    }

    pub fn skins(&self) -> &[String] {
        &self.skins
    }

    pub fn len(&self) -> usize {
        self.skins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skins.is_empty()
    }

    pub fn index(&self) -> usize {
        self.current
    }

    /// Re-reads the directory, keeping the current index. Failures leave an
    /// empty list behind and are only logged.
    pub fn rescan(&mut self) {
        match list_skins(&self.dir) {
            Ok(skins) => {
                tracing::info!(count = skins.len(), dir = %self.dir.display(), "loaded skins");
                self.skins = skins;
            }
            Err(err) => {
                tracing::error!(dir = %self.dir.display(), error = %err, "failed to load skins");
                self.skins.clear();
            }
        }
    }

    /// Path of the skin to display: the current entry, or [`FALLBACK_SKIN`]
    /// when the catalog is empty.
    pub fn current_path(&self) -> PathBuf {
        match self.skins.get(self.current % self.skins.len().max(1)) {
            Some(name) => self.dir.join(name),
            None => self.dir.join(FALLBACK_SKIN),
        }
    }

    /// Points the catalog at `index`, wrapped to the catalog length. Used to
    /// step back when the skin [`cycle`](Self::cycle) advanced to won't load.
    pub fn select(&mut self, index: usize) {
        self.current = index % self.skins.len().max(1);
    }

    /// Advances to the next skin, wrapping around. Returns the new path, or
    /// `None` on an empty catalog.
    pub fn cycle(&mut self) -> Option<PathBuf> {
        if self.skins.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.skins.len();
        Some(self.dir.join(&self.skins[self.current]))
    }
}

/// Lists skin file names in directory order (not sorted).
pub fn list_skins(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "assets folder does not exist");
        return Ok(Vec::new());
    }

    let mut skins = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_skin_file(Path::new(name)) {
            skins.push(name.to_string());
        }
    }
    Ok(skins)
}

pub fn is_skin_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SKIN_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
