use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{PetError, Result};

/// File name of the general window configuration inside the configs directory.
pub const GENERAL_CONFIG_FILE: &str = "config.json";

/// Top-level configuration document for the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralConfig {
    pub window: WindowConfig,
    /// Name of the animation config document used when a skin has none of its own.
    pub app_config: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            app_config: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub always_on_top: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            always_on_top: true,
        }
    }
}

/// Tuning for the audio-reactive transform. Immutable for a session; a new
/// value is loaded whenever the skin or config changes.
///
/// `lerp_amt` values are expected in `[0, 1]` but are not validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnimationConfig {
    pub scale: ScaleConfig,
    pub skew: SkewConfig,
    pub rotate: RotateConfig,
    pub flip: FlipConfig,
    pub lerp_amt: LerpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Minimum visible scale.
    pub base: f32,
    pub pow: f32,
    pub amp: f32,
    pub bias: f32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            base: 0.8,
            pow: 1.2,
            amp: 8.0,
            bias: -4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkewConfig {
    pub amp: f32,
    pub pow: f32,
    /// Snapshot bin whose parity picks the skew direction.
    pub dir_idx: usize,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            amp: 80.0,
            pow: 2.0,
            dir_idx: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotateConfig {
    pub amp: f32,
    pub bias: f32,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            amp: 60.0,
            bias: -5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipConfig {
    /// Bass level that must be exceeded before a flip is considered.
    pub threshold: f32,
    /// A flip happens when a uniform draw is greater than this value, so a
    /// larger `prob` means fewer flips.
    pub prob: f64,
}

impl Default for FlipConfig {
    fn default() -> Self {
        Self {
            threshold: 200.0,
            prob: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LerpConfig {
    pub scale: f32,
    pub skew: f32,
    pub rotate: f32,
}

impl Default for LerpConfig {
    fn default() -> Self {
        Self {
            scale: 0.9,
            skew: 0.3,
            rotate: 0.2,
        }
    }
}

/// Value read by [`ConfigStore`], together with the error that was recovered
/// from while reading it, if any.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub recovered: Option<PetError>,
}

/// Reads and writes the JSON documents kept in the configs directory.
#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    notice_pending: bool,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            notice_pending: true,
        }
    }

    pub fn general_path(&self) -> PathBuf {
        self.dir.join(GENERAL_CONFIG_FILE)
    }

    pub fn animation_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn load_general(&self) -> Loaded<GeneralConfig> {
        load_or_create(&self.general_path())
    }

    pub fn load_animation(&self, name: &str) -> Loaded<AnimationConfig> {
        load_or_create(&self.animation_path(name))
    }

    /// Picks the animation document for a skin: `<skin stem>.json` when it
    /// exists, otherwise the document named by `general.app_config`.
    pub fn load_for_skin(
        &self,
        general: &GeneralConfig,
        skin: Option<&Path>,
    ) -> Loaded<AnimationConfig> {
        let own = skin
            .and_then(|path| path.file_stem())
            .and_then(|stem| stem.to_str())
            .filter(|stem| self.animation_path(stem).is_file());

        match own {
            Some(stem) => {
                tracing::debug!(stem, "using skin specific animation config");
                self.load_animation(stem)
            }
            None => self.load_animation(&general.app_config),
        }
    }

    /// Returns `true` only for the first recovered error of the session, so
    /// the user sees a single notice no matter how many documents fell back.
    pub fn take_notice(&mut self, loaded_error: Option<&PetError>) -> bool {
        if loaded_error.is_some() && self.notice_pending {
            self.notice_pending = false;
            true
        } else {
            false
        }
    }
}

/// Reads `path` as JSON. A missing or malformed document is replaced by
/// `T::default()`, which is also written back when the directory allows it.
pub fn load_or_create<T>(path: &Path) -> Loaded<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let recovered = match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<T>(&text) {
            Ok(value) => {
                return Loaded {
                    value,
                    recovered: None,
                }
            }
            Err(err) => PetError::config(path, err),
        },
        Err(err) => PetError::config(path, err),
    };

    tracing::warn!(path = %path.display(), error = %recovered, "falling back to default config");
    let value = T::default();
    if let Err(err) = save(path, &value) {
        tracing::warn!(path = %path.display(), error = %err, "default config kept in memory only");
    }

    Loaded {
        value,
        recovered: Some(recovered),
    }
}

/// Writes `value` as pretty-printed JSON, creating parent directories.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text)?;
    Ok(())
}
