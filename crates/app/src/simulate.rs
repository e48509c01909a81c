//! Headless run of the overlay: a tracing-backed window surface and a
//! loopback that plays a clip in real-time-sized chunks.

use std::{f32::consts::PI, path::Path};

use audio_pet_core::{
    input::PointerButton,
    window::{resize_square, CursorStyle, Point},
    BackgroundCapture, CaptureBackend, CaptureSource, Display, GeneralConfig, InputEvent,
    LoopbackStream, Overlay, OverlayEvent, OverlayPaths, PetError, Result, Transform2D,
    WindowController, WindowSpec,
};
use rand::{rngs::StdRng, SeedableRng};

const FRAMES_PER_SECOND: u32 = 60;
const WORK_AREA: (u32, u32) = (1920, 1080);

pub fn run(
    paths: &OverlayPaths,
    wav: Option<&Path>,
    frames: u32,
    seed: Option<u64>,
) -> Result<()> {
    let clip = match wav {
        Some(path) => Clip::from_wav(path)?,
        None => Clip::bass_pulse(48_000, 2.0),
    };
    tracing::info!(
        source = %clip.name,
        sample_rate = clip.sample_rate,
        seconds = clip.samples.len() as f32 / clip.sample_rate as f32,
        "simulating overlay"
    );

    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let capture = BackgroundCapture::new(ClipCapture { clip });
    let mut overlay = Overlay::launch(paths, LogSurface::new(), capture, rng)?;
    let spec = WindowSpec::from_config(overlay.general_config(), WORK_AREA);
    overlay.platform_mut().place(spec);

    overlay.push_input(InputEvent::PointerDown {
        button: PointerButton::Primary,
        screen: Point::default(),
    });
    overlay.push_input(InputEvent::PointerUp {
        button: PointerButton::Primary,
    });

    for _ in 0..frames {
        overlay.push(OverlayEvent::Frame);
        overlay.run_pending()?;
        if !overlay.is_running() {
            break;
        }
    }

    let surface = overlay.platform();
    tracing::info!(
        frames = surface.frames,
        flips = surface.flips,
        peak_scale = surface.peak_scale,
        "simulation finished"
    );
    Ok(())
}

/// Window and display surface that only logs what a real window would do.
#[derive(Debug)]
struct LogSurface {
    spec: WindowSpec,
    frames: u32,
    flips: u32,
    peak_scale: f32,
    last_sign: f32,
}

impl LogSurface {
    fn new() -> Self {
        Self {
            spec: WindowSpec::from_config(&GeneralConfig::default(), WORK_AREA),
            frames: 0,
            flips: 0,
            peak_scale: 0.0,
            last_sign: 1.0,
        }
    }

    fn place(&mut self, spec: WindowSpec) {
        tracing::info!(?spec, "creating overlay window");
        self.spec = spec;
    }
}

impl WindowController for LogSurface {
    fn resize_by(&mut self, delta_x: i32) {
        let side = resize_square(self.spec.width, delta_x);
        self.spec.width = side;
        self.spec.height = side;
        tracing::info!(side, "window resized");
    }

    fn move_by(&mut self, delta_x: i32, delta_y: i32) {
        self.spec.x += delta_x;
        self.spec.y += delta_y;
        tracing::info!(x = self.spec.x, y = self.spec.y, "window moved");
    }

    fn set_click_through(&mut self, enabled: bool, forward: bool) {
        tracing::debug!(enabled, forward, "click-through");
    }

    fn terminate(&mut self) {
        tracing::info!("window closed");
    }
}

impl Display for LogSurface {
    fn show_skin(&mut self, path: &Path) {
        tracing::info!(skin = %path.display(), "showing skin");
    }

    fn apply_transform(&mut self, transform: Transform2D) {
        if transform == Transform2D::IDENTITY {
            tracing::debug!("transform reset");
            return;
        }
        self.frames += 1;
        self.peak_scale = self.peak_scale.max(transform.scale_y);
        let sign = transform.scale_x.signum();
        if sign != self.last_sign {
            self.flips += 1;
            self.last_sign = sign;
        }
        tracing::debug!(frame = self.frames, transform = %transform.to_css());
    }

    fn set_active(&mut self, active: bool) {
        tracing::info!(active, "pet state");
    }

    fn set_cursor(&mut self, cursor: CursorStyle) {
        tracing::trace!(?cursor, "cursor");
    }

    fn notify(&mut self, message: &str) {
        tracing::warn!(notice = message, "user notice");
    }
}

/// Mono clip held in memory.
#[derive(Debug, Clone)]
struct Clip {
    name: String,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl Clip {
    fn from_wav(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .map_err(|err| PetError::msg(format!("{}: {err}", path.display())))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|err| PetError::msg(err.to_string()))?,
            hound::SampleFormat::Int => {
                let full_scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / full_scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|err| PetError::msg(err.to_string()))?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self {
            name: path.display().to_string(),
            sample_rate: spec.sample_rate,
            samples,
        })
    }

    /// 55 Hz kick on every beat at 120 BPM, with a faint hi-hat between.
    fn bass_pulse(sample_rate: u32, seconds: f32) -> Self {
        let len = (sample_rate as f32 * seconds) as usize;
        let beat = sample_rate as f32 * 0.5;
        let samples = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let since_beat = (i as f32 % beat) / sample_rate as f32;
                let kick = (-since_beat * 8.0).exp() * (2.0 * PI * 55.0 * t).sin();
                let hat = 0.05 * (2.0 * PI * 9_000.0 * t).sin();
                0.8 * kick + hat
            })
            .collect();

        Self {
            name: "generated bass pulse".to_string(),
            sample_rate,
            samples,
        }
    }
}

struct ClipCapture {
    clip: Clip,
}

impl CaptureBackend for ClipCapture {
    fn sources(&mut self) -> Result<Vec<CaptureSource>> {
        Ok(vec![CaptureSource {
            id: "clip:0".to_string(),
            name: self.clip.name.clone(),
        }])
    }

    fn open(&mut self, _source: &CaptureSource) -> Result<Box<dyn LoopbackStream + Send>> {
        if self.clip.samples.is_empty() {
            return Err(PetError::CaptureSetup("clip has no samples".into()));
        }
        let chunk = (self.clip.sample_rate / FRAMES_PER_SECOND).max(1) as usize;
        Ok(Box::new(ClipStream {
            samples: self.clip.samples.clone(),
            position: 0,
            chunk,
        }))
    }
}

/// Loops the clip, handing out one frame's worth of samples per read.
struct ClipStream {
    samples: Vec<f32>,
    position: usize,
    chunk: usize,
}

impl LoopbackStream for ClipStream {
    fn read(&mut self, out: &mut Vec<f32>) -> Result<()> {
        for _ in 0..self.chunk {
            out.push(self.samples[self.position]);
            self.position = (self.position + 1) % self.samples.len();
        }
        Ok(())
    }
}
