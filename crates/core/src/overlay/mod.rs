use std::{
    collections::VecDeque,
    fmt,
    path::{Path, PathBuf},
};

use rand::Rng;

use crate::{
    audio::{AsyncCapture, LoopbackStream, SetupTicket},
    input::{InputEvent, InputRouter, Intent},
    window::{Display, WindowController},
    AnimationConfig, AnimationEngine, AudioTap, ConfigStore, GeneralConfig, HitTester,
    PetError, PixelBuffer, Result, SkinCatalog, Transform2D,
};

/// Directory layout the overlay reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayPaths {
    pub configs: PathBuf,
    pub assets: PathBuf,
}

impl OverlayPaths {
    pub fn from_root(root: &Path) -> Self {
        Self {
            configs: root.join("configs"),
            assets: root.join("assets"),
        }
    }
}

/// Work item for the overlay's single-threaded loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayEvent {
    Input(InputEvent),
    /// One display refresh. Also collects capture setups that finished since
    /// the previous frame.
    Frame,
}

/// The running pet: wires input, audio, animation and hit testing to the
/// platform surfaces.
pub struct Overlay<P, B, R> {
    platform: P,
    backend: B,
    rng: R,
    store: ConfigStore,
    general: GeneralConfig,
    animation: AnimationConfig,
    catalog: SkinCatalog,
    hit: HitTester,
    tap: AudioTap,
    engine: AnimationEngine,
    router: InputRouter,
    queue: VecDeque<OverlayEvent>,
    running: bool,
}

impl<P, B, R> Overlay<P, B, R>
where
    P: WindowController + Display,
    B: AsyncCapture,
    R: Rng,
{
    /// Loads configs and the first skin and shows the inactive pet. A missing
    /// skin notifies the user, terminates the window and returns the error.
    pub fn launch(paths: &OverlayPaths, platform: P, backend: B, rng: R) -> Result<Self> {
        let store = ConfigStore::new(&paths.configs);
        let general = store.load_general();
        let catalog = SkinCatalog::scan(&paths.assets);

        let mut overlay = Self {
            platform,
            backend,
            rng,
            store,
            general: general.value,
            animation: AnimationConfig::default(),
            catalog,
            hit: HitTester::new(),
            tap: AudioTap::new(),
            engine: AnimationEngine::new(),
            router: InputRouter::new(),
            queue: VecDeque::new(),
            running: true,
        };
        overlay.notice(general.recovered);

        let skin = overlay.catalog.current_path();
        overlay.load_skin(&skin)?;
        overlay.platform.set_active(false);
        tracing::info!(skin = %skin.display(), "overlay ready");
        Ok(overlay)
    }

    pub fn push(&mut self, event: OverlayEvent) {
        self.queue.push_back(event);
    }

    pub fn push_input(&mut self, event: InputEvent) {
        self.push(OverlayEvent::Input(event));
    }

    /// Processes queued events in order until the queue is empty or the
    /// overlay stops. Only fatal errors are returned.
    pub fn run_pending(&mut self) -> Result<()> {
        while self.running {
            let Some(event) = self.queue.pop_front() else {
                break;
            };
            self.dispatch(event)?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn general_config(&self) -> &GeneralConfig {
        &self.general
    }

    pub fn animation_config(&self) -> &AnimationConfig {
        &self.animation
    }

    pub fn catalog(&self) -> &SkinCatalog {
        &self.catalog
    }

    pub fn tap(&self) -> &AudioTap {
        &self.tap
    }

    fn dispatch(&mut self, event: OverlayEvent) -> Result<()> {
        match event {
            OverlayEvent::Input(input) => {
                let hit = &self.hit;
                let intents = self
                    .router
                    .handle(input, |point, displayed| hit.is_opaque(point, displayed));
                self.apply(intents)
            }
            OverlayEvent::Frame => self.frame(),
        }
    }

    fn frame(&mut self) -> Result<()> {
        let intents = self.router.tick();
        self.apply(intents)?;
        if !self.running {
            return Ok(());
        }
        while let Some((ticket, result)) = self.backend.poll_ready() {
            self.capture_ready(ticket, result);
        }

        let step = match self.tap.snapshot() {
            Ok(Some(snapshot)) => self
                .engine
                .step(snapshot, &self.animation, &mut self.rng)
                .map(Some),
            Ok(None) => Ok(None),
            Err(err) => Err(err),
        };

        match step {
            Ok(Some(transform)) => self.platform.apply_transform(transform),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "animation frame failed, stopping capture");
                self.deactivate();
            }
        }
        Ok(())
    }

    fn apply(&mut self, intents: Vec<Intent>) -> Result<()> {
        for intent in intents {
            match intent {
                Intent::MoveBy { delta_x, delta_y } => self.platform.move_by(delta_x, delta_y),
                Intent::ResizeBy { delta_x } => self.platform.resize_by(delta_x),
                Intent::SetClickThrough { enabled, forward } => {
                    self.platform.set_click_through(enabled, forward)
                }
                Intent::SetCursor(cursor) => self.platform.set_cursor(cursor),
                Intent::ToggleAudio => self.toggle_audio(),
                Intent::CycleSkin => self.cycle_skin()?,
                Intent::Quit => {
                    tracing::info!("quit requested");
                    self.stop();
                }
            }
            if !self.running {
                break;
            }
        }
        Ok(())
    }

    fn toggle_audio(&mut self) {
        if self.tap.is_active() || self.tap.is_pending() {
            self.deactivate();
            return;
        }

        if let Some(ticket) = self.tap.begin_start() {
            self.backend.request(ticket);
        }
    }

    fn capture_ready(&mut self, ticket: SetupTicket, result: Result<Box<dyn LoopbackStream>>) {
        match self.tap.finish_start(ticket, result) {
            Ok(true) => {
                self.engine.reset();
                self.platform.set_active(true);
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(error = %err, "audio capture unavailable");
                self.platform.set_active(false);
                self.platform.notify(&format!("Error: {err}"));
            }
        }
    }

    fn deactivate(&mut self) {
        self.tap.stop();
        self.platform.set_active(false);
        self.platform.apply_transform(Transform2D::IDENTITY);
    }

    fn cycle_skin(&mut self) -> Result<()> {
        if !self.router.is_idle() {
            return Ok(());
        }
        self.catalog.rescan();
        let shown = self.catalog.index();
        let Some(path) = self.catalog.cycle() else {
            return Ok(());
        };
        tracing::info!(skin = %path.display(), "switching skin");
        if !self.load_skin(&path)? {
            self.catalog.select(shown);
        }
        Ok(())
    }

    /// Shows the skin at `path` and loads its animation config. Returns
    /// `false` when the image could not be decoded and the old skin stays.
    fn load_skin(&mut self, path: &Path) -> Result<bool> {
        match PixelBuffer::open(path) {
            Ok(buffer) => {
                self.hit.set_buffer(buffer);
                self.platform.show_skin(path);
            }
            Err(err) if err.is_fatal() => {
                tracing::error!(error = %err, "cannot continue without a skin");
                self.platform.notify(&format!("{err}"));
                self.stop();
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(skin = %path.display(), error = %err, "skin could not be decoded");
                self.platform.notify(&format!("Failed to load skin: {err}"));
                return Ok(false);
            }
        }

        let loaded = self.store.load_for_skin(&self.general, Some(path));
        self.animation = loaded.value;
        self.notice(loaded.recovered);
        Ok(true)
    }

    fn notice(&mut self, recovered: Option<PetError>) {
        if self.store.take_notice(recovered.as_ref()) {
            if let Some(err) = recovered {
                self.platform
                    .notify(&format!("Config reset to defaults ({err})"));
            }
        }
    }

    fn stop(&mut self) {
        self.tap.stop();
        self.running = false;
        self.platform.terminate();
    }
}

impl<P, B, R> fmt::Debug for Overlay<P, B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("catalog", &self.catalog)
            .field("tap", &self.tap)
            .field("router", &self.router.state())
            .field("queued", &self.queue.len())
            .field("running", &self.running)
            .finish()
    }
}
