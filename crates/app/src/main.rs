mod simulate;

use std::path::{Path, PathBuf};

use audio_pet_core::{
    assets::SkinCatalog,
    window::{Point, Size},
    ConfigStore, HitTester, OverlayPaths, PixelBuffer, WindowSpec,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> audio_pet_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let paths = OverlayPaths::from_root(&cli.root);

    match cli.command {
        Commands::Init { work_area } => run_init(&paths, work_area),
        Commands::Skins => run_skins(&paths),
        Commands::Probe {
            image,
            x,
            y,
            width,
            height,
        } => run_probe(&image, Point::new(x, y), width.zip(height)),
        Commands::Simulate { wav, frames, seed } => {
            simulate::run(&paths, wav.as_deref(), frames, seed)
        }
    }
}

fn run_init(paths: &OverlayPaths, work_area: (u32, u32)) -> audio_pet_core::Result<()> {
    let store = ConfigStore::new(&paths.configs);
    let general = store.load_general();
    let animation = store.load_animation(&general.value.app_config);
    for (path, recovered) in [
        (store.general_path(), general.recovered.is_some()),
        (
            store.animation_path(&general.value.app_config),
            animation.recovered.is_some(),
        ),
    ] {
        let state = match (recovered, path.is_file()) {
            (false, _) => "ok",
            (true, true) => "created",
            (true, false) => "unwritable",
        };
        println!("{state:>10}  {}", path.display());
    }

    let spec = WindowSpec::from_config(&general.value, work_area);
    tracing::info!(?spec, "window placement");
    Ok(())
}

fn run_skins(paths: &OverlayPaths) -> audio_pet_core::Result<()> {
    let catalog = SkinCatalog::scan(&paths.assets);
    if catalog.is_empty() {
        println!("no skins in {}", paths.assets.display());
        return Ok(());
    }
    for (index, skin) in catalog.skins().iter().enumerate() {
        let marker = if index == catalog.index() { '*' } else { ' ' };
        println!("{marker} {index:>3}  {skin}");
    }
    Ok(())
}

fn run_probe(
    image: &Path,
    point: Point,
    displayed: Option<(f64, f64)>,
) -> audio_pet_core::Result<()> {
    let buffer = PixelBuffer::open(image)?;
    let displayed = displayed
        .map(|(width, height)| Size::new(width, height))
        .unwrap_or_else(|| Size::new(f64::from(buffer.width()), f64::from(buffer.height())));

    let mut tester = HitTester::new();
    tester.set_buffer(buffer);
    let verdict = if tester.is_opaque(point, displayed) {
        "opaque"
    } else {
        "transparent"
    };
    println!("{verdict}");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

fn parse_work_area(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| "work area must be WIDTHxHEIGHT (e.g. 1920x1080)".to_string())?;
    let w: u32 = w.trim().parse().map_err(|_| "invalid width")?;
    let h: u32 = h.trim().parse().map_err(|_| "invalid height")?;
    if w == 0 || h == 0 {
        return Err("width and height must be positive".to_string());
    }
    Ok((w, h))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive desktop pet", long_about = None)]
struct Cli {
    /// Directory holding `configs/` and `assets/`.
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create any missing config documents with their defaults.
    Init {
        /// Screen work area used to place the window.
        #[arg(long, value_parser = parse_work_area, default_value = "1920x1080")]
        work_area: (u32, u32),
    },
    /// List the skins found in the assets directory.
    Skins,
    /// Report whether a point on a skin image would catch the pointer.
    Probe {
        /// Image to test.
        image: PathBuf,
        /// Horizontal position relative to the image, in display pixels.
        x: f64,
        /// Vertical position relative to the image, in display pixels.
        y: f64,
        /// Displayed width; defaults to the image width.
        #[arg(long, requires = "height")]
        width: Option<f64>,
        /// Displayed height; defaults to the image height.
        #[arg(long, requires = "width")]
        height: Option<f64>,
    },
    /// Run the overlay headlessly, feeding it a WAV file or a generated beat.
    Simulate {
        /// Audio to play into the loopback. A bass pulse is used when omitted.
        #[arg(long)]
        wav: Option<PathBuf>,
        /// Number of frames to animate.
        #[arg(long, default_value_t = 300)]
        frames: u32,
        /// Seed for the flip decisions.
        #[arg(long)]
        seed: Option<u64>,
    },
}
