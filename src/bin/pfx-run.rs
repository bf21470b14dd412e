//! Headless effect runner.
//!
//! Plays an effect from a library file at a fixed time step against the
//! recording renderer and logs what the engine did once per simulated
//! second.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use pfx::prelude::*;
use pfx::EffectState;

#[derive(Parser)]
#[command(name = "pfx-run")]
#[command(about = "Play and inspect particle effect libraries without a window", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one effect and log per-second statistics
    Play {
        /// Library JSON file
        library: PathBuf,

        /// Effect name
        effect: String,

        /// Simulation rate in steps per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Seconds to simulate; defaults to one effect duration
        #[arg(long)]
        duration: Option<f32>,

        /// Spawn generator seed
        #[arg(long)]
        seed: Option<u64>,

        /// Engine config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Play as an anchored effect circling the origin
        #[arg(long)]
        anchored: bool,

        /// Keep billboards and world geometry across frames
        #[arg(long)]
        persistent: bool,
    },

    /// List materials, definitions and effects in a library
    List {
        /// Library JSON file
        library: PathBuf,
    },

    /// Compile every material of a library for all particle kinds
    #[cfg(feature = "wgpu")]
    Check {
        /// Library JSON file
        library: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.verbose > 0 {
        log::set_max_level(match cli.verbose {
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        });
    } else if cli.quiet {
        log::set_max_level(log::LevelFilter::Error);
    }

    match cli.command {
        Commands::Play {
            library,
            effect,
            fps,
            duration,
            seed,
            config,
            anchored,
            persistent,
        } => {
            let mut config = match config {
                Some(path) => EngineConfig::load(&path).with_context(|| format!("loading {}", path.display()))?,
                None => EngineConfig::default(),
            };
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            config = config.with_persistent_particles(persistent);
            play(&library, &effect, fps, duration, config, anchored)
        }
        Commands::List { library } => list(&library),
        #[cfg(feature = "wgpu")]
        Commands::Check { library } => check(&library),
    }
}

fn play(path: &Path, name: &str, fps: f32, duration: Option<f32>, config: EngineConfig, anchored: bool) -> Result<()> {
    if fps.is_nan() || fps <= 0.0 {
        bail!("--fps must be positive, got {fps}");
    }
    let library = Library::load(path).with_context(|| format!("loading {}", path.display()))?;
    let mut engine = library.into_engine(config);

    let mut renderer = RecordingRenderer::new().with_file_checks();
    let resolved = engine.reload_materials(&mut renderer);
    let unresolved = engine.registry().materials().count() - resolved;
    if unresolved > 0 {
        warn!("{unresolved} material(s) did not resolve; their draws will be skipped");
    }

    let effect_time = engine
        .get_fx(name)
        .map(|fx| fx.duration())
        .with_context(|| format!("no effect named '{name}'"))?;
    let total = duration.unwrap_or(effect_time);
    let dt = 1.0 / fps;
    let steps = (total * fps).ceil() as u64;
    let camera = Camera::new();

    info!("playing '{name}' for {total:.2}s at {fps} steps/s ({steps} steps)");

    let mut instance = engine.play(name)?;
    let anchor = if anchored {
        Some(engine.add_anchored_fx(name, Vec3::ZERO)?)
    } else {
        None
    };

    let per_second = fps.round().max(1.0) as u64;
    let mut peak = (0usize, 0usize, 0usize);
    let mut drawn = 0u64;
    for step in 0..steps {
        let t = step as f32 * dt;
        let state = match anchor {
            Some(id) => {
                let orbit = Vec3::new(t.cos(), 0.0, t.sin()) * 2.0;
                engine.process_anchored_fx(id, Mat4::from_translation(orbit), dt)?
            }
            None => engine.process_fx(&mut instance, Mat4::IDENTITY, dt),
        };
        engine.update(&camera, dt);
        engine.render(&camera, &mut renderer, false);
        drawn += renderer.draws.len() as u64;

        let stats = engine.stats();
        peak.0 = peak.0.max(stats.billboards);
        peak.1 = peak.1.max(stats.geometry + stats.anchored_geometry);
        peak.2 = peak.2.max(stats.trails);

        if (step + 1) % per_second == 0 {
            info!(
                "t={:.2}s {:?}: billboards={} geometry={} (+{} anchored) trails={} lights={}",
                t + dt,
                state,
                stats.billboards,
                stats.geometry,
                stats.anchored_geometry,
                stats.trails,
                stats.lights
            );
        }

        engine.frame();

        if state == EffectState::Expired && engine.trails().is_empty() {
            info!("'{name}' expired after {:.2}s", t + dt);
            break;
        }
    }

    let stats = engine.stats();
    info!(
        "peak billboards={} geometry={} trails={}; {} draw calls, {} skipped",
        peak.0, peak.1, peak.2, drawn, renderer.skipped_draws
    );
    let dropped = stats.dropped_billboards + stats.dropped_geometry + stats.dropped_trails + stats.dropped_lights;
    if dropped > 0 {
        warn!(
            "dropped billboards={} geometry={} trails={} lights={}",
            stats.dropped_billboards, stats.dropped_geometry, stats.dropped_trails, stats.dropped_lights
        );
    }
    Ok(())
}

fn list(path: &Path) -> Result<()> {
    let library = Library::load(path).with_context(|| format!("loading {}", path.display()))?;
    let registry = &library.registry;

    println!("Materials:");
    for (_, material) in registry.materials() {
        println!("  {:<20} {}", material.name, material.shader_path.display());
    }
    println!("Billboards:");
    for def in registry.billboards() {
        println!("  {:<20} lifetime {:.2}s", def.name, def.lifetime);
    }
    println!("Geometry:");
    for def in registry.geometries() {
        let light = if def.light.radius.is_enabled() { ", light" } else { "" };
        println!("  {:<20} lifetime {:.2}s{}", def.name, def.lifetime, light);
    }
    println!("Trails:");
    for def in registry.trails() {
        println!("  {:<20} lifetime {:.2}s, sample every {:.3}s", def.name, def.lifetime, def.period());
    }
    println!("Effects:");
    for (_, effect) in library.effects.iter() {
        let looping = if effect.looping { ", looping" } else { "" };
        println!(
            "  {:<20} {} entries, {:.2}s{}",
            effect.name,
            effect.entries().len(),
            effect.duration(),
            looping
        );
    }
    Ok(())
}

#[cfg(feature = "wgpu")]
fn check(path: &Path) -> Result<()> {
    use pfx::render::shaders;

    let library = Library::load(path).with_context(|| format!("loading {}", path.display()))?;
    let mut failed = 0;
    for (_, material) in library.registry.materials() {
        let source = std::fs::read_to_string(&material.shader_path)
            .with_context(|| format!("reading {}", material.shader_path.display()))?;
        for kind in ParticleKind::ALL {
            match shaders::validate(&shaders::compose(kind, &source)) {
                Ok(()) => info!("{} ({kind}): ok", material.name),
                Err(message) => {
                    failed += 1;
                    log::error!("{} ({kind}):\n{message}", material.name);
                }
            }
        }
    }
    if failed > 0 {
        bail!("{failed} material module(s) failed to validate");
    }
    Ok(())
}
