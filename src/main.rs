use std::path::Path;

use clap::{App, Arg, ArgMatches};
use color_eyre::eyre::{self, WrapErr};
use config::Config;
use orbiter::{simulation::Simulation, snapshot::UniverseSnapshot, universe::Universe};
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod report;

fn cli() -> ArgMatches<'static> {
    let config_option = Arg::with_name("config")
        .long("config")
        .short("c")
        .required(false)
        .takes_value(true)
        .help("TOML configuration file");

    let frames_option = Arg::with_name("frames")
        .long("frames")
        .short("f")
        .required(false)
        .takes_value(true)
        .help("Number of frames to simulate, overriding the configuration");

    App::new("orbiter")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Headless patched-conic solar system simulator")
        .arg(config_option)
        .arg(frames_option)
        .get_matches()
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let matches = cli();
    let mut config = match matches.value_of("config") {
        Some(path) => Config::load(Path::new(path))?,
        None => Config::default(),
    };
    if let Some(frames) = matches.value_of("frames") {
        config.frames = frames
            .parse()
            .wrap_err_with(|| format!("invalid frame count {frames}"))?;
    }

    run(&config)
}

fn run(config: &Config) -> eyre::Result<()> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut universe = Universe::solar_system(&mut rng)?;
    for _ in 0..config.extra_rockets {
        universe.spawn_rocket(&mut rng)?;
    }

    let mut sim = Simulation::new(universe);
    sim.set_substeps(config.substeps);
    if let Some(path) = &config.restore {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        let snapshot: UniverseSnapshot = ron::from_str(&text)?;
        sim.restore(&snapshot)?;
        info!(path = %path.display(), "restored snapshot");
    } else {
        sim.universe_mut().update_orbital_elements(0.0);
    }
    if let Some(title) = &config.scenario {
        sim.load_scenario(title)?;
    }
    if let Some(name) = &config.select {
        sim.select(name)?;
    }
    sim.set_timescale(config.timescale)?;
    sim.set_buttons(config.attitude);
    if config.throttle > 0.0 {
        sim.set_throttle(config.throttle)?;
    }

    let mut transitions = Vec::new();
    for _ in 0..config.frames {
        sim.tick(config.frame_seconds);
        transitions.extend(sim.universe_mut().drain_soi_transitions());
    }
    info!(frames = config.frames, met = %sim.mission_elapsed(), "run finished");

    println!("{} at {}", sim.mission_elapsed(), sim.sim_time());
    if let Some(id) = sim.selected() {
        println!("{}", report::body_report(&sim, id, config.units));
    }
    print!("{}", report::transitions_report(&sim, &transitions));

    if let Some(path) = &config.snapshot {
        let text = ron::ser::to_string_pretty(&sim.snapshot(), ron::ser::PrettyConfig::default())?;
        std::fs::write(path, text).wrap_err_with(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote snapshot");
    }
    Ok(())
}
