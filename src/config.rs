//! Driver configuration, loaded from TOML.
//!
//! ```toml
//! frames = 600
//! frame_seconds = 0.016     # wall-clock seconds per frame
//! timescale = 1.0
//! substeps = 100
//! seed = 42
//! scenario = "Moon orbit"    # preset starting orbit for the rocket
//! select = "rocket"
//! throttle = 0.0
//! extra_rockets = 2
//! snapshot = "orbiter.ron"   # written at the end of the run
//! restore = "previous.ron"   # loaded before the first frame
//! units = "km"              # or "au"
//!
//! [attitude]                # buttons held for the whole run
//! pitch_up = true
//! ```

use std::path::{Path, PathBuf};

use color_eyre::eyre::{self, bail, WrapErr};
use orbiter::propagator::AttitudeButtons;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Au,
    Km,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub frames: u64,
    pub frame_seconds: f64,
    pub timescale: f64,
    pub substeps: usize,
    pub seed: u64,
    pub scenario: Option<String>,
    pub select: Option<String>,
    pub throttle: f64,
    pub extra_rockets: usize,
    pub snapshot: Option<PathBuf>,
    pub restore: Option<PathBuf>,
    pub units: Units,
    pub attitude: AttitudeButtons,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frames: 60,
            frame_seconds: 1.0 / 60.0,
            timescale: 1.0,
            substeps: 100,
            seed: 0,
            scenario: None,
            select: None,
            throttle: 0.0,
            extra_rockets: 0,
            snapshot: None,
            restore: None,
            units: Units::Au,
            attitude: AttitudeButtons::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&text).wrap_err_with(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if !(self.frame_seconds.is_finite() && self.frame_seconds > 0.0) {
            bail!("frame_seconds must be positive, got {}", self.frame_seconds);
        }
        if self.substeps == 0 {
            bail!("substeps must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.throttle) {
            bail!("throttle must lie in [0, 1], got {}", self.throttle);
        }
        Ok(())
    }
}
