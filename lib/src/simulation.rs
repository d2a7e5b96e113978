//! A running session: the universe plus the clock and the player's
//! controls.

use color_eyre::eyre::{self, bail, OptionExt};
use tracing::{debug, trace};

use crate::{
    bodies::BodyId,
    propagator::{AttitudeButtons, Controls},
    time::{MET, UT},
    universe::Universe,
};

pub(crate) fn check_timescale(scale: f64) -> eyre::Result<()> {
    if !(scale.is_finite() && 0.0 < scale) {
        bail!("invalid timescale {scale}");
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct Simulation {
    universe: Universe,
    controls: Controls,
    sim_time: UT,
    start_time: UT,
    substeps: usize,
}

impl Simulation {
    pub const DEFAULT_SUBSTEPS: usize = 100;

    /// Start a session at `UT::ZERO` with the first controllable body
    /// selected.
    pub fn new(universe: Universe) -> Self {
        let selected = universe
            .tree_order()
            .into_iter()
            .find(|&id| universe.get(id).is_some_and(|b| b.controllable));
        Self {
            universe,
            controls: Controls {
                selected,
                ..Controls::default()
            },
            sim_time: UT::ZERO,
            start_time: UT::ZERO,
            substeps: Self::DEFAULT_SUBSTEPS,
        }
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn universe_mut(&mut self) -> &mut Universe {
        &mut self.universe
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub(crate) fn controls_mut(&mut self) -> &mut Controls {
        &mut self.controls
    }

    pub fn set_buttons(&mut self, buttons: AttitudeButtons) {
        self.controls.buttons = buttons;
    }

    pub fn sim_time(&self) -> UT {
        self.sim_time
    }

    pub fn start_time(&self) -> UT {
        self.start_time
    }

    pub(crate) fn set_clock(&mut self, start_time: UT, sim_time: UT) {
        self.start_time = start_time;
        self.sim_time = sim_time;
    }

    /// Restart mission elapsed time from the current simulation time.
    pub fn reset_clock(&mut self) {
        self.start_time = self.sim_time;
    }

    pub fn mission_elapsed(&self) -> MET {
        MET::between(self.start_time, self.sim_time)
    }

    pub fn timescale(&self) -> f64 {
        self.controls.timescale
    }

    pub fn substeps(&self) -> usize {
        self.substeps
    }

    pub fn set_substeps(&mut self, substeps: usize) {
        self.substeps = substeps.max(1);
    }

    pub fn selected(&self) -> Option<BodyId> {
        self.controls.selected
    }

    pub fn select(&mut self, name: &str) -> eyre::Result<BodyId> {
        let id = self
            .universe
            .find_by_name(name)
            .ok_or_else(|| eyre::eyre!("no body named {name}"))?;
        self.controls.selected = Some(id);
        debug!(%name, "selected body");
        Ok(id)
    }

    fn selected_throttle(&self) -> f64 {
        self.controls
            .selected
            .and_then(|id| self.universe.get(id))
            .map_or(0.0, |b| b.throttle)
    }

    pub fn set_timescale(&mut self, scale: f64) -> eyre::Result<()> {
        check_timescale(scale)?;
        if 0.0 < self.selected_throttle() {
            bail!("cannot time warp while accelerating");
        }
        self.controls.timescale = scale;
        Ok(())
    }

    /// Set the selected craft's throttle, clamped to `[0, 1]`.
    pub fn set_throttle(&mut self, value: f64) -> eyre::Result<()> {
        let value = value.clamp(0.0, 1.0);
        if 1.0 < self.controls.timescale && 0.0 < value {
            bail!("cannot accelerate while time warping");
        }
        let body = self
            .controls
            .selected
            .and_then(|id| self.universe.get_mut(id))
            .filter(|b| b.controllable)
            .ok_or_eyre("select a controllable body to set throttle")?;

        if body.throttle == 0.0 && 0.0 < value {
            body.ignition_count += 1;
        }
        body.throttle = value;
        Ok(())
    }

    pub fn nudge_throttle(&mut self, delta: f64) -> eyre::Result<()> {
        self.set_throttle(self.selected_throttle() + delta)
    }

    /// Advance by `real_delta` wall-clock seconds scaled by the current
    /// timescale, then refresh every body's orbital elements. Returns the
    /// simulated time step.
    pub fn tick(&mut self, real_delta: f64) -> f64 {
        let delta_time = real_delta * self.controls.timescale;
        self.sim_time = self.sim_time.advance(delta_time);
        self.universe
            .propagate(delta_time, self.substeps, &self.controls);
        self.universe
            .update_orbital_elements(self.sim_time.as_seconds());
        trace!(delta_time, sim_time = %self.sim_time, "tick");
        delta_time
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn session() -> Simulation {
        let mut rng = StdRng::seed_from_u64(1);
        Simulation::new(Universe::solar_system(&mut rng).unwrap())
    }

    #[test]
    fn rocket_is_selected_by_default() {
        let sim = session();
        assert_eq!(sim.selected(), sim.universe().find_by_name("rocket"));
        assert_eq!(sim.substeps(), Simulation::DEFAULT_SUBSTEPS);
    }

    #[test]
    fn throttle_counts_ignitions_and_clamps() {
        let mut sim = session();
        let rocket = sim.selected().unwrap();
        sim.set_throttle(0.5).unwrap();
        sim.nudge_throttle(0.8).unwrap();
        assert_eq!(sim.universe().get(rocket).unwrap().throttle, 1.0);
        sim.nudge_throttle(-2.0).unwrap();
        sim.set_throttle(0.1).unwrap();
        let body = sim.universe().get(rocket).unwrap();
        assert_eq!(body.ignition_count, 2);
        assert_eq!(body.throttle, 0.1);
    }

    #[test]
    fn no_time_warp_under_thrust() {
        let mut sim = session();
        sim.set_throttle(1.0).unwrap();
        assert!(sim.set_timescale(10.0).is_err());
        sim.set_throttle(0.0).unwrap();
        sim.set_timescale(10.0).unwrap();
        assert!(sim.set_throttle(0.5).is_err());
        // cutting the engine is always allowed
        sim.set_throttle(0.0).unwrap();
        assert!(sim.set_timescale(-1.0).is_err());
    }

    #[test]
    fn deselected_craft_stops_burning() {
        let mut sim = session();
        let rocket = sim.selected().unwrap();
        sim.set_throttle(1.0).unwrap();
        sim.select("earth").unwrap();
        sim.set_timescale(1000.0).unwrap();
        sim.tick(1.0);

        let body = sim.universe().get(rocket).unwrap();
        assert_eq!(body.throttle, 1.0);
        assert_eq!(body.total_delta_v, 0.0);
    }

    #[test]
    fn throttle_needs_a_controllable_selection() {
        let mut sim = session();
        sim.select("earth").unwrap();
        assert!(sim.set_throttle(1.0).is_err());
        assert!(sim.select("pluto").is_err());
    }

    #[test]
    fn tick_advances_clock_and_elements() {
        let mut sim = session();
        sim.set_timescale(100.0).unwrap();
        let dt = sim.tick(0.5);
        assert_eq!(dt, 50.0);
        assert!((sim.mission_elapsed().as_seconds() - 50.0).abs() < 1e-6);

        let rocket = sim.universe().get(sim.selected().unwrap()).unwrap();
        let elements = rocket.orbital_elements;
        assert!((elements.epoch - 50.0).abs() < 1e-6);
        assert!((elements.semimajor_axis * crate::bodies::AU - 10000.0).abs() < 1.0);

        sim.reset_clock();
        assert_eq!(sim.mission_elapsed().as_seconds(), 0.0);
    }
}
