//! The default solar system, the craft spawned into it, and the preset
//! starting orbits for the player's rocket.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use color_eyre::eyre::{self, eyre, OptionExt};
use nalgebra::{UnitQuaternion, Vector3};
use rand::Rng;
use tracing::info;

use crate::{
    bodies::{gm_from_km, Body, BodyId, PlanetParams, AU, GM_SUN, R_SUN},
    kepler::orbits::{OrbitalElements, StateVector},
    simulation::Simulation,
    universe::Universe,
};

const RAD_PER_DEG: f64 = PI / 180.0;
const DAY: f64 = 24.0 * 60.0 * 60.0;
const ASTEROID_COUNT: usize = 3;

struct Planet {
    name: &'static str,
    parent: &'static str,
    /// `km^3/s^2`
    gm: f64,
    /// `km`
    radius: f64,
    /// `km`
    soi: f64,
    /// `AU`, or `km` when orbiting a planet
    semimajor_axis: f64,
    eccentricity: f64,
    /// Angles in degrees
    inclination: f64,
    ascending_node: f64,
    argument_of_perihelion: f64,
    axial_tilt: f64,
    rotation_period: f64,
}

#[rustfmt::skip]
const PLANETS: [Planet; 6] = [
    Planet { name: "mercury", parent: "sun", gm: 22032.0, radius: 2439.7, soi: 2e5,
        semimajor_axis: 0.387098, eccentricity: 0.205630, inclination: 7.005,
        ascending_node: 48.331, argument_of_perihelion: 29.124,
        axial_tilt: 2.04, rotation_period: 58.646 * DAY },
    Planet { name: "venus", parent: "sun", gm: 324859.0, radius: 6051.8, soi: 2e5,
        semimajor_axis: 0.723332, eccentricity: 0.00677323, inclination: 3.39458,
        ascending_node: 76.678, argument_of_perihelion: 55.186,
        axial_tilt: 2.64, rotation_period: -243.0 * DAY },
    Planet { name: "earth", parent: "sun", gm: 398600.0, radius: 6534.0, soi: 5e5,
        semimajor_axis: 1.0, eccentricity: 0.0167086, inclination: 0.0,
        ascending_node: -11.26064, argument_of_perihelion: 114.20783,
        axial_tilt: 23.4392811, rotation_period: (23.0 * 60.0 + 56.0) * 60.0 + 4.10 },
    Planet { name: "moon", parent: "earth", gm: 4904.8695, radius: 1737.1, soi: 1e5,
        semimajor_axis: 384399.0, eccentricity: 0.048775, inclination: -11.26064,
        ascending_node: 100.492, argument_of_perihelion: 114.20783,
        axial_tilt: 1.5424, rotation_period: 27.321661 * DAY },
    Planet { name: "mars", parent: "sun", gm: 42828.0, radius: 3389.5, soi: 3e5,
        semimajor_axis: 1.523679, eccentricity: 0.0935, inclination: 1.850,
        ascending_node: 49.562, argument_of_perihelion: 286.537,
        axial_tilt: 25.19, rotation_period: 24.6229 * 60.0 * 60.0 },
    Planet { name: "jupiter", parent: "sun", gm: 126686534.0, radius: 69911.0, soi: 10e6,
        semimajor_axis: 5.204267, eccentricity: 0.048775, inclination: 1.305,
        ascending_node: 100.492, argument_of_perihelion: 275.066,
        axial_tilt: 3.13, rotation_period: 9.925 * 60.0 * 60.0 },
];

/// A circular starting orbit for the rocket.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Preset {
    pub title: &'static str,
    pub parent: &'static str,
    /// `km`
    pub radius: f64,
    pub ascending_node: f64,
}

#[rustfmt::skip]
pub const PRESETS: [Preset; 5] = [
    Preset { title: "Earth orbit", parent: "earth", radius: 10000.0, ascending_node: 0.0 },
    Preset { title: "Moon orbit", parent: "moon", radius: 3000.0, ascending_node: 0.0 },
    Preset { title: "Mars orbit", parent: "mars", radius: 5000.0, ascending_node: 0.0 },
    Preset { title: "Venus orbit", parent: "venus", radius: 10000.0, ascending_node: PI },
    Preset { title: "Jupiter orbit", parent: "jupiter", radius: 100000.0, ascending_node: 0.0 },
];

/// Craft are launched with the nose along the orbital velocity.
fn craft_orientation() -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2)
}

impl Universe {
    /// Sun, inner planets, the moon, jupiter, a few asteroids near
    /// 2.5 AU and a controllable `rocket` in low earth orbit.
    pub fn solar_system(rng: &mut impl Rng) -> eyre::Result<Self> {
        let sun = Body::builder()
            .name("sun")
            .gm(GM_SUN)
            .radius(R_SUN)
            .build()?;
        let mut universe = Universe::new(sun)?;

        for planet in &PLANETS {
            universe.add_planet(planet)?;
            if planet.name == "earth" {
                // the rocket is propagated before the moon
                let earth = universe.find_by_name("earth").ok_or_eyre("earth is missing")?;
                universe.add_craft("rocket", earth, OrbitalElements {
                    semimajor_axis: 10000.0 / AU,
                    ..OrbitalElements::default()
                })?;
            }
        }

        let sun = universe.root();
        for i in 0..ASTEROID_COUNT {
            universe.add_asteroid(format!("asteroid{i}"), sun, rng)?;
        }

        info!(bodies = universe.len(), "built solar system");
        Ok(universe)
    }

    /// Launch another craft around earth on a random orbit.
    pub fn spawn_rocket(&mut self, rng: &mut impl Rng) -> eyre::Result<BodyId> {
        let earth = self
            .find_by_name("earth")
            .ok_or_eyre("cannot spawn a rocket without earth")?;
        let elements = OrbitalElements {
            semimajor_axis: rng.gen_range(10000.0..20000.0) / AU,
            eccentricity: rng.gen_range(0.0..0.5),
            inclination: rng.gen_range(0.0..30.0 * RAD_PER_DEG),
            ascending_node: rng.gen_range(0.0..360.0 * RAD_PER_DEG),
            argument_of_perihelion: rng.gen_range(0.0..360.0 * RAD_PER_DEG),
            ..OrbitalElements::default()
        };
        let name = format!("rocket{}", self.len());
        let id = self.add_craft(&name, earth, elements)?;
        info!(%name, "spawned rocket");
        Ok(id)
    }

    fn add_planet(&mut self, planet: &Planet) -> eyre::Result<BodyId> {
        let parent = self
            .find_by_name(planet.parent)
            .ok_or_else(|| eyre::eyre!("{} orbits unknown body {}", planet.name, planet.parent))?;
        let parent_gm = self.bodies[parent].gm;
        let semimajor_axis = if parent == self.root() {
            planet.semimajor_axis
        } else {
            planet.semimajor_axis / AU
        };
        let elements = OrbitalElements {
            semimajor_axis,
            eccentricity: planet.eccentricity,
            inclination: planet.inclination * RAD_PER_DEG,
            ascending_node: planet.ascending_node * RAD_PER_DEG,
            argument_of_perihelion: planet.argument_of_perihelion * RAD_PER_DEG,
            ..OrbitalElements::default()
        };
        let body = Body::builder()
            .name(planet.name)
            .parent(parent)
            .gm(gm_from_km(planet.gm))
            .radius(planet.radius)
            .soi(planet.soi / AU)
            .build_from_orbital_elements(
                parent_gm,
                elements,
                PlanetParams {
                    axial_tilt: planet.axial_tilt * RAD_PER_DEG,
                    rotation_period: planet.rotation_period,
                },
            )?;
        self.add_body(body)
    }

    fn add_craft(
        &mut self,
        name: &str,
        parent: BodyId,
        elements: OrbitalElements,
    ) -> eyre::Result<BodyId> {
        let parent_gm = self.bodies[parent].gm;
        let mut craft = Body::builder()
            .name(name)
            .parent(parent)
            .controllable(true)
            .gm(gm_from_km(100.0))
            .radius(0.1)
            .build_from_orbital_elements(parent_gm, elements, PlanetParams::default())?;
        craft.orientation = craft_orientation();
        self.add_body(craft)
    }

    fn add_asteroid(
        &mut self,
        name: String,
        parent: BodyId,
        rng: &mut impl Rng,
    ) -> eyre::Result<BodyId> {
        let angle = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), rng.gen::<f64>() * TAU);
        let mut jitter = |scale: f64| (rng.gen::<f64>() - 0.5) * scale;
        let position = angle * Vector3::new(jitter(0.1), jitter(0.1) + 1.0, jitter(0.1)) * 2.5;
        let speed = libm::sqrt(self.bodies[parent].gm / position.norm());
        let velocity = angle * Vector3::new(jitter(0.3) - 1.0, jitter(0.3), jitter(0.3)) * speed;
        let radius = rng.gen::<f64>() + 0.1;

        let asteroid = Body::builder()
            .name(name)
            .parent(parent)
            .gm(gm_from_km(1e4))
            .radius(radius)
            .position(position)
            .velocity(velocity)
            .build()?;
        self.add_body(asteroid)
    }
}

impl Simulation {
    /// Move `rocket` onto the preset's circular orbit with a clean slate:
    /// no spin, engine off, flight statistics cleared. The rocket becomes
    /// the selection and mission elapsed time restarts.
    pub fn load_scenario(&mut self, title: &str) -> eyre::Result<BodyId> {
        let preset = PRESETS
            .iter()
            .find(|p| p.title.eq_ignore_ascii_case(title))
            .ok_or_else(|| eyre!("no scenario named {title}"))?;
        let universe = self.universe_mut();
        let craft = universe
            .find_by_name("rocket")
            .ok_or_eyre("scenarios need a body named rocket")?;
        let parent = universe
            .find_by_name(preset.parent)
            .ok_or_else(|| eyre!("scenario {} orbits unknown body {}", preset.title, preset.parent))?;
        universe.set_parent(craft, parent)?;

        let elements = OrbitalElements {
            semimajor_axis: preset.radius / AU,
            ascending_node: preset.ascending_node,
            ..OrbitalElements::default()
        };
        let state = StateVector::from_elements(&elements, 0.0, universe.bodies[parent].gm);
        let body = &mut universe.bodies[craft];
        body.position = state.position;
        body.velocity = state.velocity;
        body.orientation = elements.rotation()
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -FRAC_PI_2);
        body.angular_velocity = Vector3::zeros();
        body.throttle = 0.0;
        body.total_delta_v = 0.0;
        body.ignition_count = 0;

        self.controls_mut().selected = Some(craft);
        self.reset_clock();
        let epoch = self.sim_time().as_seconds();
        self.universe_mut().update_orbital_elements(epoch);
        info!(scenario = preset.title, "loaded scenario");
        Ok(craft)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn solar_system_tree() {
        let mut rng = StdRng::seed_from_u64(7);
        let universe = Universe::solar_system(&mut rng).unwrap();
        assert_eq!(universe.len(), 1 + PLANETS.len() + 1 + ASTEROID_COUNT);

        let earth = universe.find_by_name("earth").unwrap();
        let rocket = universe.find_by_name("rocket").unwrap();
        let moon = universe.find_by_name("moon").unwrap();
        assert_eq!(universe.get(earth).unwrap().children, vec![rocket, moon]);

        let rocket = universe.get(rocket).unwrap();
        assert!(rocket.controllable);
        assert!((rocket.position.norm() * AU - 10000.0).abs() < 1e-6);
        // nose along +Y, the periapsis velocity direction of an equatorial orbit
        let nose = rocket.orientation * Vector3::x();
        assert!((nose - rocket.velocity.normalize()).norm() < 1e-9);

        let moon = universe.get(moon).unwrap();
        assert!(moon.position.norm() < universe.get(earth).unwrap().soi);
    }

    #[test]
    fn asteroids_start_near_two_and_a_half_au() {
        let mut rng = StdRng::seed_from_u64(11);
        let universe = Universe::solar_system(&mut rng).unwrap();
        for i in 0..ASTEROID_COUNT {
            let asteroid = universe.body_by_name(&format!("asteroid{i}")).unwrap();
            let r = asteroid.position.norm();
            assert!((2.3..2.7).contains(&r), "asteroid{i} at {r} AU");
            assert_eq!(asteroid.parent, Some(universe.root()));
        }
    }

    #[test]
    fn spawned_rockets_orbit_earth() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut universe = Universe::solar_system(&mut rng).unwrap();
        let before = universe.len();
        let id = universe.spawn_rocket(&mut rng).unwrap();
        let rocket = universe.get(id).unwrap();
        assert_eq!(rocket.name, format!("rocket{before}"));
        assert_eq!(rocket.parent, universe.find_by_name("earth"));
        let elements = rocket.orbital_elements;
        assert!((9999.9..20000.1).contains(&(elements.semimajor_axis * AU)));
        let r_km = rocket.position.norm() * AU;
        assert!((r_km - elements.semimajor_axis * AU * (1.0 - elements.eccentricity)).abs() < 1e-6);
    }

    fn flown_session() -> Simulation {
        let mut rng = StdRng::seed_from_u64(2);
        let mut sim = Simulation::new(Universe::solar_system(&mut rng).unwrap());
        sim.set_throttle(1.0).unwrap();
        sim.tick(1.0);
        sim.select("earth").unwrap();
        sim
    }

    #[test]
    fn moon_scenario_resets_the_rocket() {
        let mut sim = flown_session();
        let rocket = sim.load_scenario("moon orbit").unwrap();
        assert_eq!(sim.selected(), Some(rocket));
        assert_eq!(sim.mission_elapsed().as_seconds(), 0.0);

        let universe = sim.universe();
        let moon = universe.find_by_name("moon").unwrap();
        let earth = universe.find_by_name("earth").unwrap();
        assert!(universe.get(moon).unwrap().children.contains(&rocket));
        assert!(!universe.get(earth).unwrap().children.contains(&rocket));

        let body = universe.get(rocket).unwrap();
        assert_eq!(body.parent, Some(moon));
        assert_eq!(body.throttle, 0.0);
        assert_eq!(body.total_delta_v, 0.0);
        assert_eq!(body.ignition_count, 0);
        assert_eq!(body.angular_velocity, Vector3::zeros());
        assert!((body.position.norm() * AU - 3000.0).abs() < 1e-6);
        assert!(body.orbital_elements.eccentricity < 1e-9);
        assert!((body.orbital_elements.semimajor_axis * AU - 3000.0).abs() < 1e-6);
        let nose = body.orientation * Vector3::x();
        assert!((nose - body.velocity.normalize()).norm() < 1e-9);
    }

    #[test]
    fn venus_scenario_starts_on_the_far_side() {
        let mut sim = flown_session();
        let rocket = sim.load_scenario("Earth orbit").unwrap();
        let at_earth = sim.universe().get(rocket).unwrap().position.normalize();
        assert!((at_earth - Vector3::x()).norm() < 1e-9);

        sim.load_scenario("Venus orbit").unwrap();
        let body = sim.universe().get(rocket).unwrap();
        assert_eq!(body.parent, sim.universe().find_by_name("venus"));
        assert!((body.position.normalize() + Vector3::x()).norm() < 1e-9);
    }

    #[test]
    fn unknown_scenario_changes_nothing() {
        let mut sim = flown_session();
        let before = sim.snapshot();
        assert!(sim.load_scenario("Pluto orbit").is_err());
        assert_eq!(sim.snapshot(), before);
    }
}
