//! Definitions of celestial bodies and craft.

use std::f64::consts;

use color_eyre::eyre::{self, bail, OptionExt};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    arena::IdLike,
    kepler::orbits::{self, OrbitalElements, StateVector},
};

/// Astronomical unit (`km`)
pub const AU: f64 = 149_597_871.0;
/// Standard gravitational parameter of the sun (`AU^3/s^2`)
pub const GM_SUN: f64 = 1.327_124_400e11 / AU / AU / AU;
/// Radius of the sun (`km`)
pub const R_SUN: f64 = 695_800.0;

/// Main engine acceleration at full throttle (`AU/s^2`)
pub const THRUST_ACCELERATION: f64 = 5e-10;
/// Angular acceleration of the attitude control system (`rad/s^2`)
pub const ANGULAR_ACCELERATION: f64 = 1.0;
/// Squared spin rate below which residual rotation is zeroed.
pub const SPIN_EPSILON: f64 = 1e-6;

/// Convert `km^3/s^2` to `AU^3/s^2`.
pub fn gm_from_km(gm: f64) -> f64 {
    gm / AU / AU / AU
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct BodyId(u32);

impl IdLike for BodyId {
    fn from_raw(index: usize) -> Self {
        Self(index as u32)
    }

    fn into_raw(self) -> usize {
        self.0 as usize
    }
}

/// A node in the gravitational hierarchy: a star, planet, moon,
/// asteroid or craft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: String,
    /// Body this one orbits. `None` only for the root star.
    pub parent: Option<BodyId>,
    /// Bodies currently orbiting this one, in propagation order.
    pub children: Vec<BodyId>,
    /// Position relative to the parent (`AU`)
    pub position: Vector3<f64>,
    /// Velocity relative to the parent (`AU/s`)
    pub velocity: Vector3<f64>,
    /// Attitude relative to the parent frame
    pub orientation: UnitQuaternion<f64>,
    /// Rotation rate (`rad/s`)
    pub angular_velocity: Vector3<f64>,
    /// Standard gravitational parameter (`AU^3/s^2`)
    pub gm: f64,
    /// Mean radius (`km`)
    pub radius: f64,
    /// Sphere of influence radius (`AU`), zero when the body has none
    pub soi: f64,
    pub controllable: bool,
    /// Main engine throttle in `[0, 1]`
    pub throttle: f64,
    /// Delta-v spent over the whole flight (`AU/s`)
    pub total_delta_v: f64,
    pub ignition_count: u32,
    /// Derived from the state vector once per frame; not authoritative.
    pub orbital_elements: OrbitalElements,
}

impl Body {
    pub fn builder() -> BodyBuilder {
        BodyBuilder::default()
    }

    pub fn state_vector(&self) -> StateVector {
        StateVector::new(self.position, self.velocity)
    }

    pub fn has_soi(&self) -> bool {
        self.soi != 0.0
    }
}

/// Rotation parameters for bodies placed from orbital elements.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PlanetParams {
    /// Tilt of the spin axis about X (`rad`)
    pub axial_tilt: f64,
    /// Sidereal day (`sec`); negative for retrograde spin, zero for none
    pub rotation_period: f64,
}

#[derive(Clone, Debug, Default)]
pub struct BodyBuilder {
    name: Option<String>,
    parent: Option<BodyId>,
    position: Option<Vector3<f64>>,
    velocity: Option<Vector3<f64>>,
    orientation: Option<UnitQuaternion<f64>>,
    angular_velocity: Option<Vector3<f64>>,
    gm: Option<f64>,
    radius: Option<f64>,
    soi: Option<f64>,
    controllable: bool,
}

impl BodyBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn parent(mut self, parent: BodyId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn position(mut self, position: Vector3<f64>) -> Self {
        self.position = Some(position);
        self
    }

    pub fn velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn orientation(mut self, orientation: UnitQuaternion<f64>) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn angular_velocity(mut self, angular_velocity: Vector3<f64>) -> Self {
        self.angular_velocity = Some(angular_velocity);
        self
    }

    pub fn gm(mut self, gm: f64) -> Self {
        self.gm = Some(gm);
        self
    }

    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn soi(mut self, soi: f64) -> Self {
        self.soi = Some(soi);
        self
    }

    pub fn controllable(mut self, value: bool) -> Self {
        self.controllable = value;
        self
    }

    pub fn build(self) -> eyre::Result<Body> {
        let name = self.name.ok_or_eyre("body has no name")?;
        let gm = self
            .gm
            .ok_or_else(|| eyre::eyre!("body {name} has no gravitational parameter"))?;
        Ok(Body {
            name,
            parent: self.parent,
            children: Vec::new(),
            position: self.position.unwrap_or_else(Vector3::zeros),
            velocity: self.velocity.unwrap_or_else(Vector3::zeros),
            orientation: self.orientation.unwrap_or_else(UnitQuaternion::identity),
            angular_velocity: self.angular_velocity.unwrap_or_else(Vector3::zeros),
            gm,
            radius: self.radius.unwrap_or(1.0),
            soi: self.soi.unwrap_or(0.0),
            controllable: self.controllable,
            throttle: 0.0,
            total_delta_v: 0.0,
            ignition_count: 0,
            orbital_elements: OrbitalElements::default(),
        })
    }

    /// Place the body on the orbit given by `elements` around a parent
    /// of gravitational parameter `parent_gm`, at the elements' mean
    /// anomaly. Only closed orbits can be constructed this way.
    pub fn build_from_orbital_elements(
        self,
        parent_gm: f64,
        elements: OrbitalElements,
        params: PlanetParams,
    ) -> eyre::Result<Body> {
        if self.parent.is_none() {
            bail!("a body placed from orbital elements needs a parent");
        }
        if !(0.0..1.0).contains(&elements.eccentricity) || elements.semimajor_axis <= 0.0 {
            bail!(
                "cannot place a body on an open orbit (a = {}, e = {})",
                elements.semimajor_axis,
                elements.eccentricity
            );
        }

        let ta = orbits::ma_to_ta(elements.mean_anomaly, elements.eccentricity, 1e-12, 50)?;
        let sv = StateVector::from_elements(&elements, ta, parent_gm);

        let orientation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), params.axial_tilt);
        let angular_velocity = if params.rotation_period == 0.0 {
            Vector3::zeros()
        } else {
            orientation * Vector3::new(0.0, 0.0, 2.0 * consts::PI / params.rotation_period)
        };

        let mut body = self
            .position(sv.position)
            .velocity(sv.velocity)
            .orientation(orientation)
            .angular_velocity(angular_velocity)
            .build()?;
        body.orbital_elements = elements;
        Ok(body)
    }
}
