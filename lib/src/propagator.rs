//! Fixed-step patched-conic propagation.
//!
//! Every body is pulled only by its parent. Each substep walks the tree
//! depth-first from the root; a body is advanced in its parent's frame,
//! then its own children are advanced in its frame. Controllable bodies
//! crossing a sphere of influence boundary are reparented in place.

use nalgebra::{Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    bodies::{Body, BodyId, ANGULAR_ACCELERATION, SPIN_EPSILON, THRUST_ACCELERATION},
    universe::{SoiTransition, SoiTransitionKind, Universe},
};

/// Hysteresis on sphere of influence exits, relative to the parent SOI.
const SOI_EXIT_FACTOR: f64 = 1.01;
/// Hysteresis on entries, relative to the sibling SOI.
const SOI_ENTRY_FACTOR: f64 = 0.99;

/// Attitude control inputs held during the current frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttitudeButtons {
    pub pitch_up: bool,
    pub pitch_down: bool,
    pub yaw_left: bool,
    pub yaw_right: bool,
    pub roll_cw: bool,
    pub roll_ccw: bool,
}

impl AttitudeButtons {
    pub fn any(&self) -> bool {
        self.pitch_up
            || self.pitch_down
            || self.yaw_left
            || self.yaw_right
            || self.roll_cw
            || self.roll_ccw
    }

    /// Body-frame axes of the held buttons.
    fn held_axes(&self) -> impl Iterator<Item = Vector3<f64>> {
        [
            (self.pitch_up, Vector3::z()),
            (self.pitch_down, -Vector3::z()),
            (self.yaw_left, Vector3::y()),
            (self.yaw_right, -Vector3::y()),
            (self.roll_ccw, Vector3::x()),
            (self.roll_cw, -Vector3::x()),
        ]
        .into_iter()
        .filter_map(|(held, axis)| held.then_some(axis))
    }
}

/// Session-wide inputs read by the propagator.
#[derive(Clone, Debug, PartialEq)]
pub struct Controls {
    pub timescale: f64,
    pub buttons: AttitudeButtons,
    pub selected: Option<BodyId>,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            timescale: 1.0,
            buttons: AttitudeButtons::default(),
            selected: None,
        }
    }
}

impl Controls {
    /// Attitude control and thrust are only honoured for the selected
    /// body at real-time speed.
    fn steers(&self, id: BodyId) -> bool {
        self.selected == Some(id) && self.timescale <= 1.0
    }
}

impl Universe {
    /// Advance every body by `delta_time` split into `div` equal substeps.
    ///
    /// Sphere of influence transitions are queued on the universe until
    /// [`Universe::drain_soi_transitions`] is called; only the most recent
    /// ones are kept if nobody drains them.
    pub fn propagate(&mut self, delta_time: f64, div: usize, controls: &Controls) {
        for _ in 0..div {
            self.simulate_bodies(delta_time, div, controls);
        }
    }

    /// Run a single substep of length `delta_time / div` over the whole
    /// tree.
    pub fn simulate_bodies(&mut self, delta_time: f64, div: usize, controls: &Controls) {
        let dt = delta_time / div.max(1) as f64;
        self.simulate_children(self.root(), dt, controls);
    }

    fn simulate_children(&mut self, parent: BodyId, dt: f64, controls: &Controls) {
        let parent_gm = self.bodies[parent].gm;
        let mut i = 0;
        while i < self.bodies[parent].children.len() {
            let id = self.bodies[parent].children[i];
            let body = &mut self.bodies[id];

            if body.position.norm_squared() != 0.0 {
                if body.controllable && controls.steers(id) {
                    attitude_control(body, &controls.buttons, dt);
                    apply_thrust(body, dt);
                }
                integrate_gravity(body, parent_gm, dt);
                integrate_orientation(body, dt);
            }

            // A reparented body has left this child list; the next
            // sibling now sits at index `i`.
            if body.controllable && self.check_soi(parent, id) {
                continue;
            }

            self.simulate_children(id, dt, controls);
            i += 1;
        }
    }

    /// Apply at most one sphere of influence transition to `id`.
    fn check_soi(&mut self, parent: BodyId, id: BodyId) -> bool {
        let position = self.bodies[id].position;
        let p = &self.bodies[parent];

        let exit = match p.parent {
            Some(grandparent) if p.has_soi() && p.soi * SOI_EXIT_FACTOR < position.norm() => {
                Some((grandparent, p.position, p.velocity))
            }
            _ => None,
        };
        if let Some((grandparent, offset, drift)) = exit {
            let body = &mut self.bodies[id];
            body.position += offset;
            body.velocity += drift;
            self.reparent(id, parent, grandparent, SoiTransitionKind::Exit);
            return true;
        }

        let target = self.bodies[parent].children.iter().copied().find(|&sibling| {
            let s = &self.bodies[sibling];
            sibling != id
                && s.has_soi()
                && s.position.metric_distance(&position) < s.soi * SOI_ENTRY_FACTOR
        });
        if let Some(sibling) = target {
            let (offset, drift) = (self.bodies[sibling].position, self.bodies[sibling].velocity);
            let body = &mut self.bodies[id];
            body.position -= offset;
            body.velocity -= drift;
            self.reparent(id, parent, sibling, SoiTransitionKind::Entry);
            return true;
        }

        false
    }

    fn reparent(&mut self, id: BodyId, from: BodyId, to: BodyId, kind: SoiTransitionKind) {
        self.relink(id, from, to);
        info!(
            body = %self.bodies[id].name,
            from = %self.bodies[from].name,
            to = %self.bodies[to].name,
            ?kind,
            "sphere of influence transition"
        );
        self.record_transition(SoiTransition {
            body: id,
            from,
            to,
            kind,
        });
    }
}

fn attitude_control(body: &mut Body, buttons: &AttitudeButtons, dt: f64) {
    let impulse = ANGULAR_ACCELERATION * dt;
    if buttons.any() {
        for axis in buttons.held_axes() {
            body.angular_velocity += body.orientation * axis * impulse;
        }
    } else if SPIN_EPSILON < body.angular_velocity.norm_squared() {
        // damp residual spin
        body.angular_velocity -= body.angular_velocity.normalize() * impulse;
    } else {
        body.angular_velocity = Vector3::zeros();
    }
}

fn apply_thrust(body: &mut Body, dt: f64) {
    if 0.0 < body.throttle {
        let dv = THRUST_ACCELERATION * body.throttle * dt;
        body.velocity += body.orientation * Vector3::x() * dv;
        body.total_delta_v += dv;
    }
}

/// Kick-drift-kick step towards the parent at the origin.
fn integrate_gravity(body: &mut Body, parent_gm: f64, dt: f64) {
    let pull = |r: &Vector3<f64>| -r.normalize() * (dt * parent_gm / r.norm_squared());

    let accel0 = pull(&body.position);
    let half_kick = body.velocity + accel0 * 0.5;
    let midpoint = body.position + body.velocity * dt * 0.5;
    body.velocity += pull(&midpoint);
    body.position += half_kick * dt;
}

fn integrate_orientation(body: &mut Body, dt: f64) {
    let (axis, rate) = Unit::new_and_get(body.angular_velocity);
    if rate != 0.0 {
        body.orientation = UnitQuaternion::from_axis_angle(&axis, rate * dt) * body.orientation;
    }
}
