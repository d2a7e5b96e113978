//! Saving and restoring a session's dynamic state.
//!
//! Only the state vector, attitude and flight statistics of each body
//! are persisted. Static properties (gravitational parameters, radii,
//! spheres of influence) come from the scenario the snapshot is loaded
//! into, and bodies are matched by name.

use color_eyre::eyre::{self, bail};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    simulation::{check_timescale, Simulation},
    time::UT,
    universe::Universe,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodySnapshot {
    pub name: String,
    pub parent: Option<String>,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub angular_velocity: Vector3<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_delta_v: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignition_count: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseSnapshot {
    pub sim_time: UT,
    pub start_time: UT,
    pub time_scale: f64,
    /// Parents precede their children.
    pub bodies: Vec<BodySnapshot>,
}

impl Universe {
    pub fn body_snapshots(&self) -> Vec<BodySnapshot> {
        self.tree_order()
            .into_iter()
            .map(|id| {
                let body = &self.bodies[id];
                BodySnapshot {
                    name: body.name.clone(),
                    parent: body.parent.map(|p| self.bodies[p].name.clone()),
                    position: body.position,
                    velocity: body.velocity,
                    orientation: body.orientation,
                    angular_velocity: body.angular_velocity,
                    total_delta_v: (body.total_delta_v != 0.0).then_some(body.total_delta_v),
                    ignition_count: (body.ignition_count != 0).then_some(body.ignition_count),
                }
            })
            .collect()
    }

    /// Overwrite the dynamic state of every named body that exists here.
    /// Unknown bodies are skipped; an unknown parent or a tree the
    /// snapshot cannot be arranged into is an error, and leaves `self`
    /// untouched.
    pub fn restore_bodies(&mut self, snapshots: &[BodySnapshot]) -> eyre::Result<()> {
        let mut staged = self.clone();
        staged.apply_snapshots(snapshots)?;
        *self = staged;
        Ok(())
    }

    fn apply_snapshots(&mut self, snapshots: &[BodySnapshot]) -> eyre::Result<()> {
        for snap in snapshots {
            let Some(id) = self.find_by_name(&snap.name) else {
                warn!(name = %snap.name, "skipping unknown body in snapshot");
                continue;
            };

            match (&snap.parent, id == self.root()) {
                (None, true) => {}
                (None, false) => bail!("snapshot detaches {} from the tree", snap.name),
                (Some(parent), _) => {
                    let Some(parent_id) = self.find_by_name(parent) else {
                        bail!("snapshot puts {} under unknown body {parent}", snap.name);
                    };
                    self.set_parent(id, parent_id)?;
                }
            }

            let body = &mut self.bodies[id];
            body.position = snap.position;
            body.velocity = snap.velocity;
            body.orientation = snap.orientation;
            body.angular_velocity = snap.angular_velocity;
            body.total_delta_v = snap.total_delta_v.unwrap_or(0.0);
            body.ignition_count = snap.ignition_count.unwrap_or(0);
            debug!(name = %snap.name, "restored body");
        }
        Ok(())
    }
}

impl Simulation {
    pub fn snapshot(&self) -> UniverseSnapshot {
        UniverseSnapshot {
            sim_time: self.sim_time(),
            start_time: self.start_time(),
            time_scale: self.timescale(),
            bodies: self.universe().body_snapshots(),
        }
    }

    /// Load a snapshot taken from a session of the same scenario. Nothing
    /// changes if the snapshot is rejected.
    pub fn restore(&mut self, snapshot: &UniverseSnapshot) -> eyre::Result<()> {
        check_timescale(snapshot.time_scale)?;
        self.universe_mut().restore_bodies(&snapshot.bodies)?;
        self.set_clock(snapshot.start_time, snapshot.sim_time);
        self.controls_mut().timescale = snapshot.time_scale;
        let epoch = snapshot.sim_time.as_seconds();
        self.universe_mut().update_orbital_elements(epoch);
        Ok(())
    }
}
