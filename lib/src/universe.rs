//! The body tree and its name registry.

use std::collections::{HashMap, VecDeque};

use color_eyre::eyre::{self, bail, OptionExt};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    arena::Arena,
    bodies::{Body, BodyId, AU},
    kepler::orbits::OrbitShape,
};

/// Undrained transitions kept before the oldest are discarded.
pub const MAX_PENDING_TRANSITIONS: usize = 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoiTransitionKind {
    /// Left the parent's sphere of influence for the grandparent's.
    Exit,
    /// Entered a sibling's sphere of influence.
    Entry,
}

/// A reparenting performed by the propagator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoiTransition {
    pub body: BodyId,
    pub from: BodyId,
    pub to: BodyId,
    pub kind: SoiTransitionKind,
}

/// Owns every body, the tree structure linking them, and the name
/// registry used for lookups by reparenting and snapshot restore.
#[derive(Clone, Debug, PartialEq)]
pub struct Universe {
    pub(crate) bodies: Arena<BodyId, Body>,
    registry: HashMap<String, BodyId>,
    root: BodyId,
    soi_transitions: VecDeque<SoiTransition>,
}

impl Universe {
    /// Start a universe from its root star.
    pub fn new(star: Body) -> eyre::Result<Self> {
        if star.parent.is_some() {
            bail!("root body {} cannot have a parent", star.name);
        }
        let mut bodies = Arena::new();
        let name = star.name.clone();
        let root = bodies.push(star);
        Ok(Self {
            bodies,
            registry: HashMap::from([(name, root)]),
            root,
            soi_transitions: VecDeque::new(),
        })
    }

    pub fn root(&self) -> BodyId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Insert a body under its parent; children are appended, so they
    /// are propagated in insertion order.
    pub fn add_body(&mut self, mut body: Body) -> eyre::Result<BodyId> {
        if self.registry.contains_key(&body.name) {
            bail!("a body named {} already exists", body.name);
        }
        let parent = body
            .parent
            .ok_or_else(|| eyre::eyre!("body {} has no parent", body.name))?;
        if !self.bodies.contains(parent) {
            bail!("parent {parent:?} of body {} does not exist", body.name);
        }
        body.children.clear();

        let name = body.name.clone();
        let id = self.bodies.push(body);
        self.bodies[parent].children.push(id);
        self.registry.insert(name, id);
        Ok(id)
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<BodyId> {
        self.registry.get(name).copied()
    }

    pub fn body_by_name(&self, name: &str) -> Option<&Body> {
        self.find_by_name(name).and_then(|id| self.bodies.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        self.bodies.iter()
    }

    /// Every body, parents before their children, siblings in
    /// propagation order.
    pub fn tree_order(&self) -> Vec<BodyId> {
        let mut order = Vec::with_capacity(self.bodies.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.bodies[id].children.iter().rev().copied());
        }
        order
    }

    pub fn is_ancestor(&self, ancestor: BodyId, mut id: BodyId) -> bool {
        while let Some(parent) = self.bodies.get(id).and_then(|b| b.parent) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    /// Move `id` under `new_parent` without touching its state vector.
    /// Callers that need continuity must change frames themselves.
    pub fn set_parent(&mut self, id: BodyId, new_parent: BodyId) -> eyre::Result<()> {
        if id == self.root {
            bail!("the root body cannot be reparented");
        }
        if !self.bodies.contains(id) || !self.bodies.contains(new_parent) {
            bail!("cannot reparent {id:?} under {new_parent:?}: no such body");
        }
        if id == new_parent || self.is_ancestor(id, new_parent) {
            bail!(
                "reparenting {} under {} would create a cycle",
                self.bodies[id].name,
                self.bodies[new_parent].name
            );
        }
        let old = self.bodies[id]
            .parent
            .ok_or_eyre("non-root body without a parent")?;
        if old != new_parent {
            self.relink(id, old, new_parent);
        }
        Ok(())
    }

    pub(crate) fn relink(&mut self, id: BodyId, from: BodyId, to: BodyId) {
        self.bodies[from].children.retain(|&c| c != id);
        self.bodies[to].children.push(id);
        self.bodies[id].parent = Some(to);
    }

    /// Position relative to the root star.
    pub fn world_position(&self, id: BodyId) -> Vector3<f64> {
        let mut position = Vector3::zeros();
        let mut cur = Some(id);
        while let Some(body) = cur.and_then(|id| self.bodies.get(id)) {
            position += body.position;
            cur = body.parent;
        }
        position
    }

    /// Height above the parent's surface (`km`).
    pub fn altitude_km(&self, id: BodyId) -> Option<f64> {
        let body = self.bodies.get(id)?;
        let parent = self.bodies.get(body.parent?)?;
        Some(body.position.norm() * AU - parent.radius)
    }

    /// Refresh the derived orbital elements of every non-root body.
    pub fn update_orbital_elements(&mut self, epoch: f64) {
        for id in self.tree_order() {
            let Some(parent) = self.bodies[id].parent else {
                continue;
            };
            let parent_gm = self.bodies[parent].gm;
            let body = &mut self.bodies[id];
            body.orbital_elements = body.state_vector().elements(parent_gm, epoch);
        }
    }

    /// Rendering geometry for a body's current orbit, from its last
    /// refreshed elements.
    pub fn orbit_shape(&self, id: BodyId) -> Option<OrbitShape> {
        let body = self.bodies.get(id)?;
        let parent = self.bodies.get(body.parent?)?;
        Some(
            body.state_vector()
                .orbit_shape(&body.orbital_elements, parent.gm),
        )
    }

    pub(crate) fn record_transition(&mut self, transition: SoiTransition) {
        if self.soi_transitions.len() == MAX_PENDING_TRANSITIONS {
            self.soi_transitions.pop_front();
            warn!("sphere of influence transitions are not being drained, dropping the oldest");
        }
        self.soi_transitions.push_back(transition);
    }

    /// Take every transition recorded since the last call, oldest first.
    pub fn drain_soi_transitions(&mut self) -> Vec<SoiTransition> {
        self.soi_transitions.drain(..).collect()
    }
}
