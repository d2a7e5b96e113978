//! Keplerian orbits: element extraction from state vectors and the
//! inverse construction used when placing bodies.

use std::f64::consts;

use color_eyre::eyre::{self, bail};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Squared-length threshold below which the node and eccentricity
/// vectors are treated as zero.
pub const EPSILON: f64 = 1e-40;

/// Number of samples on each side of periapsis in the hyperbola
/// polyline.
const HYPERBOLA_HALF_SAMPLES: i32 = 20;

/// Classical orbital elements of a body relative to its parent.
///
/// Angles are in radians, lengths in AU.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    pub semimajor_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub ascending_node: f64,
    pub argument_of_perihelion: f64,
    /// Simulation time (seconds) at which `mean_anomaly` holds.
    pub epoch: f64,
    pub mean_anomaly: f64,
    /// `velocity × position`, as the extractor computes it.
    #[serde(skip, default = "Vector3::zeros")]
    pub angular_momentum: Vector3<f64>,
    /// `-signum(position · velocity)`: `-1` while climbing towards
    /// apoapsis, `+1` while falling towards periapsis, `0` exactly at an
    /// apsis.
    #[serde(skip)]
    pub heading_apoapsis: f64,
}

impl Default for OrbitalElements {
    fn default() -> Self {
        Self {
            semimajor_axis: 0.0,
            eccentricity: 0.0,
            inclination: 0.0,
            ascending_node: 0.0,
            argument_of_perihelion: 0.0,
            epoch: 0.0,
            mean_anomaly: 0.0,
            angular_momentum: Vector3::zeros(),
            heading_apoapsis: 0.0,
        }
    }
}

impl OrbitalElements {
    pub fn is_hyperbolic(&self) -> bool {
        self.eccentricity > 1.0
    }

    pub fn periapsis_radius(&self) -> f64 {
        self.semimajor_axis * (1.0 - self.eccentricity)
    }

    /// Apoapsis distance; only meaningful for closed orbits.
    pub fn apoapsis_radius(&self) -> Option<f64> {
        (self.eccentricity < 1.0).then(|| self.semimajor_axis * (1.0 + self.eccentricity))
    }

    /// Orbital period from Kepler's third law, `None` for open orbits.
    pub fn period(&self, parent_gm: f64) -> Option<f64> {
        (self.semimajor_axis > 0.0 && self.eccentricity < 1.0).then(|| {
            2.0 * consts::PI * libm::sqrt(self.semimajor_axis.powi(3) / parent_gm)
        })
    }

    /// Rotation taking the perifocal frame (periapsis along +Y,
    /// periapsis velocity along +X) into the parent frame.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        orbit_rotation(
            self.ascending_node,
            self.inclination,
            self.argument_of_perihelion,
        )
    }
}

/// Orientation of the orbital plane alone, without the argument of
/// perihelion.
pub fn plane_rotation(ascending_node: f64, inclination: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), ascending_node - consts::FRAC_PI_2)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), consts::PI - inclination)
}

pub fn orbit_rotation(
    ascending_node: f64,
    inclination: f64,
    argument_of_perihelion: f64,
) -> UnitQuaternion<f64> {
    plane_rotation(ascending_node, inclination)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), argument_of_perihelion)
}

/// Position and velocity of a body in its parent's frame.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

impl StateVector {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        Self { position, velocity }
    }

    /// Place a body on the orbit described by `elements` at the given
    /// true anomaly.
    pub fn from_elements(elements: &OrbitalElements, true_anomaly: f64, parent_gm: f64) -> Self {
        let e = elements.eccentricity;
        let p = elements.semimajor_axis * (1.0 - e * e);
        let (sin_ta, cos_ta) = (libm::sin(true_anomaly), libm::cos(true_anomaly));
        let r = p / (1.0 + e * cos_ta);
        let speed = libm::sqrt(parent_gm / p);

        let rotation = elements.rotation();
        Self {
            position: rotation * Vector3::new(r * sin_ta, r * cos_ta, 0.0),
            velocity: rotation * Vector3::new(speed * (e + cos_ta), -speed * sin_ta, 0.0),
        }
    }

    fn eccentricity_vector(&self, parent_gm: f64) -> Vector3<f64> {
        let rv = self.position;
        let vv = self.velocity;
        let r = rv.norm();
        let v = vv.norm();
        rv * ((v * v - parent_gm / r) / parent_gm) - vv * (rv.dot(&vv) / parent_gm)
    }

    /// Derive the classical elements from this state.
    ///
    /// Total over every non-degenerate state: singular geometries
    /// (equatorial, circular, exactly at an apsis) get a defined
    /// fallback rather than `NaN`. See chapter 4.4 of Curtis,
    /// *Orbital Mechanics for Engineering Students*.
    pub fn elements(&self, parent_gm: f64, epoch: f64) -> OrbitalElements {
        let rv = self.position;
        let vv = self.velocity;
        let hv = vv.cross(&rv);
        let h = hv.norm();
        let r = rv.norm();
        let v = vv.norm();
        let nv = Vector3::z().cross(&hv);
        let ev = self.eccentricity_vector(parent_gm);
        let e = ev.norm();

        let inclination = if h > 0.0 {
            safe_acos(-hv[2] / h)
        } else {
            0.0
        };

        let equatorial = nv.norm_squared() <= EPSILON;
        let circular = ev.norm_squared() <= EPSILON;

        let ascending_node = if equatorial {
            0.0
        } else {
            let lan = safe_acos(nv[0] / nv.norm());
            if nv[1] < 0.0 {
                2.0 * consts::PI - lan
            } else {
                lan
            }
        };

        let semimajor_axis = 1.0 / (2.0 / r - v * v / parent_gm);

        let argument_of_perihelion = if equatorial || circular {
            // Longitude of periapsis; mirrored for prograde orbits so
            // that it inverts `orbit_rotation` with a zero node.
            let ey = if hv[2] < 0.0 { -ev[1] } else { ev[1] };
            libm::atan2(ey, ev[0]).rem_euclid(2.0 * consts::PI)
        } else {
            let argpe = safe_acos(nv.dot(&ev) / nv.norm() / e);
            if ev[2] < 0.0 {
                2.0 * consts::PI - argpe
            } else {
                argpe
            }
        };

        let rdotv = rv.dot(&vv);
        let heading_apoapsis = if rdotv == 0.0 { 0.0 } else { -rdotv.signum() };

        let mean_anomaly = if circular {
            0.0
        } else {
            let ta = safe_acos(ev.dot(&rv) / (e * r));
            let ta = if rdotv < 0.0 { -ta } else { ta };
            ta_to_ma(ta, e)
        };

        OrbitalElements {
            semimajor_axis,
            eccentricity: e,
            inclination,
            ascending_node,
            argument_of_perihelion,
            epoch,
            mean_anomaly,
            angular_momentum: hv,
            heading_apoapsis,
        }
    }

    /// Geometry a renderer needs to draw the conic this state lies on.
    pub fn orbit_shape(&self, elements: &OrbitalElements, parent_gm: f64) -> OrbitShape {
        let rotation = elements.rotation();
        let a = elements.semimajor_axis;
        let e = elements.eccentricity;

        let conic = if elements.is_hyperbolic() {
            Conic::Hyperbola {
                points: hyperbola_points(e, elements.angular_momentum.norm_squared(), parent_gm),
            }
        } else {
            Conic::Ellipse {
                semi_minor: a * libm::sqrt(1.0 - e * e),
                semi_major: a,
                center: rotation * Vector3::new(0.0, -a * e, 0.0),
            }
        };

        let ev = self.eccentricity_vector(parent_gm);
        let direction = if ev.norm_squared() > EPSILON {
            ev.normalize()
        } else {
            Vector3::zeros()
        };
        let periapsis = (e > 0.0).then(|| direction * (a * (1.0 - e)));
        let apoapsis = (e > 0.0 && e < 1.0).then(|| -direction * (a * (1.0 + e)));

        OrbitShape {
            rotation,
            conic,
            periapsis,
            apoapsis,
        }
    }
}

/// Rendering hint produced alongside the elements.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitShape {
    /// Perifocal to parent frame.
    pub rotation: UnitQuaternion<f64>,
    pub conic: Conic,
    /// Periapsis position in the parent frame, when defined (`e > 0`).
    pub periapsis: Option<Vector3<f64>>,
    /// Apoapsis position in the parent frame, when defined (`0 < e < 1`).
    pub apoapsis: Option<Vector3<f64>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Conic {
    /// A unit circle scaled by (`semi_minor`, `semi_major`), rotated by
    /// the orbit rotation and translated to `center` (parent frame).
    Ellipse {
        semi_minor: f64,
        semi_major: f64,
        center: Vector3<f64>,
    },
    /// Polyline in the perifocal frame.
    Hyperbola { points: Vec<Vector3<f64>> },
}

/// Sample the hyperbola `r = h² / μ / (1 + e cos θ)` between its
/// asymptotes. The sample index is square-rooted so the far branches
/// are not drawn with a handful of long segments.
pub fn hyperbola_points(eccentricity: f64, h2: f64, parent_gm: f64) -> Vec<Vector3<f64>> {
    let theta_inf = safe_acos(-1.0 / eccentricity);
    (-HYPERBOLA_HALF_SAMPLES + 1..HYPERBOLA_HALF_SAMPLES)
        .map(|i| {
            let isign = if i < 0 { -1.0 } else { 1.0 };
            let theta = theta_inf
                * isign
                * libm::sqrt(f64::from(i.abs()) / f64::from(HYPERBOLA_HALF_SAMPLES));
            Vector3::new(libm::sin(theta), libm::cos(theta), 0.0)
                * (h2 / parent_gm / (1.0 + eccentricity * libm::cos(theta)))
        })
        .collect()
}

fn safe_acos(x: f64) -> f64 {
    libm::acos(x.clamp(-1.0, 1.0))
}

/// True anomaly to mean anomaly for any conic. Elliptic results are
/// wrapped into `[0, 2π)`.
pub fn ta_to_ma(ta: f64, e: f64) -> f64 {
    if e < 1.0 {
        let ea = ta_to_ea(ta, e);
        (ea - e * libm::sin(ea)).rem_euclid(2.0 * consts::PI)
    } else if e > 1.0 {
        let f = 2.0 * libm::atanh(libm::sqrt((e - 1.0) / (e + 1.0)) * libm::tan(ta / 2.0));
        e * libm::sinh(f) - f
    } else {
        // Barker's equation
        let d = libm::tan(ta / 2.0);
        d + d.powi(3) / 3.0
    }
}

pub fn ta_to_ea(ta: f64, e: f64) -> f64 {
    libm::atan2(
        libm::sqrt(1.0 - e * e) * libm::sin(ta),
        e + libm::cos(ta),
    )
}

pub fn ea_to_ta(ea: f64, e: f64) -> f64 {
    let beta = e / (1.0 + libm::sqrt(1.0 - e.powi(2)));
    ea + 2.0 * libm::atan2(beta * libm::sin(ea), 1.0 - beta * libm::cos(ea))
}

/// Solve Kepler's equation for the eccentric anomaly.
///
/// Recommended tolerance: `tol = 1e-12`, `maxiter = 50`.
pub fn ma_to_ea(ma: f64, e: f64, tol: f64, maxiter: u64) -> eyre::Result<f64> {
    if !(0.0..1.0).contains(&e) {
        bail!("ma_to_ea: eccentricity {e} is not elliptic");
    }

    let mut ea_new = if -consts::PI < ma && ma < 0.0 || ma > consts::PI {
        ma - e
    } else {
        ma + e
    };

    for _ in 0..maxiter {
        let ea = ea_new;
        ea_new = ea + (ma - ea + e * libm::sin(ea)) / (1.0 - e * libm::cos(ea));

        if (ea_new - ea).abs() < tol {
            return Ok(ea_new);
        }
    }
    bail!("ma_to_ea({ma}, {e}, {tol}, {maxiter}): failed to converge");
}

pub fn ma_to_ta(ma: f64, e: f64, tol: f64, maxiter: u64) -> eyre::Result<f64> {
    let ea = ma_to_ea(ma, e, tol, maxiter)?;
    Ok(ea_to_ta(ea, e))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn angle_diff(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(2.0 * consts::PI);
        d.min(2.0 * consts::PI - d)
    }

    fn elements(a: f64, e: f64, i: f64, lan: f64, argpe: f64) -> OrbitalElements {
        OrbitalElements {
            semimajor_axis: a,
            eccentricity: e,
            inclination: i,
            ascending_node: lan,
            argument_of_perihelion: argpe,
            ..OrbitalElements::default()
        }
    }

    #[test]
    fn elements_round_trip_through_state() {
        let cases = [
            elements(1.0, 0.1, 0.3, 1.0, 0.5),
            elements(1.0, 0.2, 0.5, 4.0, 2.0),
            elements(2.0, 0.5, 1.2, 0.2, 5.0),
            elements(0.7, 0.05, 2.5, 3.0, 1.5),
        ];
        for orig in cases {
            for ta in [0.0, 1.0, 2.5, 4.0] {
                let sv = StateVector::from_elements(&orig, ta, 1.0);
                let got = sv.elements(1.0, 0.0);
                assert_abs_diff_eq!(got.semimajor_axis, orig.semimajor_axis, epsilon = 1e-9);
                assert_abs_diff_eq!(got.eccentricity, orig.eccentricity, epsilon = 1e-9);
                assert_abs_diff_eq!(got.inclination, orig.inclination, epsilon = 1e-9);
                assert!(angle_diff(got.ascending_node, orig.ascending_node) < 1e-9);
                assert!(angle_diff(got.argument_of_perihelion, orig.argument_of_perihelion) < 1e-8);
            }
        }
    }

    #[test]
    fn mean_anomaly_round_trip() {
        let orig = elements(1.3, 0.4, 0.2, 0.3, 0.9);
        for ma in [0.1, 1.0, 3.0, 5.5] {
            let ta = ma_to_ta(ma, orig.eccentricity, 1e-12, 50).unwrap();
            let got = StateVector::from_elements(&orig, ta, 2.0).elements(2.0, 7.0);
            assert!(angle_diff(got.mean_anomaly, ma) < 1e-9);
            assert_eq!(got.epoch, 7.0);
        }
    }

    #[test]
    fn circular_equatorial_has_defined_angles() {
        let sv = StateVector::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
        let el = sv.elements(1.0, 0.0);
        assert_eq!(el.ascending_node, 0.0);
        assert!(el.argument_of_perihelion.is_finite());
        assert!(el.inclination.is_finite());
        assert_abs_diff_eq!(el.inclination, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(el.eccentricity, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(el.semimajor_axis, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn equatorial_fallback_inverts_construction() {
        for (i, argpe) in [(0.0, 0.7), (consts::PI, 0.7), (0.0, 4.0)] {
            let orig = elements(1.0, 0.2, i, 0.0, argpe);
            let mut sv = StateVector::from_elements(&orig, 0.3, 1.0);
            // Strip quaternion round-off so the node vector is exactly zero.
            sv.position[2] = 0.0;
            sv.velocity[2] = 0.0;
            let el = sv.elements(1.0, 0.0);
            assert_eq!(el.ascending_node, 0.0);
            assert!(angle_diff(el.argument_of_perihelion, argpe) < 1e-9);
        }
    }

    #[test]
    fn heading_apoapsis_sign() {
        let orig = elements(1.0, 0.3, 0.4, 0.5, 0.6);
        let outbound = StateVector::from_elements(&orig, 1.0, 1.0).elements(1.0, 0.0);
        let inbound = StateVector::from_elements(&orig, -1.0, 1.0).elements(1.0, 0.0);
        assert_eq!(outbound.heading_apoapsis, -1.0);
        assert_eq!(inbound.heading_apoapsis, 1.0);

        let at_apsis =
            StateVector::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.2, 0.0));
        assert_eq!(at_apsis.elements(1.0, 0.0).heading_apoapsis, 0.0);
    }

    #[test]
    fn hyperbolic_state_yields_polyline() {
        let r = 1.0;
        let escape = libm::sqrt(2.0 / r);
        let sv = StateVector::new(Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, escape * 1.2, 0.0));
        let el = sv.elements(1.0, 0.0);
        assert!(el.eccentricity > 1.0);
        assert!(el.semimajor_axis < 0.0);
        assert_eq!(el.apoapsis_radius(), None);
        assert_eq!(el.period(1.0), None);

        let shape = sv.orbit_shape(&el, 1.0);
        let Conic::Hyperbola { points } = &shape.conic else {
            panic!("expected a hyperbola, got {:?}", shape.conic);
        };
        assert_eq!(points.len(), 39);
        // Centre sample is periapsis, on +Y of the perifocal frame.
        assert_abs_diff_eq!(points[19][0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(points[19][1], el.periapsis_radius(), epsilon = 1e-9);
        assert!(points.iter().all(|p| p.iter().all(|c| c.is_finite())));
        assert!(shape.periapsis.is_some());
        assert!(shape.apoapsis.is_none());
    }

    #[test]
    fn ellipse_shape_apsides() {
        let orig = elements(2.0, 0.5, 0.1, 0.2, 0.3);
        let sv = StateVector::from_elements(&orig, 0.0, 1.0);
        let el = sv.elements(1.0, 0.0);
        let shape = sv.orbit_shape(&el, 1.0);
        let Conic::Ellipse {
            semi_minor,
            semi_major,
            ..
        } = shape.conic
        else {
            panic!("expected an ellipse");
        };
        assert_abs_diff_eq!(semi_major, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(semi_minor, 2.0 * libm::sqrt(0.75), epsilon = 1e-9);
        let peri = shape.periapsis.unwrap();
        let apo = shape.apoapsis.unwrap();
        assert_abs_diff_eq!((peri - sv.position).norm(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(apo.norm(), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(el.period(1.0).unwrap(), 2.0 * consts::PI * 8f64.sqrt(), epsilon = 1e-9);
    }
}
