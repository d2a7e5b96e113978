//! Plain-text status report for the end of a run.

use std::fmt::Write;

use itertools::Itertools;
use orbiter::{
    bodies::{BodyId, AU},
    simulation::Simulation,
    universe::SoiTransition,
};

use crate::config::Units;

fn distance(au: f64, units: Units) -> String {
    match units {
        Units::Au => format!("{au:.6} AU"),
        Units::Km => format!("{:.1} km", au * AU),
    }
}

fn heading(h: f64) -> &'static str {
    if h < 0.0 {
        "apoapsis"
    } else if h > 0.0 {
        "periapsis"
    } else {
        "apsis"
    }
}

/// Orbital elements and flight statistics of one body.
pub fn body_report(sim: &Simulation, id: BodyId, units: Units) -> String {
    let universe = sim.universe();
    let Some(body) = universe.get(id) else {
        return String::new();
    };
    let parent = body
        .parent
        .and_then(|p| universe.get(p))
        .map_or("-", |p| p.name.as_str());
    let el = &body.orbital_elements;

    let mut rows = vec![
        ("body", body.name.clone()),
        ("parent", parent.to_owned()),
        ("semimajor axis", distance(el.semimajor_axis, units)),
        ("eccentricity", format!("{:.6}", el.eccentricity)),
        ("inclination", format!("{:.3}°", el.inclination.to_degrees())),
        ("ascending node", format!("{:.3}°", el.ascending_node.to_degrees())),
        (
            "arg. of perihelion",
            format!("{:.3}°", el.argument_of_perihelion.to_degrees()),
        ),
        ("mean anomaly", format!("{:.3}°", el.mean_anomaly.to_degrees())),
        ("heading", heading(el.heading_apoapsis).to_owned()),
    ];
    if let Some(altitude) = universe.altitude_km(id) {
        rows.push(("altitude", format!("{altitude:.1} km")));
    }
    if body.controllable {
        rows.push(("throttle", format!("{:.0}%", body.throttle * 100.0)));
        rows.push(("total Δv", format!("{:.3} m/s", body.total_delta_v * AU * 1e3)));
        rows.push(("ignitions", body.ignition_count.to_string()));
    }

    let width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|(k, v)| format!("{k:>width$}  {v}"))
        .join("\n")
}

pub fn transitions_report(sim: &Simulation, transitions: &[SoiTransition]) -> String {
    let name = move |id: BodyId| sim.universe().get(id).map_or("?", |b| b.name.as_str());
    let mut out = String::new();
    for t in transitions {
        let _ = writeln!(
            out,
            "{}: {} -> {} ({:?})",
            name(t.body),
            name(t.from),
            name(t.to),
            t.kind
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use orbiter::universe::Universe;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn rocket_report_lists_elements_in_km() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut sim = Simulation::new(Universe::solar_system(&mut rng).unwrap());
        sim.tick(1.0);
        let rocket = sim.selected().unwrap();
        let report = body_report(&sim, rocket, Units::Km);
        assert!(report.contains("rocket"));
        assert!(report.contains("earth"));
        assert!(report.contains(" km"));
        assert!(report.contains("ignitions  0"));
    }
}
