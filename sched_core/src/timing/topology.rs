//! Orbital topology of the constellation.
//!
//! Maps satellite indices to satellite IDs and orbits, and classifies
//! crosslinks by how they sit within that topology.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, SchedulingError, SchedulingResult};
use crate::models::SatIndex;

/// Whether a crosslink stays within one orbit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrbitCrossing {
    IntraOrbit,
    InterOrbit,
}

/// Direction of an intra-orbit crosslink, from transmitter to receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrbitDirection {
    Increasing,
    Decreasing,
}

impl OrbitDirection {
    pub fn reversed(self) -> Self {
        match self {
            OrbitDirection::Increasing => OrbitDirection::Decreasing,
            OrbitDirection::Decreasing => OrbitDirection::Increasing,
        }
    }
}

#[derive(Debug, Clone)]
struct Orbit {
    name: String,
    /// Members in increasing satellite index order.
    sats: Vec<SatIndex>,
}

/// Satellite ID order plus orbit membership.
#[derive(Debug, Clone)]
pub struct OrbitTopology {
    sat_id_order: Vec<String>,
    orbits: Vec<Orbit>,
    orbit_by_sat: HashMap<SatIndex, usize>,
}

impl OrbitTopology {
    /// Build the topology.
    ///
    /// # Arguments
    /// * `sat_id_order` - satellite IDs, position `i` being satellite index `i`
    /// * `sat_ids_by_orbit` - orbit name to the IDs of its member satellites
    ///
    /// # Errors
    /// `TopologyLookup` if an orbit names an unknown satellite ID,
    /// `Configuration` if a satellite appears in two orbits.
    pub fn new(
        sat_id_order: Vec<String>,
        sat_ids_by_orbit: &BTreeMap<String, Vec<String>>,
    ) -> SchedulingResult<Self> {
        let index_by_id: HashMap<&str, SatIndex> = sat_id_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), SatIndex(i)))
            .collect();

        let mut orbits = Vec::with_capacity(sat_ids_by_orbit.len());
        let mut orbit_by_sat = HashMap::new();
        for (name, ids) in sat_ids_by_orbit {
            let mut sats = Vec::with_capacity(ids.len());
            for id in ids {
                let sat = *index_by_id.get(id.as_str()).ok_or_else(|| {
                    SchedulingError::topology(id, format!("orbit '{}' lists an unknown satellite", name))
                })?;
                if orbit_by_sat.insert(sat, orbits.len()).is_some() {
                    return Err(SchedulingError::configuration_with_context(
                        format!("satellite {} belongs to more than one orbit", id),
                        ErrorContext::new("build_topology").with_entity("orbit"),
                    ));
                }
                sats.push(sat);
            }
            sats.sort();
            orbits.push(Orbit {
                name: name.clone(),
                sats,
            });
        }

        Ok(Self {
            sat_id_order,
            orbits,
            orbit_by_sat,
        })
    }

    pub fn num_sats(&self) -> usize {
        self.sat_id_order.len()
    }

    /// Human-readable ID of a satellite.
    pub fn sat_id(&self, sat: SatIndex) -> SchedulingResult<&str> {
        self.sat_id_order
            .get(sat.value())
            .map(String::as_str)
            .ok_or_else(|| SchedulingError::topology(sat, "satellite index out of range"))
    }

    fn orbit_index(&self, sat: SatIndex) -> SchedulingResult<usize> {
        match self.orbit_by_sat.get(&sat) {
            Some(i) => Ok(*i),
            None => {
                let id = self.sat_id(sat)?;
                Err(SchedulingError::topology(id, "couldn't find orbit for satellite"))
            }
        }
    }

    /// Name of the orbit `sat` belongs to.
    pub fn orbit_of(&self, sat: SatIndex) -> SchedulingResult<&str> {
        let i = self.orbit_index(sat)?;
        Ok(self.orbits[i].name.as_str())
    }

    pub fn same_orbit(&self, a: SatIndex, b: SatIndex) -> SchedulingResult<bool> {
        Ok(self.orbit_index(a)? == self.orbit_index(b)?)
    }

    /// Classify the link between two satellites.
    pub fn orbit_crossing(&self, a: SatIndex, b: SatIndex) -> SchedulingResult<OrbitCrossing> {
        if self.same_orbit(a, b)? {
            Ok(OrbitCrossing::IntraOrbit)
        } else {
            Ok(OrbitCrossing::InterOrbit)
        }
    }

    /// Direction of an intra-orbit link from `tx` to `rx`.
    ///
    /// Increasing index order is `Increasing`; the wrap from the orbit's last
    /// satellite to its first also counts as `Increasing`, and the wrap from
    /// first to last as `Decreasing`. Swapping `tx` and `rx` always reverses
    /// the result.
    pub fn intra_orbit_direction(&self, tx: SatIndex, rx: SatIndex) -> SchedulingResult<OrbitDirection> {
        let orbit_i = self.orbit_index(tx)?;
        if self.orbit_index(rx)? != orbit_i || tx == rx {
            return Err(SchedulingError::TopologyLookup {
                sat_id: self.sat_id(rx)?.to_string(),
                message: format!(
                    "link {}->{} is not between two distinct satellites of one orbit",
                    tx, rx
                ),
                context: ErrorContext::new("intra_orbit_direction").with_entity("satellite"),
            });
        }
        let sats = &self.orbits[orbit_i].sats;
        // Both are members, so the orbit is non-empty.
        let first = sats[0];
        let last = sats[sats.len() - 1];

        let direction = if tx == last && rx == first {
            OrbitDirection::Increasing
        } else if tx == first && rx == last {
            OrbitDirection::Decreasing
        } else if tx < rx {
            OrbitDirection::Increasing
        } else {
            OrbitDirection::Decreasing
        };
        Ok(direction)
    }
}
