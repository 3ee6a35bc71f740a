//! Typed lookup table of minimum transition times.
//!
//! The configuration file keys this table by strings
//! (`transition_time_s.<context>.<act1-act2>.<transition type>`); those keys
//! are parsed once at load time so lookups never touch strings.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use qtty::Seconds;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, SchedulingError, SchedulingResult};
use crate::models::ActivityCode;

/// Whether a pair of activities is evaluated on one satellite or across two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransitionContext {
    #[serde(rename = "intra-sat")]
    IntraSat,
    #[serde(rename = "inter-sat")]
    InterSat,
}

impl TransitionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionContext::IntraSat => "intra-sat",
            TransitionContext::InterSat => "inter-sat",
        }
    }
}

impl FromStr for TransitionContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intra-sat" => Ok(TransitionContext::IntraSat),
            "inter-sat" => Ok(TransitionContext::InterSat),
            other => Err(format!("Unknown transition context '{}'", other)),
        }
    }
}

/// Ordered pair of activity types, written `act1-act2` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityPair {
    pub first: ActivityCode,
    pub second: ActivityCode,
}

impl ActivityPair {
    pub fn new(first: ActivityCode, second: ActivityCode) -> Self {
        Self { first, second }
    }
}

impl fmt::Display for ActivityPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

impl FromStr for ActivityPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once('-')
            .ok_or_else(|| format!("Activity pair '{}' is not of the form act1-act2", s))?;
        Ok(ActivityPair::new(a.parse()?, b.parse()?))
    }
}

/// Bespoke classification of a transition between two activities.
///
/// Only crosslink-to-crosslink transitions on one satellite get a type other
/// than [`TransitionType::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransitionType {
    #[serde(rename = "intra to inter-orbit/inter to intra-orbit")]
    MixedOrbitCrossing,
    #[serde(rename = "intra-orbit,same direction")]
    IntraOrbitSameDirection,
    #[serde(rename = "intra-orbit,different direction")]
    IntraOrbitDifferentDirection,
    #[serde(rename = "inter-orbit,same orbit,same satellite")]
    InterOrbitSameSatellite,
    #[serde(rename = "inter-orbit,same orbit,different satellite")]
    InterOrbitSameOrbitDifferentSatellite,
    #[serde(rename = "inter-orbit,different orbit")]
    InterOrbitDifferentOrbit,
    #[serde(rename = "default")]
    Default,
}

impl TransitionType {
    pub const ALL: [TransitionType; 7] = [
        TransitionType::MixedOrbitCrossing,
        TransitionType::IntraOrbitSameDirection,
        TransitionType::IntraOrbitDifferentDirection,
        TransitionType::InterOrbitSameSatellite,
        TransitionType::InterOrbitSameOrbitDifferentSatellite,
        TransitionType::InterOrbitDifferentOrbit,
        TransitionType::Default,
    ];

    /// Configuration-file spelling of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionType::MixedOrbitCrossing => "intra to inter-orbit/inter to intra-orbit",
            TransitionType::IntraOrbitSameDirection => "intra-orbit,same direction",
            TransitionType::IntraOrbitDifferentDirection => "intra-orbit,different direction",
            TransitionType::InterOrbitSameSatellite => "inter-orbit,same orbit,same satellite",
            TransitionType::InterOrbitSameOrbitDifferentSatellite => {
                "inter-orbit,same orbit,different satellite"
            }
            TransitionType::InterOrbitDifferentOrbit => "inter-orbit,different orbit",
            TransitionType::Default => "default",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransitionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown transition type '{}'", s))
    }
}

/// Raw nested layout as it appears in the configuration file.
pub type RawTransitionTable = BTreeMap<String, BTreeMap<String, BTreeMap<String, Seconds>>>;

/// Minimum transition times keyed by (context, activity pair, transition type).
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    entries: HashMap<(TransitionContext, ActivityPair, TransitionType), Seconds>,
}

impl TransitionTable {
    /// Convert the raw string-keyed table, rejecting unknown keys and
    /// negative durations.
    pub fn from_raw(raw: &RawTransitionTable) -> SchedulingResult<Self> {
        let mut entries = HashMap::new();
        for (context_key, pairs) in raw {
            let context: TransitionContext = context_key.parse().map_err(config_err)?;
            for (pair_key, types) in pairs {
                let pair: ActivityPair = pair_key.parse().map_err(config_err)?;
                for (type_key, seconds) in types {
                    let ttype: TransitionType = type_key.parse().map_err(config_err)?;
                    if seconds.value().is_nan() || seconds.value() < 0.0 {
                        return Err(config_err(format!(
                            "transition time for {}.{}.{} must be non-negative, got {}",
                            context_key,
                            pair_key,
                            type_key,
                            seconds.value()
                        )));
                    }
                    entries.insert((context, pair, ttype), *seconds);
                }
            }
        }
        Ok(Self { entries })
    }

    /// Set one entry.
    pub fn insert(
        &mut self,
        context: TransitionContext,
        pair: ActivityPair,
        ttype: TransitionType,
        seconds: Seconds,
    ) {
        self.entries.insert((context, pair, ttype), seconds);
    }

    /// Look up an entry. A missing entry is a configuration error.
    pub fn lookup(
        &self,
        context: TransitionContext,
        pair: ActivityPair,
        ttype: TransitionType,
    ) -> SchedulingResult<Seconds> {
        self.entries
            .get(&(context, pair, ttype))
            .copied()
            .ok_or_else(|| {
                SchedulingError::configuration_with_context(
                    format!(
                        "no transition time configured for {}.{}.{}",
                        context.as_str(),
                        pair,
                        ttype
                    ),
                    ErrorContext::new("transition_lookup").with_entity("transition_time_s"),
                )
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn config_err(message: impl Into<String>) -> SchedulingError {
    SchedulingError::configuration_with_context(
        message,
        ErrorContext::new("parse_transition_table").with_entity("transition_time_s"),
    )
}
