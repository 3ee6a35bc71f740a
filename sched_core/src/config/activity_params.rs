//! Activity parameter file support.
//!
//! Reads transition times, minimum activity durations and formulation/solver
//! settings from a TOML (or JSON) file and converts them into typed tables.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use qtty::Seconds;
use serde::{Deserialize, Serialize};

use super::transition_table::{RawTransitionTable, TransitionTable};
use crate::error::{ErrorContext, SchedulingError, SchedulingResult};
use crate::models::{ActivityCode, ActivityWindow, ActivityCapabilities};
use crate::routing::LatencyAnchor;

/// Table layouts this crate knows how to read.
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["0.7"];

/// How to tell whether an intra-orbit crosslink runs "up" or "down" the orbit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionMethod {
    /// Increasing satellite index, with the last-to-first wraparound counted
    /// as increasing.
    #[serde(rename = "by_increasing_id")]
    ByIncreasingId,
}

/// Activity parameters as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityParamsFile {
    pub schema_version: String,
    #[serde(default = "default_direction_method")]
    pub intra_orbit_neighbor_direction_method: String,
    pub transition_time_s: RawTransitionTable,
    pub min_duration_s: BTreeMap<String, Seconds>,
    #[serde(default)]
    pub formulation: FormulationSettings,
    #[serde(default)]
    pub solver: SolverParams,
}

/// Knobs for constraint generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulationSettings {
    /// Replace hard transition constraints with bounded slack variables.
    #[serde(default)]
    pub allow_act_timing_constr_violations: bool,
    /// Indicator values within this distance of 1 count as "on" after a solve.
    #[serde(default = "default_binary_epsilon")]
    pub binary_epsilon: f64,
    #[serde(default = "default_obs_anchor")]
    pub latency_obs_anchor: LatencyAnchor,
    #[serde(default = "default_dlnk_anchor")]
    pub latency_dlnk_anchor: LatencyAnchor,
    /// Routes at or below this latency all score 1.0.
    #[serde(default = "default_min_latency_for_sf_1_mins")]
    pub min_latency_for_sf_1_mins: f64,
}

/// Parameters handed through, untouched, to the external optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    #[serde(default = "default_max_runtime_s")]
    pub max_runtime_s: f64,
    #[serde(default = "default_optimality_gap")]
    pub optimality_gap: f64,
    #[serde(default = "default_integer_feasibility_tolerance")]
    pub integer_feasibility_tolerance: f64,
}

fn default_direction_method() -> String {
    "by_increasing_id".to_string()
}

fn default_binary_epsilon() -> f64 {
    0.1
}

fn default_obs_anchor() -> LatencyAnchor {
    LatencyAnchor::OriginalEnd
}

fn default_dlnk_anchor() -> LatencyAnchor {
    LatencyAnchor::Center
}

fn default_min_latency_for_sf_1_mins() -> f64 {
    5.0
}

fn default_max_runtime_s() -> f64 {
    300.0
}

fn default_optimality_gap() -> f64 {
    0.001
}

fn default_integer_feasibility_tolerance() -> f64 {
    1e-5
}

impl Default for FormulationSettings {
    fn default() -> Self {
        Self {
            allow_act_timing_constr_violations: false,
            binary_epsilon: default_binary_epsilon(),
            latency_obs_anchor: default_obs_anchor(),
            latency_dlnk_anchor: default_dlnk_anchor(),
            min_latency_for_sf_1_mins: default_min_latency_for_sf_1_mins(),
        }
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_runtime_s: default_max_runtime_s(),
            optimality_gap: default_optimality_gap(),
            integer_feasibility_tolerance: default_integer_feasibility_tolerance(),
        }
    }
}

/// Validated activity parameters.
#[derive(Debug, Clone)]
pub struct ActivityParams {
    pub schema_version: String,
    pub direction_method: DirectionMethod,
    pub transition_times: TransitionTable,
    pub min_durations: HashMap<ActivityCode, Seconds>,
    pub formulation: FormulationSettings,
    pub solver: SolverParams,
}

impl ActivityParams {
    /// Validate a parsed file.
    ///
    /// # Errors
    /// * `Configuration` for an unsupported schema version, an unknown table
    ///   key or a bad numeric value
    /// * `Unimplemented` for a direction method other than `by_increasing_id`
    pub fn from_raw(raw: ActivityParamsFile) -> SchedulingResult<Self> {
        if !SUPPORTED_SCHEMA_VERSIONS.contains(&raw.schema_version.as_str()) {
            return Err(SchedulingError::configuration_with_context(
                format!(
                    "unsupported schema version '{}' (supported: {:?})",
                    raw.schema_version, SUPPORTED_SCHEMA_VERSIONS
                ),
                ErrorContext::new("load_activity_params").with_entity("schema_version"),
            ));
        }

        let direction_method = match raw.intra_orbit_neighbor_direction_method.as_str() {
            "by_increasing_id" => DirectionMethod::ByIncreasingId,
            other => {
                return Err(SchedulingError::Unimplemented {
                    message: format!("intra-orbit direction method '{}'", other),
                    context: ErrorContext::new("load_activity_params")
                        .with_entity("intra_orbit_neighbor_direction_method"),
                })
            }
        };

        let transition_times = TransitionTable::from_raw(&raw.transition_time_s)?;

        let mut min_durations = HashMap::new();
        for (code, seconds) in &raw.min_duration_s {
            let code: ActivityCode = code.parse().map_err(|e: String| {
                SchedulingError::configuration_with_context(
                    e,
                    ErrorContext::new("load_activity_params").with_entity("min_duration_s"),
                )
            })?;
            if seconds.value().is_nan() || seconds.value() < 0.0 {
                return Err(SchedulingError::configuration(format!(
                    "min_duration_s.{} must be non-negative",
                    code
                )));
            }
            min_durations.insert(code, *seconds);
        }

        let eps = raw.formulation.binary_epsilon;
        if !(eps > 0.0 && eps < 1.0) {
            return Err(SchedulingError::configuration(format!(
                "formulation.binary_epsilon must lie in (0, 1), got {}",
                eps
            )));
        }

        Ok(Self {
            schema_version: raw.schema_version,
            direction_method,
            transition_times,
            min_durations,
            formulation: raw.formulation,
            solver: raw.solver,
        })
    }

    /// Parse parameters from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: ActivityParamsFile =
            toml::from_str(content).context("Failed to parse activity params TOML")?;
        Ok(Self::from_raw(raw)?)
    }

    /// Parse parameters from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: ActivityParamsFile =
            serde_json::from_str(content).context("Failed to parse activity params JSON")?;
        Ok(Self::from_raw(raw)?)
    }

    /// Load activity parameters from a file.
    ///
    /// Files ending in `.json` are read as JSON, everything else as TOML.
    ///
    /// # Arguments
    /// * `path` - Path to the parameter file
    ///
    /// # Returns
    /// * `Ok(ActivityParams)` if the file was read, parsed and validated
    /// * `Err` describing the I/O, parse or validation failure
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read activity params file {}", path.display()))?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let params = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
        .with_context(|| format!("Invalid activity params in {}", path.display()))?;

        info!(
            "Loaded activity params from {} (schema {}, {} transition entries)",
            path.display(),
            params.schema_version,
            params.transition_times.len()
        );
        Ok(params)
    }

    /// Load activity parameters from the default location.
    ///
    /// Searches for `activity_params.toml` in:
    /// 1. Current directory
    /// 2. `sched_core/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> Result<Self> {
        let search_paths = [
            PathBuf::from("activity_params.toml"),
            PathBuf::from("sched_core/activity_params.toml"),
            PathBuf::from("../activity_params.toml"),
        ];

        for path in &search_paths {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Err(SchedulingError::configuration(
            "No activity_params.toml found in standard locations",
        )
        .into())
    }

    /// Minimum duration for an activity type.
    pub fn min_duration(&self, code: ActivityCode) -> SchedulingResult<Seconds> {
        self.min_durations.get(&code).copied().ok_or_else(|| {
            SchedulingError::configuration_with_context(
                format!("no minimum duration configured for '{}'", code),
                ErrorContext::new("min_duration").with_entity("min_duration_s"),
            )
        })
    }

    /// Minimum duration for the type of `act`.
    pub fn act_min_duration(&self, act: &ActivityWindow) -> SchedulingResult<Seconds> {
        self.min_duration(act.codename())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::transition_table::{ActivityPair, TransitionContext, TransitionType};

    const MINIMAL: &str = r#"
schema_version = "0.7"

[min_duration_s]
obs = 15.0
dlnk = 30.0
xlnk = 30.0

[transition_time_s.intra-sat.obs-dlnk]
default = 10.0

[transition_time_s.intra-sat.xlnk-xlnk]
"intra-orbit,same direction" = 20.0
"#;

    #[test]
    fn test_parse_minimal_with_defaults() {
        let params = ActivityParams::from_toml_str(MINIMAL).unwrap();
        assert_eq!(params.direction_method, DirectionMethod::ByIncreasingId);
        assert_eq!(params.formulation, FormulationSettings::default());
        assert_eq!(params.solver, SolverParams::default());
        assert_eq!(params.min_duration(ActivityCode::Dlnk).unwrap().value(), 30.0);
        let secs = params
            .transition_times
            .lookup(
                TransitionContext::IntraSat,
                ActivityPair::new(ActivityCode::Xlnk, ActivityCode::Xlnk),
                TransitionType::IntraOrbitSameDirection,
            )
            .unwrap();
        assert_eq!(secs.value(), 20.0);
    }

    #[test]
    fn test_unsupported_schema_version_rejected() {
        let content = MINIMAL.replace("\"0.7\"", "\"0.6\"");
        let err = ActivityParams::from_toml_str(&content).unwrap_err();
        let sched = err.downcast_ref::<SchedulingError>().unwrap();
        assert!(matches!(sched, SchedulingError::Configuration { .. }));
    }

    #[test]
    fn test_unknown_direction_method_is_unimplemented() {
        let content = MINIMAL.replace(
            "schema_version = \"0.7\"",
            "schema_version = \"0.7\"\nintra_orbit_neighbor_direction_method = \"by_phase\"",
        );
        let err = ActivityParams::from_toml_str(&content).unwrap_err();
        let sched = err.downcast_ref::<SchedulingError>().unwrap();
        assert!(matches!(sched, SchedulingError::Unimplemented { .. }));
    }

    #[test]
    fn test_unknown_transition_type_rejected() {
        let content = format!("{}\"sideways\" = 5.0\n", MINIMAL);
        assert!(ActivityParams::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_json_layout_accepted() {
        let json = r#"{
            "schema_version": "0.7",
            "transition_time_s": {"inter-sat": {"dlnk-dlnk": {"default": 45.0}}},
            "min_duration_s": {"obs": 10.0},
            "formulation": {"binary_epsilon": 0.2}
        }"#;
        let params = ActivityParams::from_json_str(json).unwrap();
        assert_eq!(params.formulation.binary_epsilon, 0.2);
        assert!(params.min_duration(ActivityCode::Xlnk).is_err());
    }
}
