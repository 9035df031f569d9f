use crate::compile::{CompileOptions, Hyperparameters};
use crate::preprocess::{CycleRemoval, NormalizeOptions, SplitMode};
use crate::solver::SolveParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub weights: Hyperparameters,
    pub floorplan: bool,
    pub split: SplitMode,
    /// Seed for the splitter's attachment choices. Entropy when absent.
    pub seed: Option<u64>,
    pub solver: SolveParams,
    pub cycle_removal: CycleRemoval,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weights: Hyperparameters::default(),
            floorplan: false,
            split: SplitMode::None,
            seed: None,
            solver: SolveParams::default(),
            cycle_removal: CycleRemoval::FixedPoint,
        }
    }
}

impl Config {
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            cycle_removal: self.cycle_removal,
        }
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            weights: self.weights,
            floorplan: self.floorplan,
        }
    }
}

/// Weights either as `[area, size, position, adjacency]` or by name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WeightsFile {
    List([f64; 4]),
    Named {
        area: Option<f64>,
        size: Option<f64>,
        position: Option<f64>,
        adjacency: Option<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct SolverConfigFile {
    time_limit_secs: Option<f64>,
    mip_gap: Option<f64>,
    linearization_segments: Option<usize>,
    compute_iis: Option<bool>,
    branch_node_limit: Option<usize>,
    iis_resolve_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    weights: Option<WeightsFile>,
    floorplan: Option<bool>,
    split: Option<SplitMode>,
    seed: Option<u64>,
    solver: Option<SolverConfigFile>,
    cycle_removal: Option<CycleRemoval>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Layers a JSON config document over the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    match parsed.weights {
        Some(WeightsFile::List(list)) => config.weights = Hyperparameters::from(list),
        Some(WeightsFile::Named {
            area,
            size,
            position,
            adjacency,
        }) => {
            if let Some(v) = area {
                config.weights.area = v;
            }
            if let Some(v) = size {
                config.weights.size = v;
            }
            if let Some(v) = position {
                config.weights.position = v;
            }
            if let Some(v) = adjacency {
                config.weights.adjacency = v;
            }
        }
        None => {}
    }

    if let Some(v) = parsed.floorplan {
        config.floorplan = v;
    }
    if let Some(v) = parsed.split {
        config.split = v;
    }
    if parsed.seed.is_some() {
        config.seed = parsed.seed;
    }
    if let Some(v) = parsed.cycle_removal {
        config.cycle_removal = v;
    }

    if let Some(solver) = parsed.solver {
        if let Some(v) = solver.time_limit_secs {
            config.solver.time_limit_secs = v;
        }
        if let Some(v) = solver.mip_gap {
            if !(0.0..=1.0).contains(&v) {
                anyhow::bail!("solver.mip_gap must lie in [0, 1], got {v}");
            }
            config.solver.mip_gap = v;
        }
        if let Some(v) = solver.linearization_segments {
            config.solver.linearization_segments = v.max(1);
        }
        if let Some(v) = solver.compute_iis {
            config.solver.compute_iis = v;
        }
        if let Some(v) = solver.branch_node_limit {
            config.solver.branch_node_limit = v.max(1);
        }
        if let Some(v) = solver.iis_resolve_secs {
            config.solver.iis_resolve_secs = v;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.weights, Hyperparameters::from([0.0, 1.0, 1.0, 1.0]));
        assert_eq!(config.solver.time_limit_secs, 100.0);
        assert_eq!(config.cycle_removal, CycleRemoval::FixedPoint);
    }

    #[test]
    fn partial_document_overrides_only_named_fields() {
        let config = parse_config(
            r#"{ "floorplan": true, "split": "quarter", "solver": { "mip_gap": 0.1 },
                 "weights": { "area": 2.0 } }"#,
        )
        .unwrap();
        assert!(config.floorplan);
        assert_eq!(config.split, SplitMode::Quarter);
        assert_eq!(config.solver.mip_gap, 0.1);
        assert_eq!(config.solver.time_limit_secs, 100.0);
        assert_eq!(config.weights.area, 2.0);
        assert_eq!(config.weights.size, 1.0);
    }

    #[test]
    fn weights_accept_a_list() {
        let config = parse_config(r#"{ "weights": [1, 2, 3, 4], "cycle_removal": "single_pass" }"#).unwrap();
        assert_eq!(config.weights, Hyperparameters::from([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(config.cycle_removal, CycleRemoval::SinglePass);
    }

    #[test]
    fn solver_budgets_are_configurable() {
        let config =
            parse_config(r#"{ "solver": { "branch_node_limit": 0, "iis_resolve_secs": 1.5 } }"#).unwrap();
        assert_eq!(config.solver.branch_node_limit, 1);
        assert_eq!(config.solver.iis_resolve_secs, 1.5);
    }

    #[test]
    fn rejects_out_of_range_gap() {
        assert!(parse_config(r#"{ "solver": { "mip_gap": 3.0 } }"#).is_err());
    }
}
