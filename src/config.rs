//! Tunable constants for ranking, strength policy, layout and canvas.
//!
//! Every section deserialises with defaults, so a config file only needs the
//! values it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ranking: RankingConfig,
    pub strength: StrengthConfig,
    pub layout: LayoutConfig,
    pub canvas: CanvasConfig,
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Visible-document budget enforced by a full rerank.
    pub documents_visible: usize,
    /// Fraction of total system strength below which a visible document is pruned.
    pub pruning_threshold: f64,
    /// Minimum candidate strength for regular retrieval.
    pub reg_threshold: f64,
    /// Minimum candidate strength for search-triggered retrieval.
    pub search_threshold: f64,
    pub doc_add_limit: usize,
    pub search_doc_add_limit: usize,
    /// Query cycles a newly admitted document is protected from pruning.
    pub recency_grace: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            documents_visible: 25,
            pruning_threshold: 0.01,
            reg_threshold: 0.5,
            search_threshold: 1.0,
            doc_add_limit: 10,
            search_doc_add_limit: 20,
            recency_grace: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthConfig {
    pub default_entity_strength: f64,
    pub highlight_boost: f64,
    pub link_boost: f64,
    pub search_boost: f64,
}

impl Default for StrengthConfig {
    fn default() -> Self {
        Self {
            default_entity_strength: 1.0,
            highlight_boost: 1.0,
            link_boost: 0.5,
            search_boost: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub max_iterations: u32,
    pub spacing: f32,
    pub node_radius: f32,
    pub max_dist_per_move: f32,
    pub cooling: bool,
    pub cooling_start_delay: u32,
    pub cooling_divider: f32,
    pub cooling_factor_minimum: f32,
    /// Total pixel movement below which the cooling divider starts shrinking.
    pub convergence_threshold: f32,
    /// Total pixel movement below which a run ends early. Kept at or under
    /// `convergence_threshold` so cooling speeds up before the run stops.
    pub convergence_stop_threshold: f32,
    /// Largest velocity component at which the layout counts as stable.
    pub velocity_threshold: f32,
    pub min_iteration_ms: u64,
    pub max_iteration_ms: u64,
    pub initial_sleep_ms: u64,
    /// Weight of an opened node; closed nodes weigh 1.
    pub open_weight: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_iterations: 600,
            spacing: 10.0,
            node_radius: 20.0,
            max_dist_per_move: 20.0,
            cooling: true,
            cooling_start_delay: 50,
            cooling_divider: 400.0,
            cooling_factor_minimum: 0.02,
            convergence_threshold: 40.0,
            convergence_stop_threshold: 10.0,
            velocity_threshold: 0.5,
            min_iteration_ms: 10,
            max_iteration_ms: 65,
            initial_sleep_ms: 20,
            open_weight: 4.0,
        }
    }
}

impl LayoutConfig {
    pub fn min_iteration_time(&self) -> Duration {
        Duration::from_millis(self.min_iteration_ms)
    }

    pub fn max_iteration_time(&self) -> Duration {
        Duration::from_millis(self.max_iteration_ms.max(self.min_iteration_ms))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f32,
    pub height: f32,
    pub closed_size: [f32; 2],
    pub open_size: [f32; 2],
    /// Fixed seed for node placement; random when absent.
    pub seed: Option<u64>,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 1000.0,
            closed_size: [40.0, 40.0],
            open_size: [320.0, 240.0],
            seed: None,
        }
    }
}
