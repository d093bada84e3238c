use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::schema::Feature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn factor(self) -> f64 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: Feature,
    pub weight: f64,
    pub sign: Sign,
}

impl FeatureWeight {
    /// Weight with the sign folded in.
    pub fn signed(&self) -> f64 {
        self.weight * self.sign.factor()
    }
}

/// Versioned composite definition consumed by the rating engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingWeights {
    pub version: u32,
    pub name: String,
    /// A season lacking any of these columns is not rated.
    #[serde(default)]
    pub required: Vec<Feature>,
    pub weights: Vec<FeatureWeight>,
}

impl RatingWeights {
    pub fn from_json(raw: &str) -> Result<Self> {
        let weights: RatingWeights = serde_json::from_str(raw)?;
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        if self.weights.is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "weight table {} has no features",
                self.name
            )));
        }
        let mut seen = BTreeSet::new();
        for w in &self.weights {
            if !seen.insert(w.feature) {
                return Err(PipelineError::InvalidConfig(format!(
                    "feature {} listed twice in weight table {}",
                    w.feature.column(),
                    self.name
                )));
            }
            if !w.weight.is_finite() || w.weight < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "weight for {} must be finite and non-negative, got {}",
                    w.feature.column(),
                    w.weight
                )));
            }
        }
        Ok(())
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }
}

static DEFAULT_WEIGHTS: OnceCell<RatingWeights> = OnceCell::new();

/// Weight table embedded in the binary.
pub fn default_weights() -> Result<&'static RatingWeights> {
    DEFAULT_WEIGHTS.get_or_try_init(|| {
        RatingWeights::from_json(include_str!("../assets/rating_weights_v1.json"))
    })
}

pub fn load_weights_file(path: &Path) -> Result<RatingWeights> {
    let raw = fs::read_to_string(path)?;
    RatingWeights::from_json(&raw)
}

/// `RATING_WEIGHTS_PATH` when set, otherwise the embedded table.
pub fn load_rating_weights() -> Result<RatingWeights> {
    match weights_path_override() {
        Some(path) => load_weights_file(&path),
        None => default_weights().cloned(),
    }
}

fn weights_path_override() -> Option<PathBuf> {
    env::var("RATING_WEIGHTS_PATH")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}
