//! Output label mapping for sequence-classification models.
//!
//! Hugging Face exports carry an `id2label` table in `config.json`. SST-2
//! sentiment models map index 0 to `NEGATIVE` and index 1 to `POSITIVE`, which
//! is also the fallback when no config is shipped with the model.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use sentiscope_core::RawOutput;
use sentiscope_core::sentiment::{NEGATIVE, POSITIVE};
use serde::Deserialize;

/// Class index → uppercase label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    labels: Vec<String>,
}

#[derive(Deserialize)]
struct ModelConfig {
    #[serde(default)]
    id2label: BTreeMap<String, String>,
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::sst2()
    }
}

impl LabelMap {
    /// Binary SST-2 layout: `[NEGATIVE, POSITIVE]`.
    pub fn sst2() -> Self {
        Self {
            labels: vec![NEGATIVE.to_string(), POSITIVE.to_string()],
        }
    }

    /// Parse the `id2label` table of a model `config.json`.
    ///
    /// Missing or empty tables fall back to [`LabelMap::sst2`].
    pub fn from_config_json(json: &str) -> anyhow::Result<Self> {
        let config: ModelConfig = serde_json::from_str(json).context("parse model config")?;
        if config.id2label.is_empty() {
            return Ok(Self::sst2());
        }

        let mut indexed = Vec::with_capacity(config.id2label.len());
        for (id, label) in config.id2label {
            let idx: usize = id
                .parse()
                .with_context(|| format!("id2label key {id:?} is not an index"))?;
            indexed.push((idx, label.to_ascii_uppercase()));
        }
        indexed.sort_by_key(|(idx, _)| *idx);

        for (expected, (idx, _)) in indexed.iter().enumerate() {
            anyhow::ensure!(*idx == expected, "id2label indices are not contiguous");
        }

        Ok(Self {
            labels: indexed.into_iter().map(|(_, label)| label).collect(),
        })
    }

    /// Load from `<model_dir>/config.json`, or SST-2 defaults if absent.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let path = model_dir.join("config.json");
        if !path.exists() {
            return Ok(Self::sst2());
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_config_json(&json)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Turn one row of logits into the most probable label and its probability.
    pub fn pick(&self, logits: &[f32]) -> anyhow::Result<RawOutput> {
        anyhow::ensure!(
            logits.len() == self.labels.len(),
            "model produced {} logits for {} labels",
            logits.len(),
            self.labels.len()
        );

        let probs = softmax(logits);
        let (best, score) = probs
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| anyhow::anyhow!("model produced no logits"))?;

        Ok(RawOutput::new(self.labels[best].clone(), score))
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}
