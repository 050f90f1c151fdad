use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::model::CallingMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmmParamsFile {
    pub error: f64,
    pub recombination_rate: f64,
    #[serde(default)]
    pub method: CallingMethod,
    #[serde(default)]
    pub seed: u64,
}

impl Default for HmmParamsFile {
    fn default() -> Self {
        Self {
            error: 0.01,
            recombination_rate: 1e-3,
            method: CallingMethod::Dosages,
            seed: 0,
        }
    }
}

impl HmmParamsFile {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.error) {
            bail!("error must be in [0, 1), got {}", self.error);
        }
        if !(0.0..=1.0).contains(&self.recombination_rate) {
            bail!(
                "recombination_rate must be in [0, 1], got {}",
                self.recombination_rate
            );
        }
        Ok(())
    }
}

pub fn save_params(path: &Path, params: &HmmParamsFile) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, params)
        .with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

pub fn load_params(path: &Path) -> Result<HmmParamsFile> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let reader = BufReader::new(file);
    let params: HmmParamsFile =
        serde_json::from_reader(reader).with_context(|| format!("failed to parse {:?}", path))?;
    params.validate()?;
    Ok(params)
}
