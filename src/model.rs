use anyhow::{Result, bail};
use clap::ValueEnum;
use ndarray::{Array2, Array3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::decode::{dosages, genotype_probabilities};
use crate::emission::{apply_prior, point_estimates};
use crate::hmm::{ForwardStorage, forward, forward_backward};
use crate::library::HaplotypeLibrary;
use crate::observation::{Observation, Rate};
use crate::sample::diploid_sample_haplotypes;
use crate::utils::{check_error_rates, check_recombination_rates};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallingMethod {
    #[default]
    Dosages,
    Probabilities,
    Sample,
    Callhaps,
    Viterbi,
}

/// The calling methods that have a decoder.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Decoder {
    Dosages,
    Probabilities,
    Sample,
}

impl CallingMethod {
    pub fn name(self) -> &'static str {
        match self {
            CallingMethod::Dosages => "dosages",
            CallingMethod::Probabilities => "probabilities",
            CallingMethod::Sample => "sample",
            CallingMethod::Callhaps => "callhaps",
            CallingMethod::Viterbi => "viterbi",
        }
    }

    pub fn decoder(self) -> Result<Decoder> {
        match self {
            CallingMethod::Dosages => Ok(Decoder::Dosages),
            CallingMethod::Probabilities => Ok(Decoder::Probabilities),
            CallingMethod::Sample => Ok(Decoder::Sample),
            CallingMethod::Callhaps | CallingMethod::Viterbi => {
                bail!("{} not yet implemented", self.name())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HmmOutput {
    Dosages(Vec<f64>),
    /// `4 × n_loci` (paternal, maternal) allele-class probabilities.
    Probabilities(Array2<f64>),
    /// `2 × n_loci`, paternal row first.
    Haplotypes(Array2<u8>),
}

// Each call allocates its own tensors, so one model can serve many
// individuals from rayon workers.
#[derive(Debug, Clone)]
pub struct DiploidHmm {
    paternal: HaplotypeLibrary,
    maternal: HaplotypeLibrary,
    error: Vec<f64>,
    recombination: Vec<f64>,
    prior: Option<Array2<f64>>,
}

impl DiploidHmm {
    pub fn new(
        paternal: HaplotypeLibrary,
        maternal: HaplotypeLibrary,
        error: impl Into<Rate>,
        recombination: impl Into<Rate>,
    ) -> Result<Self> {
        if paternal.n_loci() != maternal.n_loci() {
            bail!(
                "library locus count mismatch: paternal has {}, maternal has {}",
                paternal.n_loci(),
                maternal.n_loci()
            );
        }
        let n_loci = paternal.n_loci();
        let error = error.into().expand(n_loci)?;
        let recombination = recombination.into().expand(n_loci)?;
        check_error_rates(&error)?;
        check_recombination_rates(&recombination)?;
        Ok(Self {
            paternal,
            maternal,
            error,
            recombination,
            prior: None,
        })
    }

    pub fn with_prior(mut self, prior: Array2<f64>) -> Result<Self> {
        let shape = (self.paternal.n_haplotypes(), self.maternal.n_haplotypes());
        if prior.dim() != shape {
            bail!(
                "prior shape {:?} does not match {:?} source pairs",
                prior.dim(),
                shape
            );
        }
        if prior.iter().any(|v| !v.is_finite() || *v < 0.0) {
            bail!("prior weights must be finite and non-negative");
        }
        self.prior = Some(prior);
        Ok(self)
    }

    pub fn n_loci(&self) -> usize {
        self.paternal.n_loci()
    }

    pub fn paternal(&self) -> &HaplotypeLibrary {
        &self.paternal
    }

    pub fn maternal(&self) -> &HaplotypeLibrary {
        &self.maternal
    }

    pub fn error(&self) -> &[f64] {
        &self.error
    }

    pub fn recombination(&self) -> &[f64] {
        &self.recombination
    }

    pub fn point_estimates(&self, obs: &Observation) -> Result<Array3<f64>> {
        let mut point = point_estimates(obs, &self.paternal, &self.maternal, &self.error)?;
        if let Some(prior) = &self.prior {
            apply_prior(&mut point, prior)?;
        }
        Ok(point)
    }

    pub fn posterior(&self, obs: &Observation) -> Result<Array3<f64>> {
        let mut point = self.point_estimates(obs)?;
        forward_backward(&mut point, &self.recombination, ForwardStorage::InPlace)
    }

    pub fn sample_haplotypes<R: Rng + ?Sized>(
        &self,
        obs: &Observation,
        rng: &mut R,
    ) -> Result<Array2<u8>> {
        let point = self.point_estimates(obs)?;
        let combined = forward(&point, &self.recombination)?;
        diploid_sample_haplotypes(
            &combined,
            &self.recombination,
            &self.paternal,
            &self.maternal,
            rng,
        )
    }

    /// `rng` is only drawn from by [`CallingMethod::Sample`].
    pub fn run<R: Rng + ?Sized>(
        &self,
        obs: &Observation,
        method: CallingMethod,
        rng: &mut R,
    ) -> Result<HmmOutput> {
        match method.decoder()? {
            Decoder::Dosages => {
                let posterior = self.posterior(obs)?;
                Ok(HmmOutput::Dosages(dosages(
                    &posterior,
                    &self.paternal,
                    &self.maternal,
                )?))
            }
            Decoder::Probabilities => {
                let posterior = self.posterior(obs)?;
                Ok(HmmOutput::Probabilities(genotype_probabilities(
                    &posterior,
                    &self.paternal,
                    &self.maternal,
                )?))
            }
            Decoder::Sample => Ok(HmmOutput::Haplotypes(self.sample_haplotypes(obs, rng)?)),
        }
    }
}
