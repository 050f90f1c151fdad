use anyhow::{Result, bail};
use ndarray::{Array2, Axis};

pub const MISSING: u8 = 9;

// Probability files carry 4 decimals, so a column can drift by a few 1e-4.
const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Genotypes 0/1/2 with optional phased paternal and maternal alleles;
    /// 9 is missing in both.
    Called {
        genotypes: Vec<u8>,
        haplotypes: Option<[Vec<u8>; 2]>,
    },
    /// `4 × n_loci`, rows (ref/ref, ref-pat/alt-mat, alt-pat/ref-mat, alt/alt).
    Probabilities(Array2<f64>),
}

impl Observation {
    pub fn genotypes(genotypes: Vec<u8>) -> Self {
        Observation::Called {
            genotypes,
            haplotypes: None,
        }
    }

    pub fn phased(genotypes: Vec<u8>, paternal: Vec<u8>, maternal: Vec<u8>) -> Self {
        Observation::Called {
            genotypes,
            haplotypes: Some([paternal, maternal]),
        }
    }

    pub fn n_loci(&self) -> usize {
        match self {
            Observation::Called { genotypes, .. } => genotypes.len(),
            Observation::Probabilities(p) => p.ncols(),
        }
    }

    pub fn validate(&self, n_loci: usize) -> Result<()> {
        match self {
            Observation::Called {
                genotypes,
                haplotypes,
            } => {
                if genotypes.len() != n_loci {
                    bail!(
                        "genotype locus count mismatch: {} genotypes for {n_loci} library loci",
                        genotypes.len()
                    );
                }
                for (i, &g) in genotypes.iter().enumerate() {
                    if g > 2 && g != MISSING {
                        bail!("invalid genotype code {g} at locus {i}; expected 0, 1, 2 or 9");
                    }
                }
                if let Some(haps) = haplotypes {
                    for (e, hap) in haps.iter().enumerate() {
                        check_haplotype(e, hap, n_loci)?;
                    }
                }
            }
            Observation::Probabilities(p) => {
                if p.nrows() != 4 {
                    bail!("genotype probabilities must have 4 rows, got {}", p.nrows());
                }
                if p.ncols() != n_loci {
                    bail!(
                        "genotype probability locus count mismatch: {} columns for {n_loci} loci",
                        p.ncols()
                    );
                }
                for ((s, i), &v) in p.indexed_iter() {
                    if !v.is_finite() || v < 0.0 {
                        bail!("invalid genotype probability {v} for state {s} at locus {i}");
                    }
                }
                for (i, col) in p.axis_iter(Axis(1)).enumerate() {
                    let s = col.sum();
                    if (s - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
                        bail!("genotype probabilities at locus {i} sum to {s}; expected 1");
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_haplotype(e: usize, hap: &[u8], n_loci: usize) -> Result<()> {
    if hap.len() != n_loci {
        bail!(
            "haplotype {e} locus count mismatch: {} alleles for {n_loci} library loci",
            hap.len()
        );
    }
    for (i, &a) in hap.iter().enumerate() {
        if a > 1 && a != MISSING {
            bail!("invalid allele {a} in haplotype {e} at locus {i}; expected 0, 1 or 9");
        }
    }
    Ok(())
}

/// A per-locus rate, either shared by every locus or given explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum Rate {
    Uniform(f64),
    PerLocus(Vec<f64>),
}

impl Rate {
    pub fn expand(&self, n_loci: usize) -> Result<Vec<f64>> {
        match self {
            Rate::Uniform(v) => Ok(vec![*v; n_loci]),
            Rate::PerLocus(vs) => {
                if vs.len() != n_loci {
                    bail!("rate vector has {} values for {n_loci} loci", vs.len());
                }
                Ok(vs.clone())
            }
        }
    }
}

impl From<f64> for Rate {
    fn from(v: f64) -> Self {
        Rate::Uniform(v)
    }
}

impl From<Vec<f64>> for Rate {
    fn from(vs: Vec<f64>) -> Self {
        Rate::PerLocus(vs)
    }
}
