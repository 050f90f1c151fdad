use anyhow::{Result, bail};
use ndarray::{Array2, Array3, Axis};

use crate::library::HaplotypeLibrary;
use crate::observation::MISSING;

fn check_posterior(
    posterior: &Array3<f64>,
    paternal: &HaplotypeLibrary,
    maternal: &HaplotypeLibrary,
) -> Result<()> {
    let (n_loci, n_pat, n_mat) = posterior.dim();
    if n_loci != paternal.n_loci() || n_loci != maternal.n_loci() {
        bail!(
            "posterior locus count mismatch: {n_loci} loci for libraries with {} and {}",
            paternal.n_loci(),
            maternal.n_loci()
        );
    }
    if n_pat != paternal.n_haplotypes() || n_mat != maternal.n_haplotypes() {
        bail!(
            "posterior shape ({n_pat}, {n_mat}) does not match libraries ({}, {})",
            paternal.n_haplotypes(),
            maternal.n_haplotypes()
        );
    }
    Ok(())
}

pub fn dosages(
    posterior: &Array3<f64>,
    paternal: &HaplotypeLibrary,
    maternal: &HaplotypeLibrary,
) -> Result<Vec<f64>> {
    check_posterior(posterior, paternal, maternal)?;
    let mut out = Vec::with_capacity(posterior.len_of(Axis(0)));
    for (i, slice) in posterior.axis_iter(Axis(0)).enumerate() {
        let mut dosage = 0.0;
        for ((j, k), &p) in slice.indexed_iter() {
            dosage += p * f64::from(paternal.allele(j, i) + maternal.allele(k, i));
        }
        out.push(dosage);
    }
    Ok(out)
}

// Rows are (0,0), (0,1), (1,0), (1,1); heterozygotes keep their origin.
pub fn genotype_probabilities(
    posterior: &Array3<f64>,
    paternal: &HaplotypeLibrary,
    maternal: &HaplotypeLibrary,
) -> Result<Array2<f64>> {
    check_posterior(posterior, paternal, maternal)?;
    let n_loci = posterior.len_of(Axis(0));
    let mut probs = Array2::<f64>::zeros((4, n_loci));
    for (i, slice) in posterior.axis_iter(Axis(0)).enumerate() {
        for ((j, k), &p) in slice.indexed_iter() {
            let class =
                (usize::from(paternal.allele(j, i)) << 1) | usize::from(maternal.allele(k, i));
            probs[(class, i)] += p;
        }
    }
    Ok(probs)
}

/// Merges the two heterozygous classes and calls the most probable genotype,
/// or `MISSING` when it falls below `threshold`.
pub fn call_genotypes(probs: &Array2<f64>, threshold: f64) -> Result<Vec<u8>> {
    if probs.nrows() != 4 {
        bail!(
            "genotype probabilities must have 4 rows, got {}",
            probs.nrows()
        );
    }
    let mut calls = Vec::with_capacity(probs.ncols());
    for col in probs.columns() {
        let collapsed = [col[0], col[1] + col[2], col[3]];
        let mut best = 0usize;
        for g in 1..3 {
            if collapsed[g] > collapsed[best] {
                best = g;
            }
        }
        if collapsed[best] < threshold {
            calls.push(MISSING);
        } else {
            calls.push(best as u8);
        }
    }
    Ok(calls)
}
