use anyhow::{Result, bail};
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayViewMut2, Axis};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::library::HaplotypeLibrary;
use crate::utils::slice_sum;

pub fn new_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

/// Conditions the forward estimate at one locus on the pair already drawn at
/// the next locus.
pub fn combine_backward_sampled_value(
    forward_i: ArrayView2<f64>,
    pat_hap: usize,
    mat_hap: usize,
    recombination_rate: f64,
    mut output: ArrayViewMut2<f64>,
) {
    let (n_pat, n_mat) = forward_i.dim();
    let e = recombination_rate;
    let no_rec = (1.0 - e) * (1.0 - e);
    let single_rec = (1.0 - e) * e;
    let double_rec = e * e;

    output.fill(double_rec / (n_pat * n_mat) as f64);
    // Maternal switch: the paternal source stays on pat_hap.
    for k in 0..n_mat {
        output[(pat_hap, k)] += single_rec / n_mat as f64;
    }
    // Paternal switch: the maternal source stays on mat_hap.
    for j in 0..n_pat {
        output[(j, mat_hap)] += single_rec / n_pat as f64;
    }
    output[(pat_hap, mat_hap)] += no_rec;

    output *= &forward_i;
}

// Weights need not be normalized.
pub fn multinomial_sample_2d<R: Rng + ?Sized>(
    pvals: ArrayView2<f64>,
    rng: &mut R,
) -> Result<(usize, usize)> {
    let total = slice_sum(pvals);
    if total <= 0.0 || !total.is_finite() {
        bail!("cannot sample from weights summing to {total}");
    }
    let target = rng.gen_range(0.0..total);
    let mut acc = 0.0;
    let mut last_positive = None;
    for ((j, k), &w) in pvals.indexed_iter() {
        if w <= 0.0 {
            continue;
        }
        acc += w;
        if target < acc {
            return Ok((j, k));
        }
        last_positive = Some((j, k));
    }
    // Rounding can leave target just past the final partial sum.
    last_positive.ok_or_else(|| anyhow::anyhow!("no positive weight to sample"))
}

pub fn diploid_one_sample<R: Rng + ?Sized>(
    forward_probs: &Array3<f64>,
    recombination: &[f64],
    rng: &mut R,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let (n_loci, n_pat, n_mat) = forward_probs.dim();
    if n_loci == 0 {
        bail!("forward estimates contain no loci");
    }
    if recombination.len() != n_loci {
        bail!(
            "recombination rate locus count mismatch: {} rates for {n_loci} loci",
            recombination.len()
        );
    }

    let mut pvals = Array2::<f64>::zeros((n_pat, n_mat));
    let mut paternal_indices = vec![0usize; n_loci];
    let mut maternal_indices = vec![0usize; n_loci];
    for i in (0..n_loci).rev() {
        let forward_i = forward_probs.index_axis(Axis(0), i);
        if i == n_loci - 1 {
            pvals.assign(&forward_i);
        } else {
            combine_backward_sampled_value(
                forward_i,
                paternal_indices[i + 1],
                maternal_indices[i + 1],
                recombination[i + 1],
                pvals.view_mut(),
            );
        }
        let (j, k) = multinomial_sample_2d(pvals.view(), rng)?;
        paternal_indices[i] = j;
        maternal_indices[i] = k;
    }
    Ok((paternal_indices, maternal_indices))
}

pub fn diploid_sample_haplotypes<R: Rng + ?Sized>(
    forward_probs: &Array3<f64>,
    recombination: &[f64],
    paternal: &HaplotypeLibrary,
    maternal: &HaplotypeLibrary,
    rng: &mut R,
) -> Result<Array2<u8>> {
    let (_, n_pat, n_mat) = forward_probs.dim();
    if n_pat != paternal.n_haplotypes() || n_mat != maternal.n_haplotypes() {
        bail!(
            "forward shape ({n_pat}, {n_mat}) does not match libraries ({}, {})",
            paternal.n_haplotypes(),
            maternal.n_haplotypes()
        );
    }
    let (pat_idx, mat_idx) = diploid_one_sample(forward_probs, recombination, rng)?;
    let n_loci = pat_idx.len();
    let mut haplotypes = Array2::<u8>::zeros((2, n_loci));
    haplotypes
        .row_mut(0)
        .assign(&Array1::from(paternal.mosaic(&pat_idx)?));
    haplotypes
        .row_mut(1)
        .assign(&Array1::from(maternal.mosaic(&mat_idx)?));
    Ok(haplotypes)
}
