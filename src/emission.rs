use anyhow::{Result, bail};
use ndarray::{Array2, Array3, Axis};

use crate::library::HaplotypeLibrary;
use crate::observation::{MISSING, Observation};

fn check_shapes(
    n_loci: usize,
    paternal: &HaplotypeLibrary,
    maternal: &HaplotypeLibrary,
    error: &[f64],
) -> Result<()> {
    if paternal.n_loci() != maternal.n_loci() {
        bail!(
            "library locus count mismatch: paternal has {}, maternal has {}",
            paternal.n_loci(),
            maternal.n_loci()
        );
    }
    if n_loci != paternal.n_loci() {
        bail!(
            "observation locus count mismatch: {n_loci} observed loci for {} library loci",
            paternal.n_loci()
        );
    }
    if error.len() != n_loci {
        bail!(
            "error rate locus count mismatch: {} rates for {n_loci} loci",
            error.len()
        );
    }
    Ok(())
}

pub fn point_estimates(
    obs: &Observation,
    paternal: &HaplotypeLibrary,
    maternal: &HaplotypeLibrary,
    error: &[f64],
) -> Result<Array3<f64>> {
    obs.validate(paternal.n_loci())?;
    match obs {
        Observation::Called {
            genotypes,
            haplotypes,
        } => point_estimates_called(genotypes, haplotypes.as_ref(), paternal, maternal, error),
        Observation::Probabilities(p) => point_estimates_probs(p, paternal, maternal, error),
    }
}

// Unphased loci compare allele counts only, with `e²` as the lumped mismatch
// weight.
pub fn point_estimates_called(
    genotypes: &[u8],
    haplotypes: Option<&[Vec<u8>; 2]>,
    paternal: &HaplotypeLibrary,
    maternal: &HaplotypeLibrary,
    error: &[f64],
) -> Result<Array3<f64>> {
    let n_loci = genotypes.len();
    check_shapes(n_loci, paternal, maternal, error)?;
    if let Some(haps) = haplotypes
        && (haps[0].len() != n_loci || haps[1].len() != n_loci)
    {
        bail!("phased haplotype locus count mismatch");
    }
    let n_pat = paternal.n_haplotypes();
    let n_mat = maternal.n_haplotypes();

    let mut point = Array3::from_elem((n_loci, n_pat, n_mat), 1.0f64);
    for (i, mut slice) in point.axis_iter_mut(Axis(0)).enumerate() {
        let geno = genotypes[i];
        if geno == MISSING {
            continue;
        }
        let e = error[i];
        let phase = haplotypes
            .map(|h| (h[0][i], h[1][i]))
            .filter(|&(p, m)| p != MISSING && m != MISSING);

        match phase {
            Some((obs_pat, obs_mat)) => {
                for j in 0..n_pat {
                    let w_pat = if paternal.allele(j, i) == obs_pat { 1.0 - e } else { e };
                    for k in 0..n_mat {
                        let w_mat = if maternal.allele(k, i) == obs_mat { 1.0 - e } else { e };
                        slice[(j, k)] = w_pat * w_mat;
                    }
                }
            }
            None => {
                let e2 = e * e;
                for j in 0..n_pat {
                    let a_pat = paternal.allele(j, i);
                    for k in 0..n_mat {
                        let source_geno = a_pat + maternal.allele(k, i);
                        slice[(j, k)] = if source_geno == geno { 1.0 - e2 } else { e2 };
                    }
                }
            }
        }
    }
    Ok(point)
}

pub fn point_estimates_probs(
    probs: &Array2<f64>,
    paternal: &HaplotypeLibrary,
    maternal: &HaplotypeLibrary,
    error: &[f64],
) -> Result<Array3<f64>> {
    if probs.nrows() != 4 {
        bail!(
            "genotype probabilities must have 4 rows, got {}",
            probs.nrows()
        );
    }
    let n_loci = probs.ncols();
    check_shapes(n_loci, paternal, maternal, error)?;
    let n_pat = paternal.n_haplotypes();
    let n_mat = maternal.n_haplotypes();

    let mut point = Array3::<f64>::zeros((n_loci, n_pat, n_mat));
    for (i, mut slice) in point.axis_iter_mut(Axis(0)).enumerate() {
        let e = error[i];
        let by_mismatch = [(1.0 - e) * (1.0 - e), e * (1.0 - e), e * e];
        // Weight of a source pair depends only on its two alleles.
        let mut by_pair = [0.0f64; 4];
        for (pair, w) in by_pair.iter_mut().enumerate() {
            let (pat, mat) = (pair >> 1, pair & 1);
            for state in 0..4 {
                let mismatches = usize::from(pat != (state >> 1)) + usize::from(mat != (state & 1));
                *w += probs[(state, i)] * by_mismatch[mismatches];
            }
        }
        for j in 0..n_pat {
            let a_pat = paternal.allele(j, i) as usize;
            for k in 0..n_mat {
                let a_mat = maternal.allele(k, i) as usize;
                slice[(j, k)] = by_pair[(a_pat << 1) | a_mat];
            }
        }
    }
    Ok(point)
}

pub fn apply_prior(point: &mut Array3<f64>, prior: &Array2<f64>) -> Result<()> {
    let (_, n_pat, n_mat) = point.dim();
    if prior.dim() != (n_pat, n_mat) {
        bail!(
            "prior shape {:?} does not match ({n_pat}, {n_mat}) source pairs",
            prior.dim()
        );
    }
    for mut slice in point.axis_iter_mut(Axis(0)) {
        slice *= prior;
    }
    Ok(())
}
