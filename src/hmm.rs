use anyhow::{Result, bail};
use ndarray::{Array2, Array3, ArrayView2, ArrayViewMut2, Axis};

use crate::utils::slice_sum;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForwardStorage {
    #[default]
    Fresh,
    /// Overwrite the point estimates. Locus `i` only reads the finished
    /// estimate at `i - 1` before its own slice is replaced, so each emission
    /// slice is still intact when it is consumed.
    InPlace,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    pat: Vec<f64>,
    mat: Vec<f64>,
    slice: Array2<f64>,
}

impl Workspace {
    pub fn new(n_pat: usize, n_mat: usize) -> Self {
        Self {
            pat: vec![0.0; n_pat],
            mat: vec![0.0; n_mat],
            slice: Array2::zeros((n_pat, n_mat)),
        }
    }

    fn check(&self, n_pat: usize, n_mat: usize) -> Result<()> {
        if self.pat.len() != n_pat || self.mat.len() != n_mat {
            bail!(
                "workspace sized for ({}, {}) but tensor has ({n_pat}, {n_mat}) source pairs",
                self.pat.len(),
                self.mat.len()
            );
        }
        Ok(())
    }
}

fn check_rates(n_loci: usize, recombination: &[f64]) -> Result<()> {
    if n_loci == 0 {
        bail!("point estimates contain no loci");
    }
    if recombination.len() != n_loci {
        bail!(
            "recombination rate locus count mismatch: {} rates for {n_loci} loci",
            recombination.len()
        );
    }
    Ok(())
}

pub fn normalize(mut slice: ArrayViewMut2<f64>, locus: usize) -> Result<()> {
    let sum = slice_sum(slice.view());
    if sum <= 0.0 || !sum.is_finite() {
        bail!("normalization factor is zero at locus {locus} (sum = {sum})");
    }
    slice /= sum;
    Ok(())
}

// Each parental source keeps its haplotype with probability `1-e` or redraws
// it uniformly. The output is not renormalized.
pub fn transmit(
    previous: ArrayView2<f64>,
    recombination_rate: f64,
    mut output: ArrayViewMut2<f64>,
    pat: &mut [f64],
    mat: &mut [f64],
) {
    let (n_pat, n_mat) = previous.dim();

    pat.fill(0.0);
    mat.fill(0.0);
    for ((j, k), &v) in previous.indexed_iter() {
        pat[j] += v;
        mat[k] += v;
    }

    let e = recombination_rate;
    let no_rec = (1.0 - e) * (1.0 - e);
    let single_rec = (1.0 - e) * e;
    let double_rec = e * e / (n_pat * n_mat) as f64;

    // pat[j] now weights a maternal switch, mat[k] a paternal switch.
    for p in pat.iter_mut() {
        *p *= single_rec / n_mat as f64;
    }
    for m in mat.iter_mut() {
        *m *= single_rec / n_pat as f64;
    }

    for j in 0..n_pat {
        for k in 0..n_mat {
            output[(j, k)] = previous[(j, k)] * no_rec + mat[k] + pat[j] + double_rec;
        }
    }
}

pub fn forward_in_place(
    combined: &mut Array3<f64>,
    recombination: &[f64],
    ws: &mut Workspace,
) -> Result<()> {
    let (n_loci, n_pat, n_mat) = combined.dim();
    check_rates(n_loci, recombination)?;
    ws.check(n_pat, n_mat)?;

    normalize(combined.index_axis_mut(Axis(0), 0), 0)?;
    for i in 1..n_loci {
        transmit(
            combined.index_axis(Axis(0), i - 1),
            recombination[i],
            ws.slice.view_mut(),
            &mut ws.pat,
            &mut ws.mat,
        );
        let mut current = combined.index_axis_mut(Axis(0), i);
        current *= &ws.slice;
        normalize(current, i)?;
    }
    Ok(())
}

pub fn forward(point_estimate: &Array3<f64>, recombination: &[f64]) -> Result<Array3<f64>> {
    let (_, n_pat, n_mat) = point_estimate.dim();
    let mut combined = point_estimate.clone();
    let mut ws = Workspace::new(n_pat, n_mat);
    forward_in_place(&mut combined, recombination, &mut ws)?;
    Ok(combined)
}

// Slice `i` only carries information from loci after `i`.
pub fn backward(
    point_estimate: &Array3<f64>,
    recombination: &[f64],
    ws: &mut Workspace,
) -> Result<Array3<f64>> {
    let (n_loci, n_pat, n_mat) = point_estimate.dim();
    check_rates(n_loci, recombination)?;
    ws.check(n_pat, n_mat)?;

    let mut backward = Array3::from_elem((n_loci, n_pat, n_mat), 1.0f64);
    for i in (0..n_loci - 1).rev() {
        ws.slice.assign(&backward.index_axis(Axis(0), i + 1));
        ws.slice *= &point_estimate.index_axis(Axis(0), i + 1);
        normalize(ws.slice.view_mut(), i + 1)?;
        transmit(
            ws.slice.view(),
            recombination[i],
            backward.index_axis_mut(Axis(0), i),
            &mut ws.pat,
            &mut ws.mat,
        );
    }
    Ok(backward)
}

pub fn forward_backward(
    point_estimate: &mut Array3<f64>,
    recombination: &[f64],
    storage: ForwardStorage,
) -> Result<Array3<f64>> {
    let (n_loci, n_pat, n_mat) = point_estimate.dim();
    let mut ws = Workspace::new(n_pat, n_mat);

    let mut est = backward(point_estimate, recombination, &mut ws)?;
    match storage {
        ForwardStorage::InPlace => {
            forward_in_place(point_estimate, recombination, &mut ws)?;
            est *= &*point_estimate;
        }
        ForwardStorage::Fresh => {
            let mut combined = point_estimate.clone();
            forward_in_place(&mut combined, recombination, &mut ws)?;
            est *= &combined;
        }
    }
    for i in 0..n_loci {
        normalize(est.index_axis_mut(Axis(0), i), i)?;
    }
    log::debug!("forward-backward finished over {n_loci} loci and {n_pat}x{n_mat} source pairs");
    Ok(est)
}
