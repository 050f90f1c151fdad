use anyhow::{Result, bail};
use ndarray::ArrayView2;

pub fn check_error_rates(error: &[f64]) -> Result<()> {
    for (i, &e) in error.iter().enumerate() {
        if !e.is_finite() || !(0.0..1.0).contains(&e) {
            bail!("error rate {e} at locus {i} must be in [0, 1)");
        }
    }
    Ok(())
}

pub fn check_recombination_rates(rates: &[f64]) -> Result<()> {
    for (i, &r) in rates.iter().enumerate() {
        if !r.is_finite() || !(0.0..=1.0).contains(&r) {
            bail!("recombination rate {r} at locus {i} must be in [0, 1]");
        }
    }
    Ok(())
}

#[inline]
pub fn slice_sum(slice: ArrayView2<f64>) -> f64 {
    let mut sum = 0.0;
    for v in slice.iter() {
        sum += *v;
    }
    sum
}
