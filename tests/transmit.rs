use diphmm_rs::hmm::transmit;
use ndarray::{Array2, array};

fn approx_eq(a: f64, b: f64, eps: f64) {
    assert!(
        (a - b).abs() <= eps,
        "expected {a} ~= {b} within eps={eps}, got diff={}",
        (a - b).abs()
    );
}

fn run_transmit(prev: &Array2<f64>, rate: f64) -> Array2<f64> {
    let (n_pat, n_mat) = prev.dim();
    let mut out = Array2::<f64>::zeros((n_pat, n_mat));
    let mut pat = vec![0.0; n_pat];
    let mut mat = vec![0.0; n_mat];
    transmit(prev.view(), rate, out.view_mut(), &mut pat, &mut mat);
    out
}

#[test]
fn four_term_decomposition_on_point_mass() {
    let mut prev = Array2::<f64>::zeros((2, 3));
    prev[(0, 0)] = 1.0;
    let out = run_transmit(&prev, 0.2);

    // no_rec = 0.64, single = 0.16, double = 0.04 / 6
    approx_eq(
        out[(0, 0)],
        0.64 + 0.16 / 2.0 + 0.16 / 3.0 + 0.04 / 6.0,
        1e-12,
    );
    approx_eq(out[(1, 0)], 0.16 / 2.0 + 0.04 / 6.0, 1e-12);
    approx_eq(out[(0, 1)], 0.16 / 3.0 + 0.04 / 6.0, 1e-12);
    approx_eq(out[(0, 2)], 0.16 / 3.0 + 0.04 / 6.0, 1e-12);
    approx_eq(out[(1, 1)], 0.04 / 6.0, 1e-12);
    approx_eq(out[(1, 2)], 0.04 / 6.0, 1e-12);
}

#[test]
fn transmit_preserves_total_mass() {
    let prev = array![[0.05, 0.15, 0.1], [0.3, 0.0, 0.4]];
    for rate in [0.0, 0.01, 0.3, 0.5, 0.9, 1.0] {
        let out = run_transmit(&prev, rate);
        approx_eq(out.sum(), 1.0, 1e-12);
        for v in out.iter() {
            assert!(*v >= 0.0, "negative mass {v} at rate {rate}");
        }
    }
}

#[test]
fn zero_rate_is_identity_and_unit_rate_is_uniform() {
    let prev = array![[0.05, 0.15, 0.1], [0.3, 0.0, 0.4]];
    let same = run_transmit(&prev, 0.0);
    for (a, b) in same.iter().zip(prev.iter()) {
        approx_eq(*a, *b, 1e-15);
    }

    let uniform = run_transmit(&prev, 1.0);
    for v in uniform.iter() {
        approx_eq(*v, 1.0 / 6.0, 1e-12);
    }
}

#[test]
fn marginals_move_independently() {
    // Paternal marginal drifts towards uniform at rate (1-e) per copy,
    // whatever the maternal distribution looks like.
    let prev = array![[0.6, 0.2], [0.1, 0.1], [0.0, 0.0]];
    let e = 0.25;
    let out = run_transmit(&prev, e);
    let pat_in = [0.8, 0.2, 0.0];
    for j in 0..3 {
        let pat_out: f64 = out.row(j).sum();
        approx_eq(pat_out, (1.0 - e) * pat_in[j] + e / 3.0, 1e-12);
    }
    let mat_in = [0.7, 0.3];
    for k in 0..2 {
        let mat_out: f64 = out.column(k).sum();
        approx_eq(mat_out, (1.0 - e) * mat_in[k] + e / 2.0, 1e-12);
    }
}
