use diphmm_rs::decode::{call_genotypes, dosages, genotype_probabilities};
use diphmm_rs::sample::new_rng;
use diphmm_rs::{CallingMethod, DiploidHmm, HaplotypeLibrary, HmmOutput, Observation};
use ndarray::{Array2, Array3, array};
use rand::Rng;

fn approx_eq(a: f64, b: f64, eps: f64) {
    assert!(
        (a - b).abs() <= eps,
        "expected {a} ~= {b} within eps={eps}, got diff={}",
        (a - b).abs()
    );
}

fn biallelic_library() -> HaplotypeLibrary {
    HaplotypeLibrary::new(array![[0u8], [1u8]]).expect("library init failed")
}

#[test]
fn classes_keep_parental_origin() {
    let lib = biallelic_library();
    let posterior = Array3::from_shape_vec((1, 2, 2), vec![0.1, 0.2, 0.3, 0.4]).expect("shape");
    let probs = genotype_probabilities(&posterior, &lib, &lib).expect("decode failed");
    assert_eq!(probs.dim(), (4, 1));
    approx_eq(probs[(0, 0)], 0.1, 1e-12);
    approx_eq(probs[(1, 0)], 0.2, 1e-12);
    approx_eq(probs[(2, 0)], 0.3, 1e-12);
    approx_eq(probs[(3, 0)], 0.4, 1e-12);

    let dosage = dosages(&posterior, &lib, &lib).expect("decode failed");
    approx_eq(dosage[0], 0.2 + 0.3 + 2.0 * 0.4, 1e-12);
}

#[test]
fn single_het_locus_gives_unit_dosage() {
    let pat = HaplotypeLibrary::new(array![[0u8]]).expect("library init failed");
    let mat = HaplotypeLibrary::new(array![[1u8]]).expect("library init failed");
    let hmm = DiploidHmm::new(pat, mat, 0.01, 0.0).expect("model init failed");
    let out = hmm
        .run(
            &Observation::genotypes(vec![1]),
            CallingMethod::Dosages,
            &mut new_rng(0),
        )
        .expect("run failed");
    match out {
        HmmOutput::Dosages(d) => approx_eq(d[0], 1.0, 1e-9),
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn dosages_stay_in_range_and_match_class_probabilities() {
    let n_loci = 30;
    let mut rng = new_rng(5);
    let pat = HaplotypeLibrary::new(Array2::from_shape_fn((5, n_loci), |_| rng.gen_range(0..2u8)))
        .expect("library init failed");
    let mat = HaplotypeLibrary::new(Array2::from_shape_fn((4, n_loci), |_| rng.gen_range(0..2u8)))
        .expect("library init failed");
    let genotypes: Vec<u8> = (0..n_loci).map(|_| rng.gen_range(0..3u8)).collect();
    let hmm = DiploidHmm::new(pat, mat, 0.02, 0.05).expect("model init failed");
    let obs = Observation::genotypes(genotypes);

    let posterior = hmm.posterior(&obs).expect("posterior failed");
    let dosage = dosages(&posterior, hmm.paternal(), hmm.maternal()).expect("decode failed");
    let probs = genotype_probabilities(&posterior, hmm.paternal(), hmm.maternal())
        .expect("decode failed");
    for i in 0..n_loci {
        assert!(
            (0.0..=2.0 + 1e-9).contains(&dosage[i]),
            "dosage {} out of range",
            dosage[i]
        );
        approx_eq(probs.column(i).sum(), 1.0, 1e-9);
        approx_eq(
            dosage[i],
            probs[(1, i)] + probs[(2, i)] + 2.0 * probs[(3, i)],
            1e-9,
        );
    }
}

#[test]
fn genotype_calls_merge_hets_and_apply_threshold() {
    let probs = array![
        [0.7, 0.1, 0.3],
        [0.1, 0.3, 0.2],
        [0.1, 0.3, 0.1],
        [0.1, 0.3, 0.4],
    ];
    let calls = call_genotypes(&probs, 0.5).expect("calling failed");
    assert_eq!(calls, vec![0, 1, 9]);

    let calls = call_genotypes(&probs, 0.0).expect("calling failed");
    assert_eq!(calls, vec![0, 1, 2]);
}

#[test]
fn posterior_shape_must_match_libraries() {
    let lib = biallelic_library();
    let posterior = Array3::from_elem((1, 3, 2), 1.0 / 6.0);
    dosages(&posterior, &lib, &lib).expect_err("expected shape mismatch");
}
