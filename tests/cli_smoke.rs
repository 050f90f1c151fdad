use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_path(prefix: &str, ext: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time is before unix epoch")
        .as_nanos();
    path.push(format!("{prefix}_{}_{}.{}", std::process::id(), nanos, ext));
    path
}

fn find_diphmm_binary() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_diphmm") {
        return PathBuf::from(path);
    }

    let current = std::env::current_exe().expect("failed to get current exe path");
    let deps_dir = current
        .parent()
        .expect("failed to get deps dir from current exe")
        .to_path_buf();
    let debug_dir = deps_dir
        .parent()
        .expect("failed to get debug dir from deps dir")
        .to_path_buf();

    let direct = debug_dir.join("diphmm");
    if direct.exists() {
        return direct;
    }
    panic!("failed to find diphmm binary in CARGO_BIN_EXE_diphmm or target/debug");
}

struct Inputs {
    genotypes: PathBuf,
    paternal: PathBuf,
    maternal: PathBuf,
}

impl Inputs {
    fn write(tag: &str) -> Self {
        let genotypes = unique_temp_path(&format!("diphmm_cli_{tag}_geno"), "txt");
        let paternal = unique_temp_path(&format!("diphmm_cli_{tag}_pat"), "txt");
        let maternal = unique_temp_path(&format!("diphmm_cli_{tag}_mat"), "txt");
        fs::write(&genotypes, "ind1 0 1 2 1 0\nind2 2 2 9 1 1\n")
            .expect("failed to write genotypes");
        fs::write(&paternal, "p1 0 0 1 1 0\np2 1 1 1 0 1\n")
            .expect("failed to write paternal panel");
        fs::write(&maternal, "m1 0 1 1 0 0\nm2 1 1 0 1 0\n")
            .expect("failed to write maternal panel");
        Self {
            genotypes,
            paternal,
            maternal,
        }
    }

    fn command(&self, output: &PathBuf) -> Command {
        let mut cmd = Command::new(find_diphmm_binary());
        cmd.arg(&self.genotypes)
            .arg(&self.paternal)
            .arg(&self.maternal)
            .arg(output)
            .arg("--no-progress");
        cmd
    }

    fn cleanup(self) {
        let _ = fs::remove_file(self.genotypes);
        let _ = fs::remove_file(self.paternal);
        let _ = fs::remove_file(self.maternal);
    }
}

#[test]
fn cli_writes_dosages() {
    let inputs = Inputs::write("dosage");
    let output = unique_temp_path("diphmm_cli_dosage_out", "txt");

    let status = inputs
        .command(&output)
        .status()
        .expect("failed to run diphmm binary");
    assert!(status.success(), "diphmm exited with non-zero status");

    let text = fs::read_to_string(&output).expect("failed to read dosage output");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    for (line, id) in lines.iter().zip(["ind1", "ind2"]) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields[0], id);
        assert_eq!(fields.len(), 6);
        for f in &fields[1..] {
            let v: f64 = f.parse().expect("dosage is not a number");
            assert!((0.0..=2.0).contains(&v), "dosage {v} out of range");
        }
    }

    inputs.cleanup();
    let _ = fs::remove_file(output);
}

#[test]
fn cli_rejects_unimplemented_method() {
    let inputs = Inputs::write("viterbi");
    let output = unique_temp_path("diphmm_cli_viterbi_out", "txt");

    let result = inputs
        .command(&output)
        .arg("--method")
        .arg("viterbi")
        .output()
        .expect("failed to run diphmm binary");
    assert!(!result.status.success(), "viterbi should not be accepted");
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("viterbi not yet implemented"), "{stderr}");
    assert!(!output.exists(), "no output should be written");

    inputs.cleanup();
}

#[test]
fn cli_sample_saves_effective_params() {
    let inputs = Inputs::write("sample");
    let output = unique_temp_path("diphmm_cli_sample_out", "txt");
    let params = unique_temp_path("diphmm_cli_sample_params", "json");

    let status = inputs
        .command(&output)
        .args(["--method", "sample", "--seed", "7", "--error", "0.05"])
        .arg("--save-params")
        .arg(&params)
        .status()
        .expect("failed to run diphmm binary");
    assert!(status.success(), "diphmm exited with non-zero status");

    let text = fs::read_to_string(&output).expect("failed to read sampled haplotypes");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("ind1 ") && lines[1].starts_with("ind1 "));
    assert!(lines[2].starts_with("ind2 ") && lines[3].starts_with("ind2 "));
    for line in &lines {
        assert!(line.split_whitespace().skip(1).all(|a| a == "0" || a == "1"));
    }

    let json = fs::read_to_string(&params).expect("failed to read params json");
    let v: Value = serde_json::from_str(&json).expect("params json is invalid");
    assert_eq!(v["method"], "sample");
    assert_eq!(v["seed"], 7);
    assert_eq!(v["error"], 0.05);

    inputs.cleanup();
    let _ = fs::remove_file(output);
    let _ = fs::remove_file(params);
}

#[test]
fn cli_writes_probabilities_and_calls() {
    let inputs = Inputs::write("calls");
    let output = unique_temp_path("diphmm_cli_calls_probs", "txt");
    let called = unique_temp_path("diphmm_cli_calls_geno", "txt");

    let status = inputs
        .command(&output)
        .args(["--method", "probabilities", "--call-threshold", "0.0"])
        .arg("--called-out")
        .arg(&called)
        .status()
        .expect("failed to run diphmm binary");
    assert!(status.success(), "diphmm exited with non-zero status");

    let probs = fs::read_to_string(&output).expect("failed to read probabilities");
    assert_eq!(probs.lines().count(), 8);

    let calls = fs::read_to_string(&called).expect("failed to read called genotypes");
    let lines: Vec<&str> = calls.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields.len(), 6);
        assert!(fields[1..].iter().all(|g| ["0", "1", "2"].contains(g)));
    }

    inputs.cleanup();
    let _ = fs::remove_file(output);
    let _ = fs::remove_file(called);
}
