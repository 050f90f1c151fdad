use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;

use diphmm_rs::decode::call_genotypes;
use diphmm_rs::io::alphaimpute::{
    LocusWindow, read_genotype_probabilities, read_genotypes, read_phase, read_reference_panel,
    write_dosages, write_genotype_probabilities, write_genotypes, write_phase,
};
use diphmm_rs::io::params::{HmmParamsFile, load_params, save_params};
use diphmm_rs::progress;
use diphmm_rs::sample::new_rng;
use diphmm_rs::{CallingMethod, Decoder, DiploidHmm, HmmOutput, Observation};

#[derive(Parser, Debug)]
#[command(name = "diphmm")]
#[command(
    about = "Estimate paternal/maternal haplotype sources for genotyped individuals",
    long_about = None
)]
struct Cli {
    /// Genotype file (id followed by 0/1/2/9 per locus), or a 4-line-per-individual
    /// probability file with --probabilities
    genotypes: PathBuf,
    /// Paternal reference panel, one haplotype per line
    paternal_panel: PathBuf,
    /// Maternal reference panel, one haplotype per line
    maternal_panel: PathBuf,
    output_file: PathBuf,
    #[arg(long, help = "Phase file with paternal and maternal lines per individual")]
    phase: Option<PathBuf>,
    #[arg(long, help = "Treat the genotype input as genotype-class probabilities")]
    probabilities: bool,
    #[arg(long, value_enum)]
    method: Option<CallingMethod>,
    #[arg(long, help = "Per-locus genotyping error rate [default: 0.01]")]
    error: Option<f64>,
    #[arg(long, help = "Per-interval recombination rate [default: 0.001]")]
    recombination: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(
        long,
        help = "Also write hard genotype calls (requires --method probabilities)"
    )]
    called_out: Option<PathBuf>,
    #[arg(long, default_value_t = 0.9, requires = "called_out")]
    call_threshold: f64,
    #[arg(long, help = "JSON parameter file; explicit options take precedence")]
    params: Option<PathBuf>,
    #[arg(long, help = "Write the effective parameters as JSON")]
    save_params: Option<PathBuf>,
    #[arg(long, requires = "stop_snp")]
    start_snp: Option<usize>,
    #[arg(long, requires = "start_snp")]
    stop_snp: Option<usize>,
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long)]
    no_progress: bool,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

fn effective_params(cli: &Cli) -> Result<HmmParamsFile> {
    let mut params = match &cli.params {
        Some(path) => load_params(path)?,
        None => HmmParamsFile::default(),
    };
    if let Some(v) = cli.error {
        params.error = v;
    }
    if let Some(v) = cli.recombination {
        params.recombination_rate = v;
    }
    if let Some(v) = cli.method {
        params.method = v;
    }
    if let Some(v) = cli.seed {
        params.seed = v;
    }
    params.validate()?;
    Ok(params)
}

fn read_observations(cli: &Cli, window: Option<LocusWindow>) -> Result<Vec<(String, Observation)>> {
    if cli.probabilities {
        if cli.phase.is_some() {
            bail!("--phase cannot be combined with --probabilities");
        }
        let probs = read_genotype_probabilities(&cli.genotypes, window)
            .context("failed to read genotype probabilities")?;
        return Ok(probs
            .into_iter()
            .map(|(id, p)| (id, Observation::Probabilities(p)))
            .collect());
    }

    let genotypes = read_genotypes(&cli.genotypes, window).context("failed to read genotypes")?;
    let mut phase: HashMap<String, [Vec<u8>; 2]> = match &cli.phase {
        Some(path) => read_phase(path, window)
            .context("failed to read phase")?
            .into_iter()
            .collect(),
        None => HashMap::new(),
    };
    let mut out = Vec::with_capacity(genotypes.len());
    for rec in genotypes {
        let haplotypes = phase.remove(&rec.id);
        out.push((
            rec.id,
            Observation::Called {
                genotypes: rec.values,
                haplotypes,
            },
        ));
    }
    if !phase.is_empty() {
        log::warn!(
            "{} phased individuals have no genotype line and were ignored",
            phase.len()
        );
    }
    Ok(out)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Some(n_threads) = cli.threads {
        if n_threads == 0 {
            bail!("--threads must be >= 1");
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
            .map_err(|e| anyhow!("failed to configure Rayon global thread pool: {e}"))?;
    }

    let params = effective_params(&cli)?;
    let decoder = params.method.decoder()?;
    if cli.called_out.is_some() && decoder != Decoder::Probabilities {
        bail!("--called-out requires --method probabilities");
    }
    let window = match (cli.start_snp, cli.stop_snp) {
        (Some(start), Some(stop)) => Some(LocusWindow::new(start, stop)?),
        _ => None,
    };
    let show_progress = !cli.no_progress;

    let pb = progress::spinner("IO", "Reading inputs", show_progress);
    let paternal = read_reference_panel(&cli.paternal_panel, window)
        .context("failed to read paternal panel")?;
    let maternal = read_reference_panel(&cli.maternal_panel, window)
        .context("failed to read maternal panel")?;
    let individuals = read_observations(&cli, window)?;
    pb.finish_with_message("Reading inputs done");
    log::info!(
        "{} individuals, {} loci, {} paternal and {} maternal haplotypes",
        individuals.len(),
        paternal.n_loci(),
        paternal.n_haplotypes(),
        maternal.n_haplotypes()
    );

    let hmm = DiploidHmm::new(paternal, maternal, params.error, params.recombination_rate)?;

    let bar = progress::individuals_bar(individuals.len() as u64, "HMM", show_progress);
    bar.set_message(params.method.name());
    let outputs: Vec<(String, HmmOutput)> = individuals
        .par_iter()
        .enumerate()
        .map(|(idx, (id, obs))| -> Result<(String, HmmOutput)> {
            let mut rng = new_rng(params.seed.wrapping_add(idx as u64));
            let out = hmm
                .run(obs, params.method, &mut rng)
                .with_context(|| format!("individual {id}"))?;
            bar.inc(1);
            Ok((id.clone(), out))
        })
        .collect::<Result<_>>()?;
    bar.finish_with_message(format!("{} done", params.method.name()));

    match decoder {
        Decoder::Dosages => {
            let rows: Vec<(String, Vec<f64>)> = outputs
                .into_iter()
                .filter_map(|(id, out)| match out {
                    HmmOutput::Dosages(d) => Some((id, d)),
                    _ => None,
                })
                .collect();
            write_dosages(&cli.output_file, &rows)?;
        }
        Decoder::Probabilities => {
            let rows: Vec<_> = outputs
                .into_iter()
                .filter_map(|(id, out)| match out {
                    HmmOutput::Probabilities(p) => Some((id, p)),
                    _ => None,
                })
                .collect();
            write_genotype_probabilities(&cli.output_file, &rows)?;
            if let Some(path) = &cli.called_out {
                let calls = rows
                    .iter()
                    .map(|(id, p)| -> Result<(String, Vec<u8>)> {
                        Ok((id.clone(), call_genotypes(p, cli.call_threshold)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                write_genotypes(path, &calls)?;
                log::info!("wrote {}", path.display());
            }
        }
        Decoder::Sample => {
            let rows: Vec<_> = outputs
                .into_iter()
                .filter_map(|(id, out)| match out {
                    HmmOutput::Haplotypes(h) => Some((id, h)),
                    _ => None,
                })
                .collect();
            write_phase(&cli.output_file, &rows)?;
        }
    }
    log::info!("wrote {}", cli.output_file.display());

    if let Some(path) = &cli.save_params {
        save_params(path, &params)?;
    }
    Ok(())
}
