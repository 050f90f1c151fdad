use anyhow::{Context, Result, anyhow, bail};
use flate2::read::GzDecoder;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::library::HaplotypeLibrary;

// Inclusive: `start..=stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocusWindow {
    pub start: usize,
    pub stop: usize,
}

impl LocusWindow {
    pub fn new(start: usize, stop: usize) -> Result<Self> {
        if stop < start {
            bail!("locus window stop {stop} is before start {start}");
        }
        Ok(Self { start, stop })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub id: String,
    pub values: Vec<T>,
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let reader: Box<dyn Read> = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

fn parse_line<T: FromStr>(
    line: &str,
    line_no: usize,
    window: Option<LocusWindow>,
    ncol: &mut Option<usize>,
) -> Result<Option<Record<T>>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(None);
    }
    match *ncol {
        None => *ncol = Some(parts.len()),
        Some(n) if n != parts.len() => bail!(
            "line {line_no}: expected {n} columns but got {} for individual {}",
            parts.len(),
            parts[0]
        ),
        Some(_) => {}
    }
    let id = parts[0].to_string();
    let mut fields = &parts[1..];
    if let Some(w) = window {
        if w.stop >= fields.len() {
            bail!(
                "line {line_no}: locus window {}..={} exceeds {} loci",
                w.start,
                w.stop,
                fields.len()
            );
        }
        fields = &fields[w.start..=w.stop];
    }
    let mut values = Vec::with_capacity(fields.len());
    for (i, f) in fields.iter().enumerate() {
        let v = f
            .parse::<T>()
            .map_err(|_| anyhow!("line {line_no}: invalid value {f:?} at locus {i} for {id}"))?;
        values.push(v);
    }
    Ok(Some(Record { id, values }))
}

pub fn read_records<T: FromStr>(
    path: &Path,
    window: Option<LocusWindow>,
) -> Result<Vec<Record<T>>> {
    let reader = open_reader(path)?;
    let mut ncol = None;
    let mut out = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {:?}", path))?;
        if let Some(rec) = parse_line(&line, n + 1, window, &mut ncol)
            .with_context(|| format!("failed to parse {:?}", path))?
        {
            out.push(rec);
        }
    }
    if out.is_empty() {
        bail!("no records found in {:?}", path);
    }
    Ok(out)
}

pub fn read_genotypes(path: &Path, window: Option<LocusWindow>) -> Result<Vec<Record<u8>>> {
    read_records(path, window)
}

// Paternal line first.
pub fn read_phase(
    path: &Path,
    window: Option<LocusWindow>,
) -> Result<Vec<(String, [Vec<u8>; 2])>> {
    let records = read_records::<u8>(path, window)?;
    grouped(records, path)
}

fn grouped<T, const N: usize>(
    records: Vec<Record<T>>,
    path: &Path,
) -> Result<Vec<(String, [Vec<T>; N])>> {
    if records.len() % N != 0 {
        bail!(
            "{:?} has {} lines, expected a multiple of {N} per individual",
            path,
            records.len()
        );
    }
    let mut out = Vec::with_capacity(records.len() / N);
    let mut it = records.into_iter();
    while let Some(first) = it.next() {
        let id = first.id;
        let mut rows = Vec::with_capacity(N);
        rows.push(first.values);
        for _ in 1..N {
            let Some(rec) = it.next() else {
                bail!("{:?}: truncated record for individual {id}", path);
            };
            if rec.id != id {
                bail!(
                    "{:?}: expected individual {id} but got individual {}",
                    path,
                    rec.id
                );
            }
            rows.push(rec.values);
        }
        let rows: [Vec<T>; N] = rows
            .try_into()
            .map_err(|_| anyhow!("{:?}: malformed record for {id}", path))?;
        out.push((id, rows));
    }
    Ok(out)
}

pub fn read_genotype_probabilities(
    path: &Path,
    window: Option<LocusWindow>,
) -> Result<Vec<(String, Array2<f64>)>> {
    let records = read_records::<f64>(path, window)?;
    let mut out = Vec::new();
    for (id, rows) in grouped::<f64, 4>(records, path)? {
        let n_loci = rows[0].len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let probs = Array2::from_shape_vec((4, n_loci), flat)
            .with_context(|| format!("failed to reshape probabilities for {id}"))?;
        out.push((id, probs));
    }
    Ok(out)
}

pub fn read_reference_panel(path: &Path, window: Option<LocusWindow>) -> Result<HaplotypeLibrary> {
    let records = read_records::<u8>(path, window)?;
    let rows: Vec<Vec<u8>> = records.into_iter().map(|r| r.values).collect();
    HaplotypeLibrary::from_rows(&rows)
        .with_context(|| format!("invalid reference panel {:?}", path))
}

fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    Ok(BufWriter::new(file))
}

fn write_line<W: Write, T>(
    w: &mut W,
    id: &str,
    values: impl IntoIterator<Item = T>,
    fmt: impl Fn(T) -> String,
) -> Result<()> {
    let body: Vec<String> = values.into_iter().map(fmt).collect();
    writeln!(w, "{} {}", id, body.join(" "))?;
    Ok(())
}

pub fn write_dosages(path: &Path, rows: &[(String, Vec<f64>)]) -> Result<()> {
    let mut w = create_writer(path)?;
    for (id, dosages) in rows {
        write_line(&mut w, id, dosages.iter(), |v| format!("{v:.4}"))?;
    }
    w.flush().with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

pub fn write_genotype_probabilities(path: &Path, rows: &[(String, Array2<f64>)]) -> Result<()> {
    let mut w = create_writer(path)?;
    for (id, probs) in rows {
        for row in probs.rows() {
            write_line(&mut w, id, row.iter(), |v| format!("{v:.4}"))?;
        }
    }
    w.flush().with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

pub fn write_phase(path: &Path, rows: &[(String, Array2<u8>)]) -> Result<()> {
    let mut w = create_writer(path)?;
    for (id, haps) in rows {
        for row in haps.rows() {
            write_line(&mut w, id, row.iter(), |v| v.to_string())?;
        }
    }
    w.flush().with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

pub fn write_genotypes(path: &Path, rows: &[(String, Vec<u8>)]) -> Result<()> {
    let mut w = create_writer(path)?;
    for (id, genotypes) in rows {
        write_line(&mut w, id, genotypes.iter(), |v| v.to_string())?;
    }
    w.flush().with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}
