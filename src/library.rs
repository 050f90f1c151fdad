use anyhow::{Context, Result, bail};
use ndarray::Array2;

// `n_hap × n_loci`, alleles 0 or 1 only.
#[derive(Debug, Clone, PartialEq)]
pub struct HaplotypeLibrary {
    alleles: Array2<u8>,
}

impl HaplotypeLibrary {
    pub fn new(alleles: Array2<u8>) -> Result<Self> {
        if alleles.nrows() == 0 {
            bail!("haplotype library contains no haplotypes");
        }
        if alleles.ncols() == 0 {
            bail!("haplotype library contains no loci");
        }
        for ((h, i), &a) in alleles.indexed_iter() {
            if a > 1 {
                bail!("invalid allele {a} in haplotype {h} at locus {i}; expected 0 or 1");
            }
        }
        Ok(Self { alleles })
    }

    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self> {
        if rows.is_empty() {
            bail!("haplotype library contains no haplotypes");
        }
        let n_loci = rows[0].len();
        let mut data = Vec::with_capacity(rows.len() * n_loci);
        for (h, row) in rows.iter().enumerate() {
            if row.len() != n_loci {
                bail!(
                    "haplotype {h} has {} loci, but haplotype 0 has {n_loci}",
                    row.len()
                );
            }
            data.extend_from_slice(row);
        }
        let alleles = Array2::from_shape_vec((rows.len(), n_loci), data)
            .context("failed to reshape haplotype rows")?;
        Self::new(alleles)
    }

    pub fn n_haplotypes(&self) -> usize {
        self.alleles.nrows()
    }

    pub fn n_loci(&self) -> usize {
        self.alleles.ncols()
    }

    #[inline]
    pub fn allele(&self, hap: usize, locus: usize) -> u8 {
        self.alleles[(hap, locus)]
    }

    pub fn mosaic(&self, indices: &[usize]) -> Result<Vec<u8>> {
        if indices.len() != self.n_loci() {
            bail!(
                "index path covers {} loci, library has {}",
                indices.len(),
                self.n_loci()
            );
        }
        let mut out = Vec::with_capacity(indices.len());
        for (i, &h) in indices.iter().enumerate() {
            if h >= self.n_haplotypes() {
                bail!("haplotype index {h} out of range at locus {i}");
            }
            out.push(self.alleles[(h, i)]);
        }
        Ok(out)
    }
}
