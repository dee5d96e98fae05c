use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::genomics::{IntervalSet, Locus};

/// Errors raised while configuring or applying sample masks.
#[derive(Debug, Error)]
pub enum MaskError {
    /// Masks and sample names are not paired one to one.
    #[error("masks and sample names must be a 1-to-1 mapping ({masks} masks, {samples} samples)")]
    MaskSampleMismatch {
        /// Number of masks supplied.
        masks: usize,
        /// Number of sample names supplied.
        samples: usize,
    },

    /// A sample named for masking is absent from the input.
    #[error("sample {sample} is not present in the input; allow missing samples to ignore it")]
    UnknownSample {
        /// The missing sample.
        sample: String,
    },

    /// A genotype without allele slots cannot be turned into a no-call.
    #[error("genotype of {sample} at {locus} has ploidy 0 and cannot be masked")]
    ZeroPloidy {
        /// Site of the genotype.
        locus: Locus,
        /// Owner of the genotype.
        sample: Arc<str>,
    },
}

/// Genotype of one sample at a called site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleGenotype {
    /// Sample name.
    pub sample: Arc<str>,
    /// Allele index per chromosome copy; `None` is a no-call slot.
    pub alleles: Vec<Option<u32>>,
    /// Read depth (`DP`), when present.
    pub depth: Option<u32>,
    /// Genotype string before masking, kept on request (`MGT`).
    pub masked_genotype: Option<String>,
}

impl SampleGenotype {
    /// Genotype with the given allele indices.
    pub fn called(
        sample: impl Into<Arc<str>>,
        alleles: impl IntoIterator<Item = u32>,
        depth: Option<u32>,
    ) -> Self {
        Self {
            sample: sample.into(),
            alleles: alleles.into_iter().map(Some).collect(),
            depth,
            masked_genotype: None,
        }
    }

    /// All-missing genotype with `ploidy` slots.
    pub fn no_call(sample: impl Into<Arc<str>>, ploidy: usize) -> Self {
        Self {
            sample: sample.into(),
            alleles: vec![None; ploidy],
            depth: None,
            masked_genotype: None,
        }
    }

    /// Number of allele slots.
    pub fn ploidy(&self) -> usize {
        self.alleles.len()
    }

    /// Whether at least one allele slot is called.
    pub fn is_called(&self) -> bool {
        self.alleles.iter().any(Option::is_some)
    }

    /// Whether every slot is missing.
    pub fn is_no_call(&self) -> bool {
        !self.is_called()
    }

    /// Replace every slot with a no-call, optionally remembering the old genotype.
    pub fn mask(&mut self, locus: &Locus, keep_original: bool) -> Result<(), MaskError> {
        if self.alleles.is_empty() {
            return Err(MaskError::ZeroPloidy {
                locus: locus.clone(),
                sample: Arc::clone(&self.sample),
            });
        }
        if keep_original {
            self.masked_genotype = Some(self.to_string());
        }
        self.alleles.iter_mut().for_each(|slot| *slot = None);
        Ok(())
    }
}

impl fmt::Display for SampleGenotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alleles.is_empty() {
            return f.write_str(".");
        }
        for (idx, slot) in self.alleles.iter().enumerate() {
            if idx > 0 {
                f.write_str("/")?;
            }
            match slot {
                Some(allele) => write!(f, "{}", allele)?,
                None => f.write_str(".")?,
            }
        }
        Ok(())
    }
}

/// A called site with its per-sample genotypes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRecord {
    /// Site position.
    pub locus: Locus,
    /// Reference allele.
    pub reference: String,
    /// Alternate alleles, in index order starting at 1.
    pub alternates: Vec<String>,
    /// One genotype per sample, in header order.
    pub genotypes: Vec<SampleGenotype>,
}

impl SiteRecord {
    /// Construct a site.
    pub fn new(
        locus: Locus,
        reference: impl Into<String>,
        alternates: Vec<String>,
        genotypes: Vec<SampleGenotype>,
    ) -> Self {
        Self {
            locus,
            reference: reference.into(),
            alternates,
            genotypes,
        }
    }
}

/// Per-sample count of genotypes turned into no-calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingGenotypes {
    counts: BTreeMap<Arc<str>, u64>,
}

impl MissingGenotypes {
    /// Empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one masked genotype for `sample`.
    pub fn add(&mut self, sample: &Arc<str>) {
        *self.counts.entry(Arc::clone(sample)).or_insert(0) += 1;
    }

    /// Masked genotypes for `sample`.
    pub fn get(&self, sample: &str) -> u64 {
        self.counts.get(sample).copied().unwrap_or(0)
    }

    /// Masked genotypes over all samples.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Per-key sum of two tallies.
    pub fn combine(mut self, other: MissingGenotypes) -> MissingGenotypes {
        for (sample, count) in other.counts {
            *self.counts.entry(sample).or_insert(0) += count;
        }
        self
    }

    /// `(sample, count)` pairs sorted by sample.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, u64)> {
        self.counts.iter().map(|(sample, &count)| (sample, count))
    }
}

/// Configuration of the masking walker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaskingConfig {
    /// Mask genotypes outside (instead of inside) each sample's mask.
    pub filter_not_in_mask: bool,
    /// Keep sites where every genotype ends up missing.
    pub preserve_all: bool,
    /// Genotypes with lower depth are masked; missing depth counts as 0.
    pub minimum_coverage: u32,
    /// Keep the original genotype string in `MGT`.
    pub keep_masked_genotype: bool,
    /// Ignore mask samples absent from the input instead of failing.
    pub allow_missing_samples: bool,
}

impl MaskingConfig {
    /// Invert the mask logic.
    pub fn with_filter_not_in_mask(mut self, value: bool) -> Self {
        self.filter_not_in_mask = value;
        self
    }

    /// Keep all-missing sites.
    pub fn with_preserve_all(mut self, value: bool) -> Self {
        self.preserve_all = value;
        self
    }

    /// Set the depth threshold.
    pub fn with_minimum_coverage(mut self, minimum_coverage: u32) -> Self {
        self.minimum_coverage = minimum_coverage;
        self
    }

    /// Keep masked genotypes in `MGT`.
    pub fn with_keep_masked_genotype(mut self, value: bool) -> Self {
        self.keep_masked_genotype = value;
        self
    }

    /// Tolerate unknown mask samples.
    pub fn with_allow_missing_samples(mut self, value: bool) -> Self {
        self.allow_missing_samples = value;
        self
    }
}

/// Applies sample-specific masks and coverage thresholds to called sites.
#[derive(Debug, Clone)]
pub struct GenotypeMasker {
    masks: BTreeMap<Arc<str>, IntervalSet>,
    config: MaskingConfig,
}

impl GenotypeMasker {
    /// Pair `sample_names` with `masks` and check them against the input samples.
    pub fn new(
        sample_names: Vec<String>,
        masks: Vec<IntervalSet>,
        input_samples: &[Arc<str>],
        config: MaskingConfig,
    ) -> Result<Self, MaskError> {
        if sample_names.len() != masks.len() {
            return Err(MaskError::MaskSampleMismatch {
                masks: masks.len(),
                samples: sample_names.len(),
            });
        }

        let mut paired = BTreeMap::new();
        for (sample, mask) in sample_names.into_iter().zip(masks) {
            match input_samples.iter().find(|known| known.as_ref() == sample.as_str()) {
                Some(known) => {
                    info!(
                        sample = %sample,
                        intervals = mask.intervals().len(),
                        inverted = config.filter_not_in_mask,
                        "masking sample"
                    );
                    paired.insert(Arc::clone(known), mask);
                }
                None if config.allow_missing_samples => {
                    warn!(sample = %sample, "sample not found in the input and will be ignored");
                }
                None => return Err(MaskError::UnknownSample { sample }),
            }
        }

        Ok(Self {
            masks: paired,
            config,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &MaskingConfig {
        &self.config
    }

    /// Samples with an attached mask.
    pub fn masked_samples(&self) -> impl Iterator<Item = &Arc<str>> {
        self.masks.keys()
    }

    fn should_mask(&self, genotype: &SampleGenotype, locus: &Locus) -> bool {
        // Absent DP reads as 0, so a floor of 0 never masks on depth.
        if genotype.depth.unwrap_or(0) < self.config.minimum_coverage {
            return true;
        }
        match self.masks.get(&genotype.sample) {
            Some(mask) => mask.contains(locus) != self.config.filter_not_in_mask,
            None => false,
        }
    }

    /// Mask the genotypes of one site, counting every masked genotype in `missing`.
    ///
    /// Returns `None` when every genotype is missing afterwards and sites are
    /// not preserved.
    pub fn mask_site(
        &self,
        mut record: SiteRecord,
        missing: &mut MissingGenotypes,
    ) -> Result<Option<SiteRecord>, MaskError> {
        let mut missing_samples = 0;
        for genotype in &mut record.genotypes {
            if genotype.is_called() && self.should_mask(genotype, &record.locus) {
                genotype.mask(&record.locus, self.config.keep_masked_genotype)?;
                missing.add(&genotype.sample);
            }
            if genotype.is_no_call() {
                missing_samples += 1;
            }
        }

        if missing_samples >= record.genotypes.len() {
            if self.config.preserve_all {
                warn!(locus = %record.locus, "all missing genotypes preserved");
            } else {
                debug!(locus = %record.locus, "dropping site with only missing genotypes");
                return Ok(None);
            }
        }
        Ok(Some(record))
    }
}
