use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_htslib::bam::{self, pileup::Indel, record::Aux, record::Cigar, Read as BamRead};
use rust_htslib::bcf::{self, header::HeaderRecord, Read as BcfRead};
use rust_htslib::faidx;
use thiserror::Error;
use tracing::{debug, info};

use super::{
    ContigEntry, EmittedInterval, IntervalSet, Locus, LocusColumn, PileupElement, SampleGenotype,
    SequenceDictionary, SiteRecord,
};

/// Errors raised while reading alignments, references, sites or masks.
#[derive(Debug, Error)]
pub enum InputError {
    /// htslib failed to open or decode a file.
    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    /// Plain-text input could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A read has no `RG` tag or names a read group missing from the header.
    #[error("read {read} has no known read group")]
    UnknownReadGroup {
        /// Read name.
        read: String,
    },

    /// The reference FASTA could not be opened or has no such contig.
    #[error("failed to read reference {}: {source}", path.display())]
    Reference {
        /// Reference FASTA.
        path: PathBuf,
        /// htslib failure.
        #[source]
        source: rust_htslib::errors::Error,
    },

    /// A pileup references a contig index absent from the header.
    #[error("contig index {tid} is not in the sequence dictionary")]
    UnknownContig {
        /// Offending contig index.
        tid: u32,
    },

    /// The reference has no base for a covered locus.
    #[error("reference sequence has no base at {locus}")]
    MissingReference {
        /// Covered locus.
        locus: Locus,
    },

    /// A mask line could not be parsed.
    #[error("{}:{line}: {message}", path.display())]
    MalformedInterval {
        /// Mask file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },
}

fn io_error(path: &Path) -> impl Fn(io::Error) -> InputError + '_ {
    move |source| InputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Indexed FASTA reference, read one contig at a time.
///
/// The whole sequence of the contig under the pileup is cached; moving to
/// another contig replaces it. A missing `.fai` is built on open.
pub struct ReferenceGenome {
    reader: faidx::Reader,
    path: PathBuf,
    cached: Option<(Arc<str>, Vec<u8>)>,
}

impl std::fmt::Debug for ReferenceGenome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceGenome")
            .field("path", &self.path)
            .field("contig", &self.cached.as_ref().map(|(name, _)| name))
            .finish()
    }
}

impl ReferenceGenome {
    /// Open a FASTA file through its faidx index.
    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        let reader = faidx::Reader::from_path(path).map_err(|source| InputError::Reference {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "opened reference");
        Ok(Self {
            reader,
            path: path.to_path_buf(),
            cached: None,
        })
    }

    /// Base at a 0-based offset of `contig`, upper-cased.
    pub fn base(&mut self, contig: &ContigEntry, offset: u64) -> Result<Option<u8>, InputError> {
        Ok(self.sequence(contig)?.get(offset as usize).copied())
    }

    /// Sequence of `contig`, fetched when it differs from the cached one.
    fn sequence(&mut self, contig: &ContigEntry) -> Result<&[u8], InputError> {
        let stale = match &self.cached {
            Some((name, _)) => name != &contig.name,
            None => true,
        };
        if stale {
            let last = contig.length.saturating_sub(1) as usize;
            let mut sequence = self
                .reader
                .fetch_seq(&*contig.name, 0, last)
                .map_err(|source| InputError::Reference {
                    path: self.path.clone(),
                    source,
                })?
                .to_vec();
            sequence.make_ascii_uppercase();
            debug!(contig = %contig.name, length = sequence.len(), "loaded reference contig");
            self.cached = Some((Arc::clone(&contig.name), sequence));
        }
        Ok(self
            .cached
            .as_ref()
            .map(|(_, sequence)| sequence.as_slice())
            .unwrap_or_default())
    }
}

/// Quality thresholds applied while building pileup columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PileupFilter {
    /// Bases below this quality are dropped (deletions are kept).
    pub minimum_base_quality: u8,
    /// Reads below this mapping quality are dropped.
    pub minimum_mapping_quality: u8,
}

impl Default for PileupFilter {
    fn default() -> Self {
        Self {
            minimum_base_quality: 1,
            minimum_mapping_quality: 1,
        }
    }
}

/// BAM-backed supplier of filtered [`LocusColumn`]s in coordinate order.
pub struct PileupSource {
    reader: bam::Reader,
    reference: ReferenceGenome,
    dictionary: SequenceDictionary,
    read_groups: HashMap<String, Arc<str>>,
    samples: Vec<Arc<str>>,
    filter: PileupFilter,
}

impl std::fmt::Debug for PileupSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PileupSource")
            .field("contigs", &self.dictionary.len())
            .field("samples", &self.samples)
            .field("filter", &self.filter)
            .finish()
    }
}

impl PileupSource {
    /// Open a coordinate-sorted BAM and pair it with a reference.
    pub fn open(
        alignments: &Path,
        reference: ReferenceGenome,
        filter: PileupFilter,
    ) -> Result<Self, InputError> {
        let reader = bam::Reader::from_path(alignments)?;
        let header = reader.header();

        let dictionary = SequenceDictionary::new((0..header.target_count()).map(|tid| {
            (
                String::from_utf8_lossy(header.tid2name(tid)).into_owned(),
                header.target_len(tid).unwrap_or(0),
            )
        }));

        let mut read_groups = HashMap::new();
        let mut samples: Vec<Arc<str>> = Vec::new();
        let parsed = bam::Header::from_template(header).to_hashmap();
        for group in parsed.get("RG").into_iter().flatten() {
            if let (Some(id), Some(sample)) = (group.get("ID"), group.get("SM")) {
                let sample = match samples.iter().find(|known| known.as_ref() == sample.as_str()) {
                    Some(known) => Arc::clone(known),
                    None => {
                        let sample: Arc<str> = Arc::from(sample.as_str());
                        samples.push(Arc::clone(&sample));
                        sample
                    }
                };
                read_groups.insert(id.clone(), sample);
            }
        }
        info!(
            path = %alignments.display(),
            contigs = dictionary.len(),
            samples = samples.len(),
            "opened alignments"
        );

        Ok(Self {
            reader,
            reference,
            dictionary,
            read_groups,
            samples,
            filter,
        })
    }

    /// Contigs of the alignment header.
    pub fn dictionary(&self) -> &SequenceDictionary {
        &self.dictionary
    }

    /// Distinct `SM` values of the header read groups.
    pub fn samples(&self) -> &[Arc<str>] {
        &self.samples
    }

    /// Iterate over covered loci.
    pub fn columns(&mut self) -> impl Iterator<Item = Result<LocusColumn, InputError>> + '_ {
        let Self {
            reader,
            reference,
            dictionary,
            read_groups,
            filter,
            ..
        } = self;
        let (dictionary, read_groups, filter) = (&*dictionary, &*read_groups, *filter);
        reader.pileup().map(move |pileup| {
            let pileup = pileup?;
            build_column(&pileup, reference, dictionary, read_groups, filter)
        })
    }
}

fn build_column(
    pileup: &bam::pileup::Pileup,
    reference: &mut ReferenceGenome,
    dictionary: &SequenceDictionary,
    read_groups: &HashMap<String, Arc<str>>,
    filter: PileupFilter,
) -> Result<LocusColumn, InputError> {
    let tid = pileup.tid();
    let offset = pileup.pos();
    let contig = dictionary
        .get(tid)
        .ok_or(InputError::UnknownContig { tid })?;
    let locus = Locus::new(tid, Arc::clone(&contig.name), offset + 1);
    let reference_base = reference
        .base(contig, offset as u64)?
        .ok_or_else(|| InputError::MissingReference {
            locus: locus.clone(),
        })?;

    let mut elements = Vec::with_capacity(pileup.depth() as usize);
    for alignment in pileup.alignments() {
        if alignment.is_refskip() {
            continue;
        }
        let record = alignment.record();
        if record.mapq() < filter.minimum_mapping_quality {
            continue;
        }
        let sample = sample_of(&record, read_groups)?;

        if alignment.is_del() {
            let length = deletion_length(&record, offset as i64).unwrap_or(1);
            elements.push(PileupElement::deletion(sample, length));
            continue;
        }
        let Some(qpos) = alignment.qpos() else {
            continue;
        };
        if record.qual()[qpos] < filter.minimum_base_quality {
            continue;
        }
        let mut element = PileupElement::base(sample, record.seq()[qpos]);
        element.before_insertion = matches!(alignment.indel(), Indel::Ins(_));
        elements.push(element);
    }

    if elements.is_empty() {
        debug!(locus = %locus, depth = pileup.depth(), "all reads filtered");
    }
    Ok(LocusColumn::new(locus, reference_base, elements))
}

fn sample_of(
    record: &bam::Record,
    read_groups: &HashMap<String, Arc<str>>,
) -> Result<Arc<str>, InputError> {
    let sample = match record.aux(b"RG") {
        Ok(Aux::String(group)) => read_groups.get(group).cloned(),
        _ => None,
    };
    sample.ok_or_else(|| InputError::UnknownReadGroup {
        read: String::from_utf8_lossy(record.qname()).into_owned(),
    })
}

/// Length of the CIGAR deletion covering the 0-based reference `offset`.
fn deletion_length(record: &bam::Record, offset: i64) -> Option<u32> {
    let mut reference_pos = record.pos();
    for op in record.cigar().iter() {
        match *op {
            Cigar::Del(length) => {
                if (reference_pos..reference_pos + length as i64).contains(&offset) {
                    return Some(length);
                }
                reference_pos += length as i64;
            }
            Cigar::Match(length)
            | Cigar::Equal(length)
            | Cigar::Diff(length)
            | Cigar::RefSkip(length) => reference_pos += length as i64,
            Cigar::Ins(_) | Cigar::SoftClip(_) | Cigar::HardClip(_) | Cigar::Pad(_) => {}
        }
        if reference_pos > offset {
            break;
        }
    }
    None
}

/// Called sites loaded from a VCF/BCF file.
#[derive(Debug, Clone)]
pub struct SiteInput {
    /// Sample columns in header order.
    pub samples: Vec<Arc<str>>,
    /// Contigs declared by the header, indexed by record `rid`.
    pub dictionary: SequenceDictionary,
    /// Sites in file order.
    pub records: Vec<SiteRecord>,
}

/// Read every site of a VCF/BCF file with its `GT` and `DP` values.
pub fn read_sites(path: &Path) -> Result<SiteInput, InputError> {
    let mut reader = bcf::Reader::from_path(path)?;
    let (samples, dictionary) = {
        let header = reader.header();
        let samples: Vec<Arc<str>> = header
            .samples()
            .into_iter()
            .map(|name| Arc::from(String::from_utf8_lossy(name).as_ref()))
            .collect();

        let mut lengths = HashMap::new();
        for record in header.header_records() {
            if let HeaderRecord::Contig { values, .. } = record {
                if let (Some(id), Some(length)) = (values.get("ID"), values.get("length")) {
                    lengths.insert(id.clone(), length.parse::<u64>().unwrap_or(0));
                }
            }
        }
        let mut contigs = Vec::new();
        for rid in 0..header.contig_count() {
            let name = String::from_utf8_lossy(header.rid2name(rid)?).into_owned();
            let length = lengths.get(&name).copied().unwrap_or(0);
            contigs.push((name, length));
        }
        (samples, SequenceDictionary::new(contigs))
    };

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let rid = record.rid().ok_or(InputError::UnknownContig { tid: u32::MAX })?;
        let contig = dictionary
            .get(rid)
            .ok_or(InputError::UnknownContig { tid: rid })?;
        let locus = Locus::new(rid, Arc::clone(&contig.name), (record.pos() + 1) as u32);

        let alleles: Vec<String> = record
            .alleles()
            .into_iter()
            .map(|allele| String::from_utf8_lossy(allele).into_owned())
            .collect();
        let (reference, alternates) = match alleles.split_first() {
            Some((reference, alternates)) => (reference.clone(), alternates.to_vec()),
            None => (".".to_string(), Vec::new()),
        };

        let depths: Vec<Option<u32>> = match record.format(b"DP").integer() {
            Ok(values) => values
                .iter()
                .map(|sample| {
                    sample
                        .first()
                        .filter(|&&dp| dp >= 0)
                        .map(|&dp| dp as u32)
                })
                .collect(),
            Err(_) => vec![None; samples.len()],
        };

        let genotypes = record.genotypes()?;
        let site_genotypes = samples
            .iter()
            .enumerate()
            .map(|(idx, sample)| SampleGenotype {
                sample: Arc::clone(sample),
                alleles: genotypes.get(idx).iter().map(|allele| allele.index()).collect(),
                depth: depths.get(idx).copied().flatten(),
                masked_genotype: None,
            })
            .collect();

        records.push(SiteRecord::new(locus, reference, alternates, site_genotypes));
    }
    info!(path = %path.display(), sites = records.len(), samples = samples.len(), "loaded sites");

    Ok(SiteInput {
        samples,
        dictionary,
        records,
    })
}

fn parse_position(value: &str, path: &Path, line: usize) -> Result<u32, InputError> {
    value.trim().parse().map_err(|_| InputError::MalformedInterval {
        path: path.to_path_buf(),
        line,
        message: format!("invalid position '{}'", value),
    })
}

/// Load a mask as an [`IntervalSet`].
///
/// Accepts Picard interval lists (`@` header lines, 1-based rows), BED files
/// (`.bed`, 0-based half-open) and plain `contig`, `contig:pos` or
/// `contig:start-end` lines. Contigs missing from `dictionary` are skipped.
pub fn read_intervals(path: &Path, dictionary: &SequenceDictionary) -> Result<IntervalSet, InputError> {
    let is_bed = path.extension().and_then(|ext| ext.to_str()) == Some("bed");
    let reader = BufReader::new(File::open(path).map_err(io_error(path))?);
    let mut intervals = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error(path))?;
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('@') || line.starts_with('#') || line.starts_with("track") {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let (contig, start, end) = if fields.len() >= 3 {
            let start = parse_position(fields[1], path, line_no)?;
            let end = parse_position(fields[2], path, line_no)?;
            if is_bed {
                (fields[0], start + 1, end)
            } else {
                (fields[0], start, end)
            }
        } else {
            match line.rsplit_once(':') {
                Some((contig, range)) => match range.split_once('-') {
                    Some((start, end)) => (
                        contig,
                        parse_position(start, path, line_no)?,
                        parse_position(end, path, line_no)?,
                    ),
                    None => {
                        let position = parse_position(range, path, line_no)?;
                        (contig, position, position)
                    }
                },
                None => match dictionary.tid(line).and_then(|tid| dictionary.get(tid)) {
                    Some(entry) => (line, 1, entry.length.min(u32::MAX as u64) as u32),
                    None => (line, 1, 0),
                },
            }
        };

        match dictionary.tid(contig) {
            Some(tid) => intervals.push(EmittedInterval::new(tid, contig, start, end)),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(path = %path.display(), skipped, "mask intervals on unknown contigs skipped");
    }
    Ok(IntervalSet::from_intervals(intervals))
}
