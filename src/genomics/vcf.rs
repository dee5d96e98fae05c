use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use thiserror::Error;

use super::{Allele, GenotypeCall, Locus, SequenceDictionary, SiteRecord};

/// Receives every call the genotype walker decides to emit.
pub trait CallSink: Send + Sync {
    /// Accept one call.
    fn emit(&self, call: &GenotypeCall) -> Result<(), SinkError>;
}

/// Errors raised by call sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing a record failed.
    #[error("failed to write VCF record at {locus}: {source}")]
    Record {
        /// Locus of the record being written.
        locus: Locus,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Metadata written in the VCF header.
#[derive(Debug, Clone)]
pub struct VcfHeader {
    /// The single sample column.
    pub sample: Arc<str>,
    /// Contigs emitted as `##contig` lines.
    pub dictionary: SequenceDictionary,
    /// Threshold quoted in the `LowCov` filter description.
    pub minimum_coverage: u32,
    /// Whether `##FILTER` lines are needed (filtered calls can be emitted).
    pub include_filters: bool,
}

impl VcfHeader {
    /// Header for `sample` with no contig lines and no filter lines.
    pub fn new(sample: impl Into<Arc<str>>) -> Self {
        Self {
            sample: sample.into(),
            dictionary: SequenceDictionary::default(),
            minimum_coverage: 1,
            include_filters: false,
        }
    }

    /// Set the contigs.
    pub fn with_dictionary(mut self, dictionary: SequenceDictionary) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// Declare the filters, quoting the coverage threshold.
    pub fn with_filters(mut self, minimum_coverage: u32) -> Self {
        self.minimum_coverage = minimum_coverage;
        self.include_filters = true;
        self
    }
}

/// Write the meta-information and column header lines.
pub fn write_header<W: Write>(writer: &mut W, header: &VcfHeader) -> io::Result<()> {
    writeln!(writer, "##fileformat=VCFv4.2")?;
    writeln!(writer, "##source=locuswalk")?;
    writeln!(
        writer,
        "##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Approximate read depth\">"
    )?;
    if header.include_filters {
        writeln!(
            writer,
            "##FILTER=<ID=LowCov,Description=\"Coverage lower than {} (user threshold)\">",
            header.minimum_coverage
        )?;
        writeln!(writer, "##FILTER=<ID=Poly,Description=\"Polymorphic site\">")?;
    }
    writeln!(
        writer,
        "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">"
    )?;
    writeln!(
        writer,
        "##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Read depth\">"
    )?;
    writeln!(
        writer,
        "##FORMAT=<ID=AD,Number=.,Type=Integer,Description=\"Allelic depths for the ref and first alt allele\">"
    )?;
    for contig in header.dictionary.iter() {
        writeln!(writer, "##contig=<ID={},length={}>", contig.name, contig.length)?;
    }
    writeln!(
        writer,
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{}",
        header.sample
    )
}

/// Render a call as one VCF data line (with trailing newline).
pub fn format_record(call: &GenotypeCall) -> String {
    let reference = call.reference();
    let mut site_alleles: Vec<Allele> = vec![reference];
    if let Some(pair) = call.alleles() {
        for allele in pair {
            if !site_alleles.contains(&allele) {
                site_alleles.push(allele);
            }
        }
    }

    let alt = if site_alleles.len() == 1 {
        ".".to_string()
    } else {
        site_alleles[1..]
            .iter()
            .map(|allele| (allele.base() as char).to_string())
            .collect::<Vec<_>>()
            .join(",")
    };

    let (filter, genotype, allele_depths) = match (call.alleles(), call.allele_depths()) {
        (Some(pair), Some([ref_depth, alt_depth])) => {
            let filter = if call.filters().is_empty() {
                "PASS".to_string()
            } else {
                call.filters()
                    .iter()
                    .map(|label| label.vcf_id())
                    .collect::<Vec<_>>()
                    .join(";")
            };
            let index = |allele: &Allele| {
                site_alleles
                    .iter()
                    .position(|known| known == allele)
                    .unwrap_or(0)
            };
            (
                filter,
                format!("{}/{}", index(&pair[0]), index(&pair[1])),
                format!("{},{}", ref_depth, alt_depth),
            )
        }
        _ => (".".to_string(), "./.".to_string(), ".".to_string()),
    };

    format!(
        "{chrom}\t{pos}\t.\t{ref_base}\t{alt}\t.\t{filter}\tDP={depth}\tGT:DP:AD\t{gt}:{depth}:{ad}\n",
        chrom = call.locus().contig,
        pos = call.locus().position,
        ref_base = reference.base() as char,
        alt = alt,
        filter = filter,
        depth = call.depth(),
        gt = genotype,
        ad = allele_depths,
    )
}

/// Thread-safe VCF writer; the header is written on construction.
#[derive(Debug)]
pub struct VcfWriter<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> VcfWriter<W> {
    /// Write the header and wrap `writer`.
    pub fn new(mut writer: W, header: &VcfHeader) -> io::Result<Self> {
        write_header(&mut writer, header)?;
        Ok(Self {
            inner: Mutex::new(writer),
        })
    }

    /// Flush buffered records.
    pub fn flush(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }

    /// Flush and return the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        let mut writer = self.inner.into_inner();
        writer.flush()?;
        Ok(writer)
    }
}

impl<W: Write + Send> CallSink for VcfWriter<W> {
    fn emit(&self, call: &GenotypeCall) -> Result<(), SinkError> {
        self.inner
            .lock()
            .write_all(format_record(call).as_bytes())
            .map_err(|source| SinkError::Record {
                locus: call.locus().clone(),
                source,
            })
    }
}

/// In-memory sink keeping calls in emission order.
#[derive(Debug, Default)]
pub struct CallBuffer {
    calls: Mutex<Vec<GenotypeCall>>,
}

impl CallBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Whether no call was emitted.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Copy of the buffered calls.
    pub fn calls(&self) -> Vec<GenotypeCall> {
        self.calls.lock().clone()
    }
}

impl CallSink for CallBuffer {
    fn emit(&self, call: &GenotypeCall) -> Result<(), SinkError> {
        self.calls.lock().push(call.clone());
        Ok(())
    }
}

/// Render a header and calls into a VCF string (useful for tests and snapshots).
pub fn render_vcf(header: &VcfHeader, calls: &[GenotypeCall]) -> Result<String> {
    let writer = VcfWriter::new(Vec::new(), header)?;
    for call in calls {
        writer.emit(call)?;
    }
    let buffer = writer.finish()?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered VCF is not valid UTF-8"))
}

/// Write the header of a masked multi-sample VCF.
pub fn write_site_header<W: Write>(
    writer: &mut W,
    samples: &[Arc<str>],
    dictionary: &SequenceDictionary,
    keep_masked_genotype: bool,
) -> io::Result<()> {
    writeln!(writer, "##fileformat=VCFv4.2")?;
    writeln!(writer, "##source=locuswalk")?;
    writeln!(
        writer,
        "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">"
    )?;
    writeln!(
        writer,
        "##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Read depth\">"
    )?;
    if keep_masked_genotype {
        writeln!(
            writer,
            "##FORMAT=<ID=MGT,Number=1,Type=String,Description=\"Genotype before masking\">"
        )?;
    }
    for contig in dictionary.iter() {
        writeln!(writer, "##contig=<ID={},length={}>", contig.name, contig.length)?;
    }
    write!(writer, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT")?;
    for sample in samples {
        write!(writer, "\t{}", sample)?;
    }
    writeln!(writer)
}

/// Render a masked site as one VCF data line (with trailing newline).
pub fn format_site(record: &SiteRecord, keep_masked_genotype: bool) -> String {
    let alt = if record.alternates.is_empty() {
        ".".to_string()
    } else {
        record.alternates.join(",")
    };
    let mut line = format!(
        "{}\t{}\t.\t{}\t{}\t.\t.\t.\t{}",
        record.locus.contig,
        record.locus.position,
        record.reference,
        alt,
        if keep_masked_genotype { "GT:DP:MGT" } else { "GT:DP" }
    );
    for genotype in &record.genotypes {
        let depth = genotype
            .depth
            .map_or_else(|| ".".to_string(), |depth| depth.to_string());
        line.push_str(&format!("\t{}:{}", genotype, depth));
        if keep_masked_genotype {
            line.push(':');
            line.push_str(genotype.masked_genotype.as_deref().unwrap_or("."));
        }
    }
    line.push('\n');
    line
}

/// Render masked sites into a VCF string.
pub fn render_sites(
    samples: &[Arc<str>],
    dictionary: &SequenceDictionary,
    records: &[SiteRecord],
    keep_masked_genotype: bool,
) -> Result<String> {
    let mut buffer = Vec::new();
    write_site_header(&mut buffer, samples, dictionary, keep_masked_genotype)?;
    for record in records {
        buffer.extend_from_slice(format_site(record, keep_masked_genotype).as_bytes());
    }
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered VCF is not valid UTF-8"))
}
