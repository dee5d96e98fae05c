//! Per-locus genomics primitives: allele tallies and genotype calls, indel
//! evidence and the intervals derived from it, sample masking, and the
//! readers and writers that connect them to files.

mod genotyper;
mod indels;
mod interval_writer;
mod intervals;
mod io;
mod masking;
mod tally;
mod types;
mod vcf;

pub use genotyper::{
    CallOutcome, CallerConfig, CallerError, FilterLabel, GenotypeCall, GenotypeCaller, OutputMode,
};
pub use indels::{IndelEvidenceHistogram, IndelRegionConfig, IndelRegionDetector};
pub use interval_writer::{
    render_intervals, write_intervals, write_intervals_to_path, IntervalFormat, IntervalWriteError,
};
pub use intervals::{merge_intervals, EmittedInterval, IntervalAccumulator, IntervalSet, SeedInterval};
pub use io::{
    read_intervals, read_sites, InputError, PileupFilter, PileupSource, ReferenceGenome, SiteInput,
};
pub use masking::{
    GenotypeMasker, MaskError, MaskingConfig, MissingGenotypes, SampleGenotype, SiteRecord,
};
pub use tally::{Allele, AlleleTally};
pub use types::{ContigEntry, ElementKind, Locus, LocusColumn, PileupElement, SequenceDictionary};
pub use vcf::{
    format_record, format_site, render_sites, render_vcf, write_header, write_site_header,
    CallBuffer, CallSink, SinkError, VcfHeader, VcfWriter,
};
