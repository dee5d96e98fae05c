use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use locuswalk::framework::TraversalConfig;
use locuswalk::genomics::{
    format_site, read_intervals, read_sites, write_intervals_to_path, write_site_header,
    CallerConfig, CallerError, GenotypeMasker, IndelRegionConfig, MaskingConfig, OutputMode,
    PileupFilter, PileupSource, ReferenceGenome, VcfHeader, VcfWriter,
};
use locuswalk::plugin::{
    Batches, CallStats, GenotypeCallerWalker, IndelRegionWalker, MaskingWalker, PluginExecutor,
    WalkerRegistry,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "locuswalk", version, about = "Per-locus genotype calling, indel regions and sample masking")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Worker threads for tree-reducible analyzers (0 = one per core).
    #[arg(short = 't', long, default_value_t = 0, global = true)]
    threads: usize,

    /// Loci per leaf window of the reduction tree.
    #[arg(long, default_value_t = 1024, global = true)]
    window_size: usize,

    /// Loci read from the input before each traversal round.
    #[arg(long, default_value_t = 65_536, global = true)]
    batch_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct PileupArgs {
    /// Coordinate-sorted BAM with read groups.
    #[arg(short = 'I', long)]
    bam: PathBuf,
    /// Reference FASTA matching the BAM header.
    #[arg(short = 'R', long)]
    reference: PathBuf,
    /// Minimum base quality for a base to be considered.
    #[arg(long, default_value_t = 1)]
    min_base_quality: u8,
    /// Minimum mapping quality for a read to be considered.
    #[arg(long, default_value_t = 1)]
    min_mapping_quality: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Call single-sample diploid genotypes into a VCF.
    Call {
        #[command(flatten)]
        pileup: PileupArgs,
        /// Output VCF (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Calls with lower depth are flagged LowCov.
        #[arg(long, default_value_t = 1)]
        min_coverage: u32,
        /// confident-variants or all-sites.
        #[arg(long, default_value_t = OutputMode::ConfidentVariants)]
        output_mode: OutputMode,
    },
    /// Write padded, merged intervals around indel evidence.
    IndelRegions {
        #[command(flatten)]
        pileup: PileupArgs,
        /// Output file; `.interval_list` selects the Picard format.
        #[arg(short, long)]
        output: PathBuf,
        /// Minimum reads supporting one indel length.
        #[arg(long, default_value_t = 1)]
        min_count: u32,
        /// Bases added on each side of every interval.
        #[arg(long, default_value_t = 5)]
        indel_window: u32,
    },
    /// Mask sample genotypes of a VCF by interval masks and depth.
    Mask {
        /// Input VCF/BCF with called genotypes.
        #[arg(short = 'V', long)]
        variants: PathBuf,
        /// Mask file, paired in order with --sample-name.
        #[arg(long = "mask")]
        masks: Vec<PathBuf>,
        /// Sample masked by the mask at the same position.
        #[arg(long = "sample-name", short = 's')]
        sample_names: Vec<String>,
        /// Output VCF (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Mask genotypes outside the mask instead of inside.
        #[arg(long)]
        filter_not_in_mask: bool,
        /// Keep sites where every genotype is missing.
        #[arg(long)]
        preserve_all: bool,
        /// Genotypes with lower depth are masked.
        #[arg(long, default_value_t = 0)]
        min_coverage: u32,
        /// Keep masked genotypes in an MGT format field.
        #[arg(long)]
        keep_masked_genotype: bool,
        /// Ignore mask samples absent from the input.
        #[arg(long)]
        allow_missing_samples: bool,
    },
    /// List available analyzers.
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    configure_threads(cli.threads)?;

    let traversal = TraversalConfig::with_window_size(cli.window_size)
        .context("invalid --window-size")?
        .with_batch_size(cli.batch_size);

    match cli.command {
        Commands::Call {
            pileup,
            output,
            min_coverage,
            output_mode,
        } => {
            let config = CallerConfig::default()
                .with_minimum_coverage(min_coverage)
                .with_qualities(pileup.min_base_quality, pileup.min_mapping_quality)
                .with_output_mode(output_mode);
            run_call(pileup, output, config, traversal)?;
        }
        Commands::IndelRegions {
            pileup,
            output,
            min_count,
            indel_window,
        } => {
            let config = IndelRegionConfig::default()
                .with_minimum_count(min_count)
                .with_indel_window(indel_window);
            run_indel_regions(pileup, output, config, traversal)?;
        }
        Commands::Mask {
            variants,
            masks,
            sample_names,
            output,
            filter_not_in_mask,
            preserve_all,
            min_coverage,
            keep_masked_genotype,
            allow_missing_samples,
        } => {
            let config = MaskingConfig::default()
                .with_filter_not_in_mask(filter_not_in_mask)
                .with_preserve_all(preserve_all)
                .with_minimum_coverage(min_coverage)
                .with_keep_masked_genotype(keep_masked_genotype)
                .with_allow_missing_samples(allow_missing_samples);
            run_mask(variants, masks, sample_names, output, config, traversal)?;
        }
        Commands::List => {
            for info in WalkerRegistry::builtin().list() {
                let mode = if info.tree_reducible { "parallel" } else { "sequential" };
                println!("{}\t{}\t{}", info.name, mode, info.description);
            }
        }
    }

    Ok(())
}

fn configure_threads(threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("configuring worker threads")
}

fn open_pileup(args: &PileupArgs) -> Result<PileupSource> {
    let reference = ReferenceGenome::from_path(&args.reference)
        .with_context(|| format!("failed to open reference {}", args.reference.display()))?;
    let filter = PileupFilter {
        minimum_base_quality: args.min_base_quality,
        minimum_mapping_quality: args.min_mapping_quality,
    };
    PileupSource::open(&args.bam, reference, filter)
        .with_context(|| format!("failed to open alignments {}", args.bam.display()))
}

fn run_call(
    pileup: PileupArgs,
    output: Option<PathBuf>,
    config: CallerConfig,
    traversal: TraversalConfig,
) -> Result<()> {
    let source = open_pileup(&pileup)?;
    let sample = match source.samples() {
        [only] => Arc::clone(only),
        other => return Err(CallerError::SampleCount { found: other.len() }.into()),
    };
    let mut header = VcfHeader::new(sample).with_dictionary(source.dictionary().clone());
    if config.output_mode == OutputMode::AllSites {
        header = header.with_filters(config.minimum_coverage);
    }

    let stats = match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            call_into(source, &config, &header, BufWriter::new(file), &traversal)?
        }
        None => call_into(source, &config, &header, io::stdout(), &traversal)?,
    };
    info!(emitted = stats.emitted, loci = stats.loci, "done");
    Ok(())
}

fn call_into<W: Write + Send + 'static>(
    mut source: PileupSource,
    config: &CallerConfig,
    header: &VcfHeader,
    writer: W,
    traversal: &TraversalConfig,
) -> Result<CallStats> {
    let sink = VcfWriter::new(writer, header).context("failed to write VCF header")?;
    let walker = GenotypeCallerWalker::new(config, source.samples(), sink)?;
    let executor = PluginExecutor::new(Arc::new(walker), traversal.clone());
    let result = executor
        .run_batches(Batches::new(source.columns(), traversal.batch_size))
        .context("genotype calling failed")?;
    executor
        .plugin()
        .sink()
        .flush()
        .context("failed to flush VCF output")?;
    Ok(result.output)
}

fn run_indel_regions(
    pileup: PileupArgs,
    output: PathBuf,
    config: IndelRegionConfig,
    traversal: TraversalConfig,
) -> Result<()> {
    let mut source = open_pileup(&pileup)?;
    let executor = PluginExecutor::new(Arc::new(IndelRegionWalker::new(&config)), traversal.clone());
    let result = executor
        .run_batches_parallel(Batches::new(source.columns(), traversal.batch_size))
        .context("indel region detection failed")?;

    write_intervals_to_path(&output, &result.output.intervals, source.dictionary())?;
    info!(
        loci = result.loci_visited,
        windows = result.windows,
        intervals = result.output.intervals.len(),
        output = %output.display(),
        "intervals written"
    );
    Ok(())
}

fn run_mask(
    variants: PathBuf,
    masks: Vec<PathBuf>,
    sample_names: Vec<String>,
    output: Option<PathBuf>,
    config: MaskingConfig,
    traversal: TraversalConfig,
) -> Result<()> {
    let input = read_sites(&variants)
        .with_context(|| format!("failed to read variants from {}", variants.display()))?;
    let mask_sets = masks
        .iter()
        .map(|path| {
            read_intervals(path, &input.dictionary)
                .with_context(|| format!("failed to read mask {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let keep_masked_genotype = config.keep_masked_genotype;
    let masker = GenotypeMasker::new(sample_names, mask_sets, &input.samples, config)?;
    let executor = PluginExecutor::new(Arc::new(MaskingWalker::new(masker)), traversal);
    let summary = executor
        .run_parallel(&input.records)
        .context("masking failed")?
        .output;

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    write_site_header(&mut writer, &input.samples, &input.dictionary, keep_masked_genotype)?;
    for record in &summary.records {
        writer.write_all(format_site(record, keep_masked_genotype).as_bytes())?;
    }
    writer.flush()?;
    info!(
        records = summary.records.len(),
        missing = summary.missing.total(),
        "masked variants written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn mask_flags_pair_in_order() {
        let cli = Cli::try_parse_from([
            "locuswalk", "--window-size", "64", "mask", "-V", "in.vcf", "--mask", "a.bed", "-s", "s1",
            "--mask", "b.intervals", "-s", "s2", "--min-coverage", "3", "--keep-masked-genotype",
        ])
        .unwrap();
        assert_eq!(cli.window_size, 64);
        match cli.command {
            Commands::Mask {
                masks,
                sample_names,
                min_coverage,
                keep_masked_genotype,
                filter_not_in_mask,
                ..
            } => {
                assert_eq!(masks, vec![PathBuf::from("a.bed"), PathBuf::from("b.intervals")]);
                assert_eq!(sample_names, vec!["s1", "s2"]);
                assert_eq!(min_coverage, 3);
                assert!(keep_masked_genotype);
                assert!(!filter_not_in_mask);
            }
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn call_rejects_unknown_output_mode() {
        let parsed = Cli::try_parse_from([
            "locuswalk", "call", "-I", "in.bam", "-R", "ref.fa", "--output-mode", "everything",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn second_pool_configuration_is_reported() {
        rayon::join(|| (), || ());
        let err = configure_threads(2).unwrap_err();
        assert!(format!("{:#}", err).contains("configuring worker threads"));
    }

    #[test]
    fn indel_regions_writes_padded_interval_list() {
        let dir = tempfile::tempdir().unwrap();
        let pileup = PileupArgs {
            reference: write(dir.path(), "ref.fa", ">chr1\nACGTACGTACGTACGTACGT\n"),
            bam: write(
                dir.path(),
                "reads.sam",
                "@SQ\tSN:chr1\tLN:20\n@RG\tID:lib1\tSM:ancient\n\
                 r1\t0\tchr1\t3\t60\t3M2D3M\t*\t0\t0\tGTATAC\tIIIIII\tRG:Z:lib1\n",
            ),
            min_base_quality: 1,
            min_mapping_quality: 1,
        };
        let output = dir.path().join("regions.interval_list");

        run_indel_regions(pileup, output.clone(), IndelRegionConfig::default(), TraversalConfig::default())
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(output).unwrap(),
            "@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:20\nchr1\t1\t13\t+\t.\n"
        );
    }

    #[test]
    fn mask_writes_masked_vcf() {
        let dir = tempfile::tempdir().unwrap();
        let variants = write(
            dir.path(),
            "calls.vcf",
            "##fileformat=VCFv4.2\n\
             ##contig=<ID=chr1,length=1000>\n\
             ##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
             ##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Read depth\">\n\
             #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\ts2\n\
             chr1\t10\t.\tA\tG\t.\t.\t.\tGT:DP\t0/1:8\t1/1:.\n\
             chr1\t30\t.\tG\tA,C\t.\t.\t.\tGT\t1/2\t./.\n",
        );
        let mask = write(dir.path(), "s1.intervals", "chr1:5-15\n");
        let output = dir.path().join("masked.vcf");

        run_mask(
            variants,
            vec![mask],
            vec!["s1".to_string()],
            Some(output.clone()),
            MaskingConfig::default().with_keep_masked_genotype(true),
            TraversalConfig::default(),
        )
        .unwrap();

        let written = std::fs::read_to_string(output).unwrap();
        let body: Vec<&str> = written.lines().filter(|line| !line.starts_with('#')).collect();
        assert_eq!(
            body,
            vec![
                "chr1\t10\t.\tA\tG\t.\t.\t.\tGT:DP:MGT\t./.:8:0/1\t1/1:.:.",
                "chr1\t30\t.\tG\tA,C\t.\t.\t.\tGT:DP:MGT\t1/2:.:.\t./.:.:.",
            ]
        );
    }
}
