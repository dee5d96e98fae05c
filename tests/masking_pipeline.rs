#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{assert_snapshot, dictionary};
use locuswalk::framework::{TraversalConfig, TraversalEngine, TraversalError};
use locuswalk::genomics::{
    render_sites, EmittedInterval, GenotypeMasker, IntervalSet, Locus, MaskError, MaskingConfig,
    SampleGenotype, SiteRecord,
};
use locuswalk::plugin::{MaskingWalker, PluginExecutor};

fn samples() -> Vec<Arc<str>> {
    vec![Arc::from("s1"), Arc::from("s2")]
}

fn site(tid: u32, position: u32, reference: &str, alternates: &[&str], genotypes: Vec<SampleGenotype>) -> SiteRecord {
    let contig = if tid == 0 { "chr1" } else { "chr2" };
    SiteRecord::new(
        Locus::new(tid, contig, position),
        reference,
        alternates.iter().map(|alt| alt.to_string()).collect(),
        genotypes,
    )
}

fn sites() -> Vec<SiteRecord> {
    vec![
        site(
            0,
            10,
            "A",
            &["G"],
            vec![
                SampleGenotype::called("s1", [0, 1], Some(8)),
                SampleGenotype::called("s2", [1, 1], Some(2)),
            ],
        ),
        site(
            0,
            20,
            "C",
            &["T"],
            vec![
                SampleGenotype::called("s1", [0, 0], Some(1)),
                SampleGenotype::called("s2", [0, 1], Some(1)),
            ],
        ),
        site(
            0,
            30,
            "G",
            &["A", "C"],
            vec![
                SampleGenotype::called("s1", [1, 2], Some(9)),
                SampleGenotype::called("s2", [0, 1], Some(5)),
            ],
        ),
        site(
            1,
            40,
            "T",
            &["A"],
            vec![
                SampleGenotype::called("s1", [0, 1], None),
                SampleGenotype::no_call("s2", 2),
            ],
        ),
    ]
}

fn s1_mask() -> IntervalSet {
    IntervalSet::from_intervals(vec![EmittedInterval::new(0, "chr1", 25, 35)])
}

fn walker(config: MaskingConfig) -> MaskingWalker {
    let masker = GenotypeMasker::new(vec!["s1".into()], vec![s1_mask()], &samples(), config)
        .expect("mask pairs with a known sample");
    MaskingWalker::new(masker)
}

#[test]
fn masked_vcf_matches_golden() {
    let walker = walker(
        MaskingConfig::default()
            .with_minimum_coverage(2)
            .with_keep_masked_genotype(true),
    );
    let summary = TraversalEngine::default()
        .run_parallel(&walker, &sites())
        .expect("masking succeeds")
        .output;

    assert_eq!(summary.missing.get("s1"), 3);
    assert_eq!(summary.missing.get("s2"), 1);
    assert_eq!(summary.missing.total(), 4);
    assert_snapshot(
        "masking/masked.vcf",
        &render_sites(&samples(), &dictionary(), &summary.records, true).expect("render"),
    );
}

#[test]
fn preserve_all_keeps_fully_missing_sites() {
    let walker = walker(
        MaskingConfig::default()
            .with_minimum_coverage(2)
            .with_preserve_all(true),
    );
    let summary = TraversalEngine::default()
        .run(&walker, &sites())
        .expect("masking succeeds")
        .output;

    let positions: Vec<u32> = summary.records.iter().map(|r| r.locus.position).collect();
    assert_eq!(positions, vec![10, 20, 30, 40]);
    assert!(summary.records[1].genotypes.iter().all(SampleGenotype::is_no_call));
    assert!(summary.records[2].genotypes[0].masked_genotype.is_none());
}

#[test]
fn inverted_mask_spares_only_masked_region() {
    let walker = walker(MaskingConfig::default().with_filter_not_in_mask(true));
    let summary = TraversalEngine::default()
        .run(&walker, &sites())
        .expect("masking succeeds")
        .output;

    // s1 survives only at chr1:30; s2 is untouched without a coverage floor.
    assert_eq!(summary.missing.get("s1"), 3);
    assert_eq!(summary.missing.get("s2"), 0);
    let s1: Vec<String> = summary
        .records
        .iter()
        .map(|r| r.genotypes[0].to_string())
        .collect();
    assert_eq!(s1, vec!["./.", "./.", "1/2"]);
}

#[test]
fn window_layout_does_not_change_output() {
    let config = MaskingConfig::default().with_minimum_coverage(2);
    let mut loci = Vec::new();
    for _ in 0..25 {
        loci.extend(sites());
    }
    let expected = TraversalEngine::default()
        .run(&walker(config.clone()), &loci)
        .expect("sequential")
        .output;

    for window in [1, 3, 7, 64] {
        let executor = PluginExecutor::new(
            Arc::new(walker(config.clone())),
            TraversalConfig::with_window_size(window).expect("window"),
        );
        let result = executor.run_parallel(&loci).expect("parallel");
        assert_eq!(result.output, expected, "window size {}", window);
    }
}

#[test]
fn unknown_mask_sample_is_rejected() {
    let err = GenotypeMasker::new(vec!["s3".into()], vec![s1_mask()], &samples(), MaskingConfig::default())
        .unwrap_err();
    assert!(matches!(err, MaskError::UnknownSample { ref sample } if sample == "s3"));
    assert!(matches!(TraversalError::from(err), TraversalError::Mask(_)));
}
