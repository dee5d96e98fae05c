#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use locuswalk::genomics::{Locus, LocusColumn, PileupElement, SequenceDictionary};

pub const SAMPLE: &str = "ancient";

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("LOCUSWALK_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set LOCUSWALK_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

pub fn dictionary() -> SequenceDictionary {
    SequenceDictionary::new(vec![("chr1", 1000), ("chr2", 500)])
}

/// Column of plain bases from [`SAMPLE`].
pub fn bases(tid: u32, position: u32, reference: u8, observed: &[u8]) -> LocusColumn {
    let contig = if tid == 0 { "chr1" } else { "chr2" };
    LocusColumn::new(
        Locus::new(tid, contig, position),
        reference,
        observed
            .iter()
            .map(|&base| PileupElement::base(SAMPLE, base))
            .collect(),
    )
}

/// Column with `deletions` reads inside a deletion of `length` bases and
/// `insertions` reads followed by an insertion.
pub fn indels(tid: u32, position: u32, length: u32, deletions: usize, insertions: usize) -> LocusColumn {
    let mut column = bases(tid, position, b'A', b"");
    for _ in 0..deletions {
        column.elements.push(PileupElement::deletion(SAMPLE, length));
    }
    for _ in 0..insertions {
        column.elements.push(PileupElement::insertion(SAMPLE, b'A'));
    }
    column
}

/// Deterministic scan with indel evidence scattered over two contigs.
pub fn indel_scan() -> Vec<LocusColumn> {
    let mut loci = Vec::new();
    for tid in 0..2u32 {
        for position in 1..=400u32 {
            let column = match (tid, position) {
                (0, 3) => indels(0, 3, 2, 2, 0),
                (0, 100) => indels(0, 100, 3, 2, 0),
                (0, 104) => indels(0, 104, 0, 0, 3),
                (0, 250) => indels(0, 250, 1, 1, 0),
                (0, 261) => indels(0, 261, 4, 3, 1),
                (1, 40) => indels(1, 40, 10, 2, 0),
                (1, 47) => indels(1, 47, 2, 1, 2),
                _ => bases(tid, position, b'A', b"AAAA"),
            };
            loci.push(column);
        }
    }
    loci
}
