use std::fmt;
use std::sync::Arc;

/// Genomic coordinate of a single scanned position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locus {
    /// Index of the contig in the sequence dictionary; fixes contig ordering.
    pub tid: u32,
    /// Reference contig/chromosome name.
    pub contig: Arc<str>,
    /// 1-based position on the contig.
    pub position: u32,
}

impl Locus {
    /// Construct a new locus.
    pub fn new(tid: u32, contig: impl Into<Arc<str>>, position: u32) -> Self {
        Self {
            tid,
            contig: contig.into(),
            position,
        }
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.contig, self.position)
    }
}

/// What an aligned read shows at a locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// A sequenced base (uppercase ASCII).
    Base(u8),
    /// The locus falls inside a deletion of the given length.
    Deletion {
        /// Length of the whole deletion in the read's CIGAR.
        length: u32,
    },
}

/// One read's contribution to a pileup column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PileupElement {
    /// Sample the read belongs to.
    pub sample: Arc<str>,
    /// Base or deletion marker.
    pub kind: ElementKind,
    /// Whether an insertion follows this position in the read.
    pub before_insertion: bool,
}

impl PileupElement {
    /// A plain aligned base.
    pub fn base(sample: impl Into<Arc<str>>, base: u8) -> Self {
        Self {
            sample: sample.into(),
            kind: ElementKind::Base(base.to_ascii_uppercase()),
            before_insertion: false,
        }
    }

    /// A base immediately followed by an insertion.
    pub fn insertion(sample: impl Into<Arc<str>>, base: u8) -> Self {
        Self {
            before_insertion: true,
            ..Self::base(sample, base)
        }
    }

    /// A deletion marker of the given length.
    pub fn deletion(sample: impl Into<Arc<str>>, length: u32) -> Self {
        Self {
            sample: sample.into(),
            kind: ElementKind::Deletion { length },
            before_insertion: false,
        }
    }

    /// Sequenced base, if this element is not a deletion.
    pub fn base_value(&self) -> Option<u8> {
        match self.kind {
            ElementKind::Base(base) => Some(base),
            ElementKind::Deletion { .. } => None,
        }
    }
}

/// Filtered pileup column handed to a walker for one locus.
#[derive(Debug, Clone)]
pub struct LocusColumn {
    /// Position of the column.
    pub locus: Locus,
    /// Reference base at the position (as found in the reference).
    pub reference_base: u8,
    /// Aligned evidence, already restricted by base and mapping quality.
    pub elements: Vec<PileupElement>,
}

impl LocusColumn {
    /// Construct a column from its parts.
    pub fn new(locus: Locus, reference_base: u8, elements: Vec<PileupElement>) -> Self {
        Self {
            locus,
            reference_base,
            elements,
        }
    }

    /// Whether the reference base is one of `ACGT` (any case).
    pub fn has_known_reference(&self) -> bool {
        matches!(self.reference_base.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T')
    }

    /// Number of elements in the column, deletions included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether no read covers the locus.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// One entry of the sequence dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigEntry {
    /// Contig name.
    pub name: Arc<str>,
    /// Contig length in bases.
    pub length: u64,
}

/// Ordered contigs of the reference; the index of an entry is its `tid`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceDictionary {
    entries: Vec<ContigEntry>,
}

impl SequenceDictionary {
    /// Build a dictionary from `(name, length)` pairs in reference order.
    pub fn new<N: Into<Arc<str>>>(contigs: impl IntoIterator<Item = (N, u64)>) -> Self {
        Self {
            entries: contigs
                .into_iter()
                .map(|(name, length)| ContigEntry {
                    name: name.into(),
                    length,
                })
                .collect(),
        }
    }

    /// Entry for a contig index.
    pub fn get(&self, tid: u32) -> Option<&ContigEntry> {
        self.entries.get(tid as usize)
    }

    /// Contig index for a name.
    pub fn tid(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .position(|entry| entry.name.as_ref() == name)
            .map(|idx| idx as u32)
    }

    /// Entries in reference order.
    pub fn iter(&self) -> impl Iterator<Item = &ContigEntry> {
        self.entries.iter()
    }

    /// Number of contigs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no contigs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
