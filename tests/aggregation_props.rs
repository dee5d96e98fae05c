use std::sync::Arc;

use locuswalk::genomics::{
    merge_intervals, EmittedInterval, IntervalAccumulator, IntervalSet, Locus, MissingGenotypes,
};
use locuswalk::plugin::CallStats;
use proptest::prelude::*;

fn interval() -> impl Strategy<Value = EmittedInterval> {
    (0u32..3, 1u32..500, 0u32..40).prop_map(|(tid, start, span)| {
        EmittedInterval::new(tid, format!("chr{}", tid + 1), start, start + span)
    })
}

fn accumulator(intervals: &[EmittedInterval]) -> IntervalAccumulator {
    let acc = IntervalAccumulator::new();
    for interval in intervals {
        acc.insert(interval.clone());
    }
    acc
}

fn stats() -> impl Strategy<Value = CallStats> {
    (0u64..1000, 0u64..1000, 0u64..1000, 0u64..1000, 0u64..1000).prop_map(
        |(loci, emitted, suppressed, no_calls, ambiguous)| CallStats {
            loci,
            emitted,
            suppressed,
            no_calls,
            ambiguous,
        },
    )
}

fn missing(samples: &[u8]) -> MissingGenotypes {
    let names: Vec<Arc<str>> = ["s1", "s2", "s3"].iter().map(|&s| Arc::from(s)).collect();
    let mut missing = MissingGenotypes::new();
    for &idx in samples {
        missing.add(&names[idx as usize % names.len()]);
    }
    missing
}

proptest! {
    #[test]
    fn accumulator_combine_ignores_grouping_and_order(
        a in proptest::collection::vec(interval(), 0..20),
        b in proptest::collection::vec(interval(), 0..20),
        c in proptest::collection::vec(interval(), 0..20),
    ) {
        let left = accumulator(&a).combine(accumulator(&b)).combine(accumulator(&c));
        let right = accumulator(&a).combine(accumulator(&b).combine(accumulator(&c)));
        let swapped = accumulator(&c).combine(accumulator(&a)).combine(accumulator(&b));

        let expected = left.finalize();
        prop_assert_eq!(&expected, &right.finalize());
        prop_assert_eq!(&expected, &swapped.finalize());
    }

    #[test]
    fn finalize_is_idempotent(intervals in proptest::collection::vec(interval(), 0..40)) {
        let acc = accumulator(&intervals);
        let first = acc.finalize();
        prop_assert_eq!(acc.len(), first.len());
        prop_assert_eq!(first, acc.finalize());
    }

    #[test]
    fn merged_intervals_are_disjoint_and_cover_inputs(
        intervals in proptest::collection::vec(interval(), 1..40),
    ) {
        let merged = merge_intervals(intervals.clone());
        for pair in merged.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            prop_assert!(prev.tid < next.tid || prev.end + 1 < next.start, "{} touches {}", prev, next);
        }

        let set = IntervalSet::from_intervals(intervals.clone());
        for iv in &intervals {
            for position in [iv.start, iv.end, (iv.start + iv.end) / 2] {
                let locus = Locus::new(iv.tid, Arc::clone(&iv.contig), position);
                prop_assert!(set.contains(&locus), "{} not covered", locus);
            }
        }
        prop_assert!(!set.contains(&Locus::new(7, "chr8", 1)));
    }

    #[test]
    fn call_stats_addition_is_associative(a in stats(), b in stats(), c in stats()) {
        prop_assert_eq!((a + b) + c, a + (b + c));
        prop_assert_eq!(a + CallStats::default(), a);
    }

    #[test]
    fn missing_counts_combine_in_any_order(
        a in proptest::collection::vec(0u8..3, 0..30),
        b in proptest::collection::vec(0u8..3, 0..30),
    ) {
        let forward = missing(&a).combine(missing(&b));
        let backward = missing(&b).combine(missing(&a));
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(forward.total(), (a.len() + b.len()) as u64);
    }
}
