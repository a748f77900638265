//! Round-trip properties for the merged volume address space.

use proptest::prelude::*;
use sevenz_io::{ReadAt, VolumeSet, VolumeSource};

/// Split `data` at the given cut points and wrap the pieces in a set.
fn partitioned(data: &[u8], cuts: &[usize]) -> VolumeSet {
    let mut cuts: Vec<usize> = cuts.iter().map(|&c| c.min(data.len())).collect();
    cuts.sort_unstable();

    let mut sources: Vec<VolumeSource> = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        sources.push(Box::new(data[start..cut].to_vec()));
        start = cut;
    }
    sources.push(Box::new(data[start..].to_vec()));

    VolumeSet::new(sources)
}

proptest! {
    #[test]
    fn any_subrange_matches_the_flat_buffer(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        cuts in proptest::collection::vec(0usize..512, 0..8),
        a in 0usize..512,
        b in 0usize..512,
    ) {
        let set = partitioned(&data, &cuts);
        prop_assert_eq!(set.size(), data.len() as u64);

        let (a, b) = (a.min(b).min(data.len()), a.max(b).min(data.len()));
        let mut buf = vec![0u8; b - a];
        let n = set.read_at(&mut buf, a as u64).unwrap();

        prop_assert_eq!(n, b - a);
        prop_assert_eq!(&buf[..], &data[a..b]);
    }

    #[test]
    fn reads_past_the_end_are_empty_and_clean(
        data in proptest::collection::vec(any::<u8>(), 0..256),
        cuts in proptest::collection::vec(0usize..256, 0..4),
        past in 0u64..1024,
    ) {
        let set = partitioned(&data, &cuts);
        let mut buf = [0u8; 32];

        let n = set.read_at(&mut buf, data.len() as u64 + past).unwrap();
        prop_assert_eq!(n, 0);
    }
}
