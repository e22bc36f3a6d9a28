//! Integration tests for the dual-indexed sample store and range set
//!
//! Covers ordering of both views under arbitrary insertion order, removal
//! bookkeeping, and consistency between stored samples and range sets.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sourcebuf_core::*;

fn ms(value: i64) -> MediaTime {
    MediaTime::from_millis(value)
}

/// 30 fps video with a B-frame pattern: decode order I P B B P B B ...
fn reordered_stream(count: i64) -> Vec<Sample> {
    let frame = MediaTime::new(1, 30);
    (0..count)
        .map(|index| {
            let pts_index = match index % 3 {
                0 => index,
                1 => index + 1,
                _ => index - 1,
            };
            Sample::new(
                "video",
                frame.mul_int(pts_index),
                frame.mul_int(index),
                frame,
                index % 30 == 0,
                Bytes::from(vec![index as u8; 100]),
            )
        })
        .collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_shuffled_insertion_preserves_both_orders() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10 {
        let mut samples = reordered_stream(90);
        samples.shuffle(&mut rng);

        let mut map = SampleMap::new();
        for sample in samples {
            map.insert(sample).unwrap();
        }

        let decode: Vec<MediaTime> = map.iter_decode().map(|s| s.decode_time()).collect();
        assert!(decode.windows(2).all(|w| w[0] < w[1]));

        let presentation: Vec<MediaTime> =
            map.iter_presentation().map(|s| s.presentation_time()).collect();
        assert!(presentation.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(decode.len(), 90);
        assert_eq!(map.total_size(), 9000);
    }
}

#[test]
fn test_random_removal_keeps_views_consistent() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut map = SampleMap::new();
    for sample in reordered_stream(120) {
        map.insert(sample).unwrap();
    }

    for _ in 0..20 {
        let start = rng.gen_range(0..4000);
        let length = rng.gen_range(1..400);
        let removed = map.remove_range(ms(start), ms(start + length));
        for sample in &removed {
            assert!(sample.presentation_time() >= ms(start));
            assert!(sample.presentation_time() < ms(start + length));
            assert!(map.find_by_decode_time(sample.decode_time()).is_none());
        }
        assert_eq!(map.iter_decode().count(), map.iter_presentation().count());
        let size: usize = map.iter_decode().map(|s| s.size()).sum();
        assert_eq!(size, map.total_size());
    }
}

// ============================================================================
// Round trip against the range set
// ============================================================================

#[test]
fn test_buffered_ranges_match_stored_samples() {
    let mut map = SampleMap::new();
    let mut buffered = TimeRanges::new();
    for sample in reordered_stream(60) {
        buffered.add(sample.presentation_time(), sample.presentation_end());
        map.insert(sample).unwrap();
    }

    assert_eq!(buffered.len(), 1);
    assert_eq!(buffered.start(0), Some(MediaTime::ZERO));
    assert_eq!(buffered.end(0), Some(MediaTime::from_seconds(2)));

    for sample in map.iter_presentation() {
        let midpoint = sample.presentation_time() + MediaTime::new(1, 60);
        let found = map.find_containing(midpoint).expect("sample covers midpoint");
        assert_eq!(found.decode_time(), sample.decode_time());
        assert!(buffered.contains(midpoint));
    }
}

#[test]
fn test_mixed_timescales_collapse_to_single_key() {
    let mut map = SampleMap::new();
    map.insert(Sample::new(
        "audio",
        MediaTime::new(1024, 48_000),
        MediaTime::new(1024, 48_000),
        MediaTime::new(1024, 48_000),
        true,
        Bytes::new(),
    ))
    .unwrap();

    let duplicate = map.insert(Sample::new(
        "audio",
        MediaTime::from_micros(21_333),
        MediaTime::new(2048, 96_000),
        MediaTime::new(1024, 48_000),
        true,
        Bytes::new(),
    ));
    assert!(matches!(
        duplicate,
        Err(CoreError::DuplicateDecodeTimestamp { .. })
    ));
}
