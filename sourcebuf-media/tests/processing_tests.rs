//! Integration tests for coded frame processing
//!
//! Drives [`CodedFrameProcessor`] against hand-built track maps and checks
//! buffered ranges, overlap resolution and the cross-track discontinuity
//! reset.

use bytes::Bytes;
use sourcebuf_core::{MediaKind, MediaTime, Sample, TrackId};
use sourcebuf_media::*;

fn secs(value: i64) -> MediaTime {
    MediaTime::from_seconds(value)
}

fn ms(value: i64) -> MediaTime {
    MediaTime::from_millis(value)
}

fn tracks(declared: &[(&str, MediaKind)]) -> TrackBufferMap {
    let mut map = TrackBufferMap::new();
    for (id, kind) in declared {
        map.insert_track(TrackBuffer::new(TrackDescription::new(*id, *kind, "test"), usize::MAX));
    }
    map
}

fn frame(track: &str, pts: MediaTime, dts: MediaTime, duration: MediaTime, sync: bool) -> Sample {
    Sample::new(track, pts, dts, duration, sync, Bytes::from_static(b"payload"))
}

fn process_all(processor: &mut CodedFrameProcessor, map: &mut TrackBufferMap, frames: Vec<Sample>) {
    let context = AppendContext::default();
    for sample in frames {
        processor.process_sample(map, sample, &context).unwrap();
    }
}

fn frames_every(track: &str, start_ms: i64, count: i64, duration_ms: i64) -> Vec<Sample> {
    (0..count)
        .map(|index| {
            let time = ms(start_ms + index * duration_ms);
            frame(track, time, time, ms(duration_ms), true)
        })
        .collect()
}

fn assert_presentation_disjoint(map: &TrackBufferMap, track: &str) {
    let buffer = map.get(&TrackId::new(track)).unwrap();
    let mut previous_end: Option<MediaTime> = None;
    for sample in buffer.samples().iter_presentation() {
        if let Some(end) = previous_end {
            assert!(
                sample.presentation_time() >= end,
                "frame at {} overlaps a frame ending at {}",
                sample.presentation_time(),
                end
            );
        }
        previous_end = Some(sample.presentation_end());
    }
}

// ============================================================================
// BUFFERED RANGE TESTS
// ============================================================================

#[test]
fn test_contiguous_sync_frames_form_one_range() {
    let mut map = tracks(&[("v", MediaKind::Video)]);
    let mut processor = CodedFrameProcessor::new();

    process_all(
        &mut processor,
        &mut map,
        vec![
            frame("v", secs(0), secs(0), secs(1), true),
            frame("v", secs(1), secs(1), secs(1), true),
            frame("v", secs(2), secs(2), secs(1), true),
        ],
    );

    assert_eq!(map.buffered().len(), 1);
    assert_eq!(map.buffered().start(0), Some(secs(0)));
    assert_eq!(map.buffered().end(0), Some(secs(3)));
    assert_eq!(map.highest_presentation_end(), Some(secs(3)));
    assert_eq!(processor.stats().frames_added, 3);
}

#[test]
fn test_overlapping_sync_frame_replaces_later_frames() {
    let mut map = tracks(&[("v", MediaKind::Video)]);
    let mut processor = CodedFrameProcessor::new();

    process_all(
        &mut processor,
        &mut map,
        vec![
            frame("v", secs(0), secs(0), secs(1), true),
            frame("v", secs(1), secs(1), secs(1), true),
            frame("v", ms(500), ms(500), secs(1), true),
        ],
    );

    let buffer = map.get(&TrackId::new("v")).unwrap();
    let starts: Vec<_> = buffer.samples().iter_presentation().map(|s| s.presentation_time()).collect();
    assert_eq!(starts, vec![secs(0), ms(500)]);

    assert_eq!(map.buffered().len(), 1);
    assert_eq!(map.buffered().start(0), Some(secs(0)));
    assert_eq!(map.buffered().end(0), Some(ms(1500)));
    assert_eq!(processor.stats().samples_replaced, 1);
}

#[test]
fn test_reordered_frames_keep_both_orders() {
    let mut map = tracks(&[("v", MediaKind::Video)]);
    let mut processor = CodedFrameProcessor::new();

    // I0 P3 B1 B2 in decode order
    process_all(
        &mut processor,
        &mut map,
        vec![
            frame("v", ms(0), ms(0), ms(100), true),
            frame("v", ms(300), ms(100), ms(100), false),
            frame("v", ms(100), ms(200), ms(100), false),
            frame("v", ms(200), ms(300), ms(100), false),
        ],
    );

    let buffer = map.get(&TrackId::new("v")).unwrap();
    let decode: Vec<_> = buffer.samples().iter_decode().map(|s| s.presentation_time()).collect();
    assert_eq!(decode, vec![ms(0), ms(300), ms(100), ms(200)]);
    let presentation: Vec<_> = buffer.samples().iter_presentation().map(|s| s.presentation_time()).collect();
    assert_eq!(presentation, vec![ms(0), ms(100), ms(200), ms(300)]);

    assert_eq!(map.buffered().len(), 1);
    assert!(map.buffered().contains_range(ms(0), ms(400)));
    assert_eq!(processor.stats().discontinuities, 0);
}

// ============================================================================
// RANDOM ACCESS AND DEPENDENCY TESTS
// ============================================================================

#[test]
fn test_frames_before_first_sync_are_dropped() {
    let mut map = tracks(&[("v", MediaKind::Video)]);
    let mut processor = CodedFrameProcessor::new();
    let context = AppendContext::default();

    let outcome = processor
        .process_sample(&mut map, frame("v", ms(0), ms(0), ms(40), false), &context)
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Dropped(DropReason::NeedRandomAccessPoint));

    for (time, sync) in [(40, true), (80, false), (120, false)] {
        let outcome = processor
            .process_sample(&mut map, frame("v", ms(time), ms(time), ms(40), sync), &context)
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Added);
    }

    assert_eq!(processor.stats().frames_dropped, 1);
    assert!(map.buffered().contains_range(ms(40), ms(160)));
    assert!(!map.buffered().contains(ms(20)));
}

#[test]
fn test_replacing_a_reference_frame_removes_its_dependents() {
    let mut map = tracks(&[("v", MediaKind::Video)]);
    let mut processor = CodedFrameProcessor::new();

    process_all(
        &mut processor,
        &mut map,
        vec![
            frame("v", secs(0), secs(0), secs(1), true),
            frame("v", secs(1), secs(1), secs(1), false),
            frame("v", secs(2), secs(2), secs(1), false),
            frame("v", secs(3), secs(3), secs(1), true),
            frame("v", secs(4), secs(4), secs(1), false),
        ],
    );
    process_all(&mut processor, &mut map, vec![frame("v", secs(1), secs(1), secs(1), true)]);

    let buffer = map.get(&TrackId::new("v")).unwrap();
    let remaining: Vec<_> = buffer.samples().iter_decode().map(|s| (s.decode_time(), s.is_sync())).collect();
    assert_eq!(
        remaining,
        vec![(secs(0), true), (secs(1), true), (secs(3), true), (secs(4), false)]
    );
    assert_eq!(map.buffered().len(), 2);
    assert!(map.buffered().contains_range(secs(0), secs(2)));
    assert!(!map.buffered().contains(ms(2500)));
    assert!(map.buffered().contains_range(secs(3), secs(5)));
}

// ============================================================================
// DISCONTINUITY AND TIMESTAMP TESTS
// ============================================================================

#[test]
fn test_discontinuity_resets_every_track() {
    let mut map = tracks(&[("a", MediaKind::Audio), ("v", MediaKind::Video)]);
    let mut processor = CodedFrameProcessor::new();

    process_all(
        &mut processor,
        &mut map,
        vec![
            frame("a", ms(0), ms(0), ms(20), true),
            frame("v", ms(0), ms(0), ms(40), true),
            frame("a", ms(20), ms(20), ms(20), true),
            frame("v", secs(10), secs(10), ms(40), true),
        ],
    );

    assert_eq!(processor.stats().discontinuities, 1);
    let audio = map.get(&TrackId::new("a")).unwrap();
    assert!(audio.last_decode_timestamp().is_none());
    assert!(audio.highest_presentation_timestamp().is_none());
    assert!(audio.needs_random_access_point());

    let video = map.get(&TrackId::new("v")).unwrap();
    assert_eq!(video.last_decode_timestamp(), Some(secs(10)));
    assert_eq!(map.highest_presentation_end(), Some(ms(10_040)));
}

#[test]
fn test_timestamp_offset_shifts_frames() {
    let mut map = tracks(&[("v", MediaKind::Video)]);
    let mut processor = CodedFrameProcessor::new();
    let context = AppendContext {
        timestamp_offset: secs(5),
        append_window: AppendWindow::default(),
    };

    processor
        .process_sample(&mut map, frame("v", secs(0), secs(0), secs(1), true), &context)
        .unwrap();

    assert_eq!(map.buffered().start(0), Some(secs(5)));
    assert_eq!(map.buffered().end(0), Some(secs(6)));
}

#[test]
fn test_negative_offset_timestamp_is_decode_error() {
    let mut map = tracks(&[("v", MediaKind::Video)]);
    let mut processor = CodedFrameProcessor::new();
    let context = AppendContext {
        timestamp_offset: -secs(2),
        append_window: AppendWindow::default(),
    };

    let result = processor.process_sample(&mut map, frame("v", secs(1), secs(1), secs(1), true), &context);
    assert!(matches!(result, Err(SourceBufferError::Decode { .. })));
    assert!(map.buffered().is_empty());
}

#[test]
fn test_epsilon_controls_replacement_of_contained_frame() {
    let config = ProcessingConfig {
        overlap_epsilon: ms(10),
        merge_audio_gaps: false,
    };
    let mut map = tracks(&[("a", MediaKind::Audio)]);
    let mut processor = CodedFrameProcessor::with_config(config);

    process_all(&mut processor, &mut map, vec![frame("a", ms(100), ms(100), ms(100), true)]);
    map.reset_rolling_state();
    process_all(&mut processor, &mut map, vec![frame("a", ms(105), ms(105), ms(100), true)]);

    let buffer = map.get(&TrackId::new("a")).unwrap();
    let starts: Vec<_> = buffer.samples().iter_presentation().map(|s| s.presentation_time()).collect();
    assert_eq!(starts, vec![ms(105)]);
    assert!(map.buffered().contains_range(ms(105), ms(205)));
}

#[test]
fn test_reappended_frames_never_overlap_stored_frames() {
    let mut map = tracks(&[("v", MediaKind::Video)]);
    let mut processor = CodedFrameProcessor::new();

    process_all(&mut processor, &mut map, frames_every("v", 0, 20, 100));
    assert_presentation_disjoint(&map, "v");

    // Longer frames over the middle of the buffer
    process_all(&mut processor, &mut map, frames_every("v", 500, 4, 250));
    assert_presentation_disjoint(&map, "v");
    assert_eq!(map.get(&TrackId::new("v")).unwrap().samples().len(), 14);

    // The original frames again
    process_all(&mut processor, &mut map, frames_every("v", 0, 20, 100));
    assert_presentation_disjoint(&map, "v");

    let buffer = map.get(&TrackId::new("v")).unwrap();
    assert_eq!(buffer.samples().len(), 20);
    assert_eq!(map.buffered().len(), 1);
    assert_eq!(map.buffered().end(0), Some(secs(2)));
}
