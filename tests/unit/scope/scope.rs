use rand::{Rng, SeedableRng};

use super::*;
use crate::source::MemorySource;

fn params(window_size: usize, max_nudge: usize) -> ScopeParams {
    ScopeParams {
        samples_per_frame: 4,
        window_size,
        max_nudge,
        similarity_window: window_size,
        drift_window: 0,
        stereo: false,
        amplification: 1.0,
        trigger_threshold: 0.1,
        similarity_bias: 1.0,
        peak_threshold: 0.9,
        peak_bias: 0.5,
        avoid_drift_bias: 1.0,
    }
}

/// Internal buffer whose search range (starting at `window_size / 2`) is `range`.
fn buffer_with_range(p: &ScopeParams, range: &[f32]) -> Vec<f32> {
    let mut floats = vec![-1.0f32; p.window_size / 2];
    floats.extend_from_slice(range);
    floats.resize(p.internal_size(), -1.0);
    floats
}

#[test]
fn shift_in_keeps_newest_values_at_the_back() {
    let mut dest = [1, 2, 3, 4, 5];
    shift_in(&mut dest, &[6, 7], 2);
    assert_eq!(dest, [3, 4, 5, 6, 7]);

    shift_in(&mut dest, &[8], 3);
    assert_eq!(dest, [6, 7, 8, 0, 0]);

    // longer than dest: only the tail survives
    shift_in(&mut dest, &[1, 2, 3, 4, 5, 6, 7], 1);
    assert_eq!(dest, [3, 4, 5, 6, 7]);
}

#[test]
fn shift_in_empty_drains_within_ceil_len_over_min_size() {
    for len in 1..20usize {
        for min_size in 1..8usize {
            let mut dest: Vec<i32> = (1..=len as i32).collect();
            let limit = len.div_ceil(min_size);
            for _ in 0..limit {
                shift_in(&mut dest, &[], min_size);
            }
            assert!(dest.iter().all(|&v| v == 0), "len={len} min_size={min_size}");
        }
    }
}

#[test]
fn single_rising_edge_anchors_at_zero_upcrossing() {
    let p = params(4, 8);
    let floats = buffer_with_range(&p, &[-1.0, -0.5, 0.0, 0.5, 1.0, 0.5, 0.0, -0.5]);

    let candidates = nudge_candidates(&p, &floats);
    assert_eq!(
        candidates,
        vec![NudgeCandidate {
            offset: 3,
            distance: 0,
            precedes_peak: true
        }]
    );

    let choice = find_best_nudge(&p, &floats, &[0.0; 4]).unwrap();
    assert_eq!(choice.candidate.offset, 3);
}

#[test]
fn no_rising_edge_yields_none() {
    let p = params(4, 8);
    assert!(find_best_nudge(&p, &[0.0; 12], &[0.0; 4]).is_none());

    // rises past +trigger without first rising past -trigger
    let floats = buffer_with_range(&p, &[0.0, 0.5, 1.0, 0.5, 0.0, 0.0, 0.0, 0.0]);
    assert!(find_best_nudge(&p, &floats, &[0.0; 4]).is_none());
}

fn two_pulse_range() -> Vec<f32> {
    let mut range = vec![-1.0f32; 16];
    range[1] = 0.5;
    range[2] = 1.0;
    range[9] = 0.5;
    range[10] = 1.0;
    range
}

#[test]
fn drift_neighborhoods_split_at_midpoints() {
    let mut p = params(4, 16);
    p.drift_window = 10;
    let floats = buffer_with_range(&p, &two_pulse_range());

    let candidates = nudge_candidates(&p, &floats);
    let offsets: Vec<usize> = candidates.iter().map(|c| c.offset).collect();
    assert_eq!(offsets, (0..16).collect::<Vec<_>>());

    let at = |o: usize| candidates[o];
    assert_eq!(at(5).distance, 4);
    assert_eq!(at(6).distance, -3);
    assert!(at(2).precedes_peak && !at(3).precedes_peak);
    assert!(at(10).precedes_peak && !at(11).precedes_peak);
}

#[test]
fn drift_window_is_bounded_by_search_range() {
    let mut p = params(4, 8);
    p.drift_window = 3;
    let floats = buffer_with_range(&p, &[-1.0, -0.5, 0.0, 0.5, 1.0, 0.5, 0.0, -0.5]);
    let offsets: Vec<usize> = nudge_candidates(&p, &floats)
        .iter()
        .map(|c| c.offset)
        .collect();
    assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn equal_error_keeps_first_candidate() {
    let p = params(4, 16);
    let floats = buffer_with_range(&p, &two_pulse_range());
    let choice = find_best_nudge(&p, &floats, &[0.0; 4]).unwrap();
    assert_eq!(choice.candidate.offset, 1);
}

#[test]
fn similarity_prefers_window_matching_previous_output() {
    let p = ScopeParams {
        peak_bias: 0.0,
        ..params(4, 16)
    };
    let mut range = two_pulse_range();
    // make the second pulse's window distinct
    range[8] = -0.5;
    let floats = buffer_with_range(&p, &range);
    let prev: Vec<f32> = floats[9..13].to_vec();
    let choice = find_best_nudge(&p, &floats, &prev).unwrap();
    assert_eq!(choice.candidate.offset, 9);
    assert!(choice.error.abs() < 1e-12);
}

#[test]
fn validate_rejects_similarity_longer_than_window() {
    let mut p = params(4, 8);
    p.similarity_window = 5;
    assert!(p.validate().is_err());
    p.similarity_window = 4;
    p.samples_per_frame = 0;
    assert!(p.validate().is_err());
}

fn scope_over(p: ScopeParams, data: Vec<f32>, channels: u16) -> Scope {
    Scope::new(p, Box::new(MemorySource::new(48_000, channels, data))).unwrap()
}

#[test]
fn nudge_stays_in_range_for_silence_and_noise() {
    let mut p = params(64, 32);
    p.samples_per_frame = 48;
    p.similarity_window = 32;
    p.drift_window = 8;

    let mut silent = scope_over(p.clone(), vec![0.0; 48 * 10], 1);
    for _ in 0..10 {
        silent.next_wave_data().unwrap();
        assert_eq!(silent.nudge_amount(), 0);
        assert!(silent.no_good_nudge());
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let noise: Vec<f32> = (0..48 * 40).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let mut noisy = scope_over(p.clone(), noise, 1);
    for _ in 0..45 {
        noisy.next_wave_data().unwrap();
        assert!(noisy.nudge_amount() <= p.max_nudge);
        assert_eq!(noisy.left_samples().len(), p.window_size);
    }
    assert!(!noisy.is_playing());
}

#[test]
fn sine_with_window_length_period_is_phase_stable() {
    // 25 Hz at 48 kHz: the period equals the 40 ms display window.
    let p = ScopeParams {
        samples_per_frame: 1600,
        window_size: 1920,
        max_nudge: 3840,
        similarity_window: 1920,
        ..params(1920, 3840)
    };
    let src = MemorySource::sine(48_000, 25.0, 0.5, 1600 * 24);
    let mut scope = Scope::new(p, Box::new(src)).unwrap();

    let mut prev: Option<Vec<f32>> = None;
    for frame in 0..20 {
        scope.next_wave_data().unwrap();
        if frame < 5 {
            continue;
        }
        assert!(!scope.no_good_nudge(), "frame {frame}");
        let out = scope.left_samples().to_vec();
        if let Some(prev) = &prev {
            let max_diff = out
                .iter()
                .zip(prev)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max);
            // one sample of phase at this frequency moves the wave by at most ~0.0016
            assert!(max_diff < 0.002, "frame {frame}: max diff {max_diff}");
        }
        prev = Some(out);
    }
}

#[test]
fn demux_averages_stereo_for_mono_output_and_duplicates_mono_for_stereo() {
    let mut p = params(4, 0);
    p.similarity_window = 0;
    p.samples_per_frame = 4;

    let stereo_src: Vec<f32> = [1.0, 0.0].repeat(4);
    let mut mono_scope = scope_over(p.clone(), stereo_src, 2);
    mono_scope.next_wave_data().unwrap();
    assert_eq!(mono_scope.left_samples(), &[0.5; 4]);

    p.stereo = true;
    let mut stereo_scope = scope_over(p.clone(), vec![0.25; 4], 1);
    stereo_scope.next_wave_data().unwrap();
    assert_eq!(stereo_scope.left_samples(), &[0.25; 4]);
    assert_eq!(stereo_scope.right_samples(), &[0.25; 4]);

    let mut amplified = scope_over(
        ScopeParams {
            amplification: 2.0,
            ..p
        },
        [0.25, -0.25].repeat(4),
        2,
    );
    amplified.next_wave_data().unwrap();
    assert_eq!(amplified.left_samples(), &[0.5; 4]);
    assert_eq!(amplified.right_samples(), &[-0.5; 4]);
}

#[test]
fn end_of_stream_decays_to_silence_and_reports_progress() {
    let mut p = params(4, 0);
    p.similarity_window = 0;
    let mut scope = scope_over(p, vec![1.0; 8], 1);

    scope.next_wave_data().unwrap();
    assert!((scope.progress() - 0.5).abs() < 1e-12);
    scope.next_wave_data().unwrap();
    assert_eq!(scope.left_samples(), &[1.0; 4]);
    assert!(!scope.is_playing());
    assert_eq!(scope.progress(), 1.0);

    scope.next_wave_data().unwrap();
    assert_eq!(scope.left_samples(), &[0.0; 4]);
    assert_eq!(scope.consumed_samples(), 8);
}
