use super::*;
use crate::config::ChannelOrder;
use crate::source::{EventList, MemoryProvider, MemorySource, SourceEvent};

fn small_global() -> GlobalConfig {
    GlobalConfig {
        width: 320,
        height: 240,
        num_rows_or_cols: 3,
        order: ChannelOrder::RowMajor,
        fps: 30,
        render_threads: Some(2),
        ..GlobalConfig::default()
    }
}

/// Memory channels plus a fixed control-event list.
struct EventfulProvider {
    inner: MemoryProvider,
    events: EventList,
}

impl SourceProvider for EventfulProvider {
    fn channel_count(&self) -> usize {
        self.inner.channel_count()
    }

    fn open_channel(
        &self,
        channel: usize,
        stereo: bool,
    ) -> Result<Box<dyn SampleSource>, DecodeError> {
        self.inner.open_channel(channel, stereo)
    }

    fn open_mix(&self) -> Result<Box<dyn SampleSource>, DecodeError> {
        self.inner.open_mix()
    }

    fn event_list(&self) -> EventList {
        self.events.clone()
    }
}

#[test]
fn silent_two_second_source_yields_sixty_frames() {
    let provider = MemoryProvider::silence(48_000, 3, 96_000);
    let channels: Vec<ChannelConfig> = (0..3).map(ChannelConfig::for_channel).collect();
    let mut r = ScopeRenderer::new(&provider, &channels, &small_global(), None).unwrap();
    assert_eq!(r.base().paint_infos().len(), 3);

    let mut frames = 0;
    while r.has_frames_remaining() {
        r.advance_frame().unwrap();
        let frame = r.paint().unwrap();
        assert_eq!((frame.width, frame.height), (320, 240));
        assert_eq!(frame.data.len(), 320 * 240 * 4);
        frames += 1;
    }
    assert_eq!(frames, 60);
    assert!((r.progress() - 1.0).abs() < 1e-12);
}

#[test]
fn progress_is_mean_of_scope_progress() {
    let provider = MemoryProvider::new(48_000, vec![vec![0.0; 3200], vec![0.0; 6400]]);
    let channels: Vec<ChannelConfig> = (0..2).map(ChannelConfig::for_channel).collect();
    let mut r = ScopeRenderer::new(&provider, &channels, &small_global(), None).unwrap();
    r.advance_frame().unwrap();
    // 1600 of 3200 and 1600 of 6400
    assert!((r.progress() - 0.375).abs() < 1e-12);
}

#[test]
fn program_changes_relabel_only_labelled_matching_channels() {
    let tick = |tick, channel, kind| SourceEvent {
        tick,
        channel,
        kind,
    };
    // ppqn 1 at the default 120 bpm: one tick is half a second
    let provider = EventfulProvider {
        inner: MemoryProvider::silence(48_000, 3, 48_000 * 3),
        events: EventList {
            ppqn: 1,
            events: vec![
                tick(0, 0, SourceEventKind::Program(40)),
                tick(0, 2, SourceEventKind::Program(40)),
                tick(3, 1, SourceEventKind::Program(73)),
            ],
        },
    };
    let mut channels: Vec<ChannelConfig> = (0..3)
        .map(|i| ChannelConfig {
            label_template: "%n %i".to_owned(),
            ..ChannelConfig::for_channel(i)
        })
        .collect();
    channels[2].draw_labels = false;

    let mut r = ScopeRenderer::new(&provider, &channels, &small_global(), None).unwrap();
    let labels = |r: &ScopeRenderer| -> Vec<String> {
        r.base().paint_infos().iter().map(|p| p.label.clone()).collect()
    };
    assert_eq!(labels(&r)[0], "1 Acoustic Grand Piano");

    r.advance_frame().unwrap();
    assert_eq!(
        labels(&r),
        vec!["1 Violin", "2 Acoustic Grand Piano", "3 Acoustic Grand Piano"]
    );

    for _ in 1..40 {
        r.advance_frame().unwrap();
    }
    assert_eq!(labels(&r)[1], "2 Acoustic Grand Piano");
    for _ in 40..50 {
        r.advance_frame().unwrap();
    }
    assert_eq!(labels(&r)[1], "2 Flute");
}

#[test]
fn paint_frame_checks_wave_count() {
    let channels: Vec<ChannelConfig> = (0..2).map(ChannelConfig::for_channel).collect();
    let base = BaseRenderer::new(&channels, &small_global(), None).unwrap();
    let wave: &[f32] = &[0.0; 8];
    assert!(base.paint_frame(&[(wave, wave)]).is_err());
    assert!(base.paint_frame(&[(wave, wave), (wave, wave)]).is_ok());
}

#[test]
fn composite_covers_background_and_borders() {
    let global = GlobalConfig {
        width: 40,
        height: 20,
        num_rows_or_cols: 2,
        background_color: Rgba8::rgb(0, 0, 40),
        border_color: Rgba8::rgb(200, 0, 0),
        border_thickness: 2.0,
        ..small_global()
    };
    let channels: Vec<ChannelConfig> = (0..2)
        .map(|i| ChannelConfig {
            draw_h_midline: false,
            draw_labels: false,
            thickness: 0.0,
            ..ChannelConfig::for_channel(i)
        })
        .collect();
    let base = BaseRenderer::new(&channels, &global, None).unwrap();
    let wave: &[f32] = &[0.0; 4];
    let frame = base.paint_frame(&[(wave, wave), (wave, wave)]).unwrap();
    assert_eq!(frame.pixel(5, 5), Some([0, 0, 40, 255]));
    assert_eq!(frame.pixel(20, 5), Some([200, 0, 0, 255]));
}

#[test]
fn player_pads_final_batch_and_reports_end() {
    let data: Vec<f32> = (0..50).map(|i| i as f32 + 1.0).collect();
    let src = MemorySource::new(100, 2, data);
    let mut player = Player::new(Box::new(src), 10).unwrap();
    assert_eq!(player.channels(), 2);

    assert_eq!(player.next_wave_data().unwrap().len(), 20);
    player.next_wave_data().unwrap();
    let last = player.next_wave_data().unwrap().to_vec();
    assert_eq!(&last[..10], &[41.0, 42.0, 43.0, 44.0, 45.0, 46.0, 47.0, 48.0, 49.0, 50.0]);
    assert!(last[10..].iter().all(|&s| s == 0.0));
    assert!(!player.is_playing());
    assert!(player.next_wave_data().unwrap().iter().all(|&s| s == 0.0));
}

#[test]
fn unknown_channel_is_a_decode_error() {
    let provider = MemoryProvider::silence(48_000, 1, 4800);
    let channels = vec![ChannelConfig::for_channel(4)];
    let err = ScopeRenderer::new(&provider, &channels, &small_global(), None).unwrap_err();
    assert!(matches!(err, WavescopeError::Decode(_)));
}

#[test]
fn player_short_read_clears_previous_batch() {
    // 10 mono samples per batch; the second read only yields 3
    let src = MemorySource::new(100, 1, vec![1.0f32; 13]);
    let mut player = Player::new(Box::new(src), 10).unwrap();
    assert!(player.next_wave_data().unwrap().iter().all(|&s| s == 1.0));

    let tail = player.next_wave_data().unwrap();
    assert_eq!(tail.len(), 10);
    assert_eq!(&tail[..3], &[1.0, 1.0, 1.0]);
    assert!(tail[3..].iter().all(|&s| s == 0.0));
}
