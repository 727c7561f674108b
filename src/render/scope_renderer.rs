use rayon::prelude::*;

use crate::config::{ChannelConfig, GlobalConfig, RenderJob};
use crate::events::EventTracker;
use crate::foundation::core::{Canvas, FrameIndex, Rgba8, samples_per_frame};
use crate::foundation::error::{DecodeError, WavescopeError, WavescopeResult};
use crate::render::frame::FrameRGBA;
use crate::render::layout::{ChannelStyle, GridLayout, PaintInfo};
use crate::render::paint::{paint_border_layer, paint_subframe};
use crate::render::text::LabelTypesetter;
use crate::scope::Scope;
use crate::source::{ReadOutcome, SampleSource, SourceEventKind, SourceProvider, open_provider};

/// Grid geometry, per-channel paint state and the painting pool shared by every renderer.
pub struct BaseRenderer {
    grid: GridLayout,
    background: Rgba8,
    border_thickness: f64,
    border_layer: Option<FrameRGBA>,
    paint_infos: Vec<PaintInfo>,
    typesetter: Option<LabelTypesetter>,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for BaseRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseRenderer")
            .field("grid", &self.grid)
            .field("channels", &self.paint_infos.len())
            .field("typesetter", &self.typesetter)
            .finish_non_exhaustive()
    }
}

impl BaseRenderer {
    pub fn new(
        channels: &[ChannelConfig],
        global: &GlobalConfig,
        typesetter: Option<LabelTypesetter>,
    ) -> WavescopeResult<Self> {
        global.validate()?;
        let canvas = global.canvas()?;
        let grid = GridLayout::new(canvas, channels.len(), global.num_rows_or_cols, global.order)?;

        let paint_infos = channels
            .iter()
            .enumerate()
            .map(|(i, ch)| PaintInfo::new(grid.cell_rect(i), ChannelStyle::from(ch)))
            .collect();

        let mut base = Self {
            grid,
            background: global.background_color,
            border_thickness: global.border_thickness,
            border_layer: paint_border_layer(&grid, global.border_color, global.border_thickness)?,
            paint_infos,
            typesetter,
            pool: build_thread_pool(global.render_threads)?,
        };
        for i in 0..base.paint_infos.len() {
            base.layout_label(i)?;
        }
        Ok(base)
    }

    pub fn canvas(&self) -> Canvas {
        self.grid.canvas
    }

    pub fn grid(&self) -> &GridLayout {
        &self.grid
    }

    pub fn paint_infos(&self) -> &[PaintInfo] {
        &self.paint_infos
    }

    /// Record a program or bank change on MIDI channel `channel` and relabel matching cells.
    pub fn apply_instrument_change(
        &mut self,
        channel: u8,
        program: Option<u8>,
        bank: Option<u8>,
    ) -> WavescopeResult<()> {
        for i in 0..self.paint_infos.len() {
            let info = &mut self.paint_infos[i];
            if !info.style.draw_labels || info.style.channel_number != usize::from(channel) {
                continue;
            }
            if let Some(p) = program {
                info.program = p;
            }
            if let Some(b) = bank {
                info.bank = b;
            }
            if info.update_label() {
                self.layout_label(i)?;
            }
        }
        Ok(())
    }

    fn layout_label(&mut self, index: usize) -> WavescopeResult<()> {
        let info = &mut self.paint_infos[index];
        info.label_layout = match self.typesetter.as_mut() {
            Some(ts) if info.style.draw_labels && !info.label.is_empty() => Some(ts.layout(
                &info.label,
                info.style.label_size,
                info.style.label_color,
            )?),
            _ => None,
        };
        Ok(())
    }

    /// Paint every cell in parallel, then composite in channel order and overlay the borders.
    ///
    /// `waves[i]` is the `(left, right)` display window of channel `i`.
    pub fn paint_frame(&self, waves: &[(&[f32], &[f32])]) -> WavescopeResult<FrameRGBA> {
        if waves.len() != self.paint_infos.len() {
            return Err(WavescopeError::validation(format!(
                "expected {} wave windows, got {}",
                self.paint_infos.len(),
                waves.len()
            )));
        }

        let infos = &self.paint_infos;
        let font = self.typesetter.as_ref().map(LabelTypesetter::font);
        let background = self.background;
        let border_thickness = self.border_thickness;

        let subframes = self.pool.install(|| {
            infos
                .par_iter()
                .zip(waves.par_iter())
                .map(|(info, (left, right))| {
                    paint_subframe(info, left, right, background, border_thickness, font)
                })
                .collect::<Vec<_>>()
        });

        let canvas = self.canvas();
        let mut frame = FrameRGBA::filled(canvas.width, canvas.height, background);
        for (info, sub) in infos.iter().zip(subframes) {
            let sub = sub?;
            frame.blit_over(&sub, info.rect.x0.floor() as u32, info.rect.y0.floor() as u32)?;
        }
        if let Some(layer) = &self.border_layer {
            frame.blit_over(layer, 0, 0)?;
        }
        Ok(frame)
    }
}

fn build_thread_pool(threads: Option<usize>) -> WavescopeResult<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(WavescopeError::config(
            "render_threads must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("wavescope-paint-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| WavescopeError::config(format!("failed to build paint thread pool: {e}")))
}

/// Export renderer: one stabilized [`Scope`] per channel, relabelled from source events.
pub struct ScopeRenderer {
    base: BaseRenderer,
    scopes: Vec<Scope>,
    events: EventTracker,
}

impl std::fmt::Debug for ScopeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeRenderer")
            .field("base", &self.base)
            .field("scopes", &self.scopes.len())
            .field("frame", &self.events.frame())
            .finish()
    }
}

impl ScopeRenderer {
    #[tracing::instrument(skip_all, fields(channels = channels.len()))]
    pub fn new(
        provider: &dyn SourceProvider,
        channels: &[ChannelConfig],
        global: &GlobalConfig,
        typesetter: Option<LabelTypesetter>,
    ) -> WavescopeResult<Self> {
        let base = BaseRenderer::new(channels, global, typesetter)?;
        let scopes = channels
            .iter()
            .map(|ch| {
                ch.scope_builder(global.fps, &[])?
                    .build_from_channel(provider, ch.channel_number)
            })
            .collect::<WavescopeResult<Vec<_>>>()?;
        let events = EventTracker::new(&provider.event_list(), global.fps);
        Ok(Self {
            base,
            scopes,
            events,
        })
    }

    /// Open the job's input and build a renderer over it.
    pub fn from_job(job: &RenderJob) -> WavescopeResult<Self> {
        let provider = open_provider(&job.input, &job.soundfonts)?;
        Self::from_provider(provider.as_ref(), job)
    }

    /// Build a renderer for `job` over an already opened provider.
    pub fn from_provider(provider: &dyn SourceProvider, job: &RenderJob) -> WavescopeResult<Self> {
        let typesetter = job
            .label_font
            .as_ref()
            .map(LabelTypesetter::from_path)
            .transpose()?;
        Self::new(provider, &job.channels, &job.global, typesetter)
    }

    pub fn base(&self) -> &BaseRenderer {
        &self.base
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Apply this frame's source events, then advance every scope by one frame.
    pub fn advance_frame(&mut self) -> WavescopeResult<()> {
        let events = self.events.next_events().to_vec();
        for ev in events {
            match ev.kind {
                SourceEventKind::Program(p) => {
                    self.base.apply_instrument_change(ev.channel, Some(p), None)?
                }
                SourceEventKind::Bank(b) => {
                    self.base.apply_instrument_change(ev.channel, None, Some(b))?
                }
                SourceEventKind::Tempo(_) => {}
            }
        }

        let scopes = &mut self.scopes;
        self.base
            .pool
            .install(|| scopes.par_iter_mut().try_for_each(Scope::next_wave_data))?;
        Ok(())
    }

    pub fn paint(&self) -> WavescopeResult<FrameRGBA> {
        let waves: Vec<(&[f32], &[f32])> = self
            .scopes
            .iter()
            .map(|s| (s.left_samples(), s.right_samples()))
            .collect();
        self.base.paint_frame(&waves)
    }

    /// Number of frames advanced so far.
    pub fn frames_advanced(&self) -> FrameIndex {
        FrameIndex(self.events.frame())
    }

    pub fn has_frames_remaining(&self) -> bool {
        self.scopes.iter().any(Scope::is_playing)
    }

    /// Mean consumed fraction over all scopes.
    pub fn progress(&self) -> f64 {
        if self.scopes.is_empty() {
            return 0.0;
        }
        self.scopes.iter().map(Scope::progress).sum::<f64>() / self.scopes.len() as f64
    }
}

/// Audio-track reader: one frame tick of interleaved samples per call.
pub struct Player {
    source: Box<dyn SampleSource>,
    buffer: Vec<f32>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("sample_rate", &self.source.sample_rate())
            .field("channels", &self.source.channels())
            .field("batch", &self.buffer.len())
            .finish()
    }
}

impl Player {
    pub fn new(source: Box<dyn SampleSource>, fps: u32) -> WavescopeResult<Self> {
        let spf = samples_per_frame(source.sample_rate(), fps)?;
        let len = spf * usize::from(source.channels());
        Ok(Self {
            source,
            buffer: vec![0.0; len],
        })
    }

    /// The job's full mix.
    pub fn from_job(job: &RenderJob) -> WavescopeResult<Self> {
        let provider = open_provider(&job.input, &job.soundfonts)?;
        Self::from_provider(provider.as_ref(), job.global.fps)
    }

    pub fn from_provider(provider: &dyn SourceProvider, fps: u32) -> WavescopeResult<Self> {
        Self::new(provider.open_mix()?, fps)
    }

    /// Read the next batch; a short or ended read is zero-padded to full size.
    pub fn next_wave_data(&mut self) -> Result<&[f32], DecodeError> {
        let len = self.buffer.len();
        match self.source.read(&mut self.buffer)? {
            ReadOutcome::Read(n) => self.buffer[n.min(len)..].fill(0.0),
            ReadOutcome::Ended => self.buffer.fill(0.0),
        }
        Ok(&self.buffer)
    }

    pub fn is_playing(&self) -> bool {
        self.source.is_playing()
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.source.channels()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/scope_renderer.rs"]
mod tests;
