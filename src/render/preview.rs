use crate::config::{ChannelConfig, GlobalConfig};
use crate::foundation::error::WavescopeResult;
use crate::render::frame::FrameRGBA;
use crate::render::scope_renderer::BaseRenderer;
use crate::render::text::LabelTypesetter;

const PREVIEW_SAMPLES: usize = 120;

/// Static layout preview: every channel shows the same synthetic sine, nothing is decoded.
#[derive(Debug)]
pub struct PreviewRenderer {
    base: BaseRenderer,
    wave: Vec<f32>,
}

impl PreviewRenderer {
    pub fn new(
        channels: &[ChannelConfig],
        global: &GlobalConfig,
        typesetter: Option<LabelTypesetter>,
    ) -> WavescopeResult<Self> {
        Ok(Self {
            base: BaseRenderer::new(channels, global, typesetter)?,
            wave: preview_wave(),
        })
    }

    pub fn base(&self) -> &BaseRenderer {
        &self.base
    }

    pub fn wave(&self) -> &[f32] {
        &self.wave
    }

    pub fn paint(&self) -> WavescopeResult<FrameRGBA> {
        let waves = vec![(self.wave.as_slice(), self.wave.as_slice()); self.base.paint_infos().len()];
        self.base.paint_frame(&waves)
    }
}

fn preview_wave() -> Vec<f32> {
    (0..PREVIEW_SAMPLES)
        .map(|i| ((i as f64 * 0.16 * std::f64::consts::PI).sin() * 0.5) as f32)
        .collect()
}
