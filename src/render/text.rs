use std::path::Path;

use crate::foundation::core::Rgba8;
use crate::foundation::error::{WavescopeError, WavescopeResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<Rgba8> for TextBrushRgba8 {
    fn from(c: Rgba8) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

pub type LabelLayout = parley::Layout<TextBrushRgba8>;

/// Parley contexts plus the single font every channel label is set in.
pub struct LabelTypesetter {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for LabelTypesetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelTypesetter")
            .field("family_name", &self.family_name)
            .finish_non_exhaustive()
    }
}

impl LabelTypesetter {
    pub fn from_path(path: impl AsRef<Path>) -> WavescopeResult<Self> {
        use anyhow::Context as _;
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read label font '{}'", path.display()))?;
        Self::from_bytes(bytes)
    }

    /// Register `font_bytes` (TrueType/OpenType) as the label family.
    pub fn from_bytes(font_bytes: Vec<u8>) -> WavescopeResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            WavescopeError::validation("no font families registered from label font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| WavescopeError::validation("registered label font has no family name"))?
            .to_string();

        let font =
            vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0);

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
        })
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn font(&self) -> &vello_cpu::peniko::FontData {
        &self.font
    }

    /// Shape one line of label text.
    pub fn layout(
        &mut self,
        text: &str,
        size_px: f32,
        color: Rgba8,
    ) -> WavescopeResult<LabelLayout> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(WavescopeError::validation(
                "label size must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(TextBrushRgba8::from(
            color,
        )));

        let mut layout: LabelLayout = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}
