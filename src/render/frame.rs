use crate::foundation::core::Rgba8;
use crate::foundation::error::{WavescopeError, WavescopeResult};
use crate::foundation::math::mul_div255_u16;

/// Tightly packed RGBA8 frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Premultiplied frame filled with `color`.
    pub fn filled(width: u32, height: u32, color: Rgba8) -> Self {
        let px = color.to_premul_array();
        let mut data = vec![0u8; width as usize * height as usize * 4];
        for d in data.chunks_exact_mut(4) {
            d.copy_from_slice(&px);
        }
        Self {
            width,
            height,
            data,
            premultiplied: true,
        }
    }

    /// Premultiplied frame wrapping a rendered `vello_cpu` pixmap.
    pub(crate) fn from_pixmap(pixmap: &vello_cpu::Pixmap) -> Self {
        Self {
            width: u32::from(pixmap.width()),
            height: u32::from(pixmap.height()),
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Source-over composite of `src` with its top-left corner at `(x, y)`, clipped to `self`.
    pub fn blit_over(&mut self, src: &FrameRGBA, x: u32, y: u32) -> WavescopeResult<()> {
        if !self.premultiplied || !src.premultiplied {
            return Err(WavescopeError::validation(
                "blit_over expects premultiplied frames",
            ));
        }
        if x >= self.width || y >= self.height {
            return Ok(());
        }
        let cols = src.width.min(self.width - x) as usize;
        let rows = src.height.min(self.height - y) as usize;
        let dst_stride = self.width as usize * 4;
        let src_stride = src.width as usize * 4;

        for row in 0..rows {
            let d0 = (y as usize + row) * dst_stride + x as usize * 4;
            let s0 = row * src_stride;
            let dst_row = &mut self.data[d0..d0 + cols * 4];
            let src_row = &src.data[s0..s0 + cols * 4];
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
                d.copy_from_slice(&out);
            }
        }
        Ok(())
    }

    /// Straight-alpha copy, suitable for PNG output.
    pub fn to_rgba_image(&self) -> WavescopeResult<image::RgbaImage> {
        let mut data = self.data.clone();
        if self.premultiplied {
            for px in data.chunks_exact_mut(4) {
                let a = u16::from(px[3]);
                if a == 0 || a == 255 {
                    continue;
                }
                for c in &mut px[..3] {
                    *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
        image::RgbaImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| WavescopeError::validation("frame data size mismatch with width*height*4"))
    }
}

fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    match src[3] {
        0 => dst,
        255 => src,
        sa => {
            let inv = 255u16 - u16::from(sa);
            let mut out = [0u8; 4];
            for i in 0..4 {
                let v = u16::from(src[i]) + mul_div255_u16(u16::from(dst[i]), inv);
                out[i] = v.min(255) as u8;
            }
            out
        }
    }
}
