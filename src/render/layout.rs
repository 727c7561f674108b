use crate::config::{ChannelConfig, ChannelOrder};
use crate::foundation::core::{Canvas, Point, Rect, Rgba8};
use crate::foundation::error::{WavescopeError, WavescopeResult};
use crate::render::text::LabelLayout;

/// Channel grid geometry for one canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    pub canvas: Canvas,
    pub order: ChannelOrder,
    pub rows: u32,
    pub cols: u32,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl GridLayout {
    pub fn new(
        canvas: Canvas,
        num_channels: usize,
        num_rows_or_cols: u32,
        order: ChannelOrder,
    ) -> WavescopeResult<Self> {
        if num_channels == 0 {
            return Err(WavescopeError::validation("grid layout needs at least one channel"));
        }
        if num_rows_or_cols == 0 {
            return Err(WavescopeError::config("num_rows_or_cols must be non-zero"));
        }
        let n = u32::try_from(num_channels)
            .map_err(|_| WavescopeError::validation("too many channels for grid layout"))?;
        let (rows, cols) = match order {
            ChannelOrder::RowMajor => (n.div_ceil(num_rows_or_cols), num_rows_or_cols),
            ChannelOrder::ColumnMajor => (num_rows_or_cols, n.div_ceil(num_rows_or_cols)),
        };
        Ok(Self {
            canvas,
            order,
            rows,
            cols,
            cell_width: f64::from(canvas.width) / f64::from(cols),
            cell_height: f64::from(canvas.height) / f64::from(rows),
        })
    }

    /// `(row, col)` of channel `index`.
    pub fn cell_position(&self, index: usize) -> (u32, u32) {
        match self.order {
            ChannelOrder::RowMajor => {
                let cols = self.cols as usize;
                ((index / cols) as u32, (index % cols) as u32)
            }
            ChannelOrder::ColumnMajor => {
                let rows = self.rows as usize;
                ((index % rows) as u32, (index / rows) as u32)
            }
        }
    }

    pub fn cell_rect(&self, index: usize) -> Rect {
        let (row, col) = self.cell_position(index);
        let x = f64::from(col) * self.cell_width;
        let y = f64::from(row) * self.cell_height;
        Rect::new(x, y, x + self.cell_width, y + self.cell_height)
    }

    /// Interior row and column boundaries, horizontal lines first.
    pub fn border_lines(&self) -> Vec<(Point, Point)> {
        let w = f64::from(self.canvas.width);
        let h = f64::from(self.canvas.height);
        let mut lines = Vec::new();
        for i in 1..self.rows {
            let y = f64::from(i) * h / f64::from(self.rows);
            lines.push((Point::new(0.0, y), Point::new(w, y)));
        }
        for i in 1..self.cols {
            let x = f64::from(i) * w / f64::from(self.cols);
            lines.push((Point::new(x, 0.0), Point::new(x, h)));
        }
        lines
    }
}

/// Resolved per-channel paint styles.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelStyle {
    pub channel_number: usize,
    pub stereo: bool,
    pub color: Rgba8,
    pub thickness: f64,
    pub midline_color: Rgba8,
    pub midline_thickness: f64,
    pub draw_h_midline: bool,
    pub draw_v_midline: bool,
    pub draw_labels: bool,
    pub label_template: String,
    pub label_size: f32,
    pub label_color: Rgba8,
}

impl From<&ChannelConfig> for ChannelStyle {
    fn from(c: &ChannelConfig) -> Self {
        Self {
            channel_number: c.channel_number,
            stereo: c.stereo,
            color: c.color,
            thickness: c.thickness,
            midline_color: c.midline_color,
            midline_thickness: c.midline_thickness,
            draw_h_midline: c.draw_h_midline,
            draw_v_midline: c.draw_v_midline,
            draw_labels: c.draw_labels,
            label_template: c.label_template.clone(),
            label_size: c.label_size,
            label_color: c.label_color,
        }
    }
}

/// Renderer-owned paint state of one channel cell.
pub struct PaintInfo {
    pub rect: Rect,
    pub style: ChannelStyle,
    pub label: String,
    pub program: u8,
    pub bank: u8,
    pub(crate) label_layout: Option<LabelLayout>,
}

impl PaintInfo {
    pub fn new(rect: Rect, style: ChannelStyle) -> Self {
        let mut info = Self {
            rect,
            style,
            label: String::new(),
            program: 0,
            bank: 0,
            label_layout: None,
        };
        info.update_label();
        info
    }

    /// Re-expand the label template; returns whether the text changed.
    pub fn update_label(&mut self) -> bool {
        let label = expand_label(
            &self.style.label_template,
            self.style.channel_number,
            self.program,
            self.bank,
        );
        if label == self.label {
            return false;
        }
        self.label = label;
        true
    }
}

/// Expand `%i` (instrument), `%n` (1-based channel) and `%%`; other `%x` pairs pass through.
pub fn expand_label(template: &str, channel_number: usize, program: u8, bank: u8) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('i') => out.push_str(instrument_name(program, bank, channel_number == 9)),
            Some('n') => out.push_str(&(channel_number + 1).to_string()),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// General MIDI program name, or drum kit name on the percussion channel.
///
/// Banks other than the kit numbering are not distinguished.
pub fn instrument_name(program: u8, _bank: u8, percussion: bool) -> &'static str {
    if percussion {
        return match program {
            8 => "Room Kit",
            16 => "Power Kit",
            24 => "Electronic Kit",
            25 => "TR-808 Kit",
            32 => "Jazz Kit",
            40 => "Brush Kit",
            48 => "Orchestra Kit",
            56 => "SFX Kit",
            _ => "Standard Kit",
        };
    }
    GM_PROGRAMS
        .get(usize::from(program))
        .copied()
        .unwrap_or(GM_PROGRAMS[0])
}

const GM_PROGRAMS: [&str; 128] = [
    "Acoustic Grand Piano",
    "Bright Acoustic Piano",
    "Electric Grand Piano",
    "Honky-tonk Piano",
    "Electric Piano 1",
    "Electric Piano 2",
    "Harpsichord",
    "Clavi",
    "Celesta",
    "Glockenspiel",
    "Music Box",
    "Vibraphone",
    "Marimba",
    "Xylophone",
    "Tubular Bells",
    "Dulcimer",
    "Drawbar Organ",
    "Percussive Organ",
    "Rock Organ",
    "Church Organ",
    "Reed Organ",
    "Accordion",
    "Harmonica",
    "Tango Accordion",
    "Acoustic Guitar (nylon)",
    "Acoustic Guitar (steel)",
    "Electric Guitar (jazz)",
    "Electric Guitar (clean)",
    "Electric Guitar (muted)",
    "Overdriven Guitar",
    "Distortion Guitar",
    "Guitar Harmonics",
    "Acoustic Bass",
    "Electric Bass (finger)",
    "Electric Bass (pick)",
    "Fretless Bass",
    "Slap Bass 1",
    "Slap Bass 2",
    "Synth Bass 1",
    "Synth Bass 2",
    "Violin",
    "Viola",
    "Cello",
    "Contrabass",
    "Tremolo Strings",
    "Pizzicato Strings",
    "Orchestral Harp",
    "Timpani",
    "String Ensemble 1",
    "String Ensemble 2",
    "Synth Strings 1",
    "Synth Strings 2",
    "Choir Aahs",
    "Voice Oohs",
    "Synth Voice",
    "Orchestra Hit",
    "Trumpet",
    "Trombone",
    "Tuba",
    "Muted Trumpet",
    "French Horn",
    "Brass Section",
    "Synth Brass 1",
    "Synth Brass 2",
    "Soprano Sax",
    "Alto Sax",
    "Tenor Sax",
    "Baritone Sax",
    "Oboe",
    "English Horn",
    "Bassoon",
    "Clarinet",
    "Piccolo",
    "Flute",
    "Recorder",
    "Pan Flute",
    "Blown Bottle",
    "Shakuhachi",
    "Whistle",
    "Ocarina",
    "Lead 1 (square)",
    "Lead 2 (sawtooth)",
    "Lead 3 (calliope)",
    "Lead 4 (chiff)",
    "Lead 5 (charang)",
    "Lead 6 (voice)",
    "Lead 7 (fifths)",
    "Lead 8 (bass + lead)",
    "Pad 1 (new age)",
    "Pad 2 (warm)",
    "Pad 3 (polysynth)",
    "Pad 4 (choir)",
    "Pad 5 (bowed)",
    "Pad 6 (metallic)",
    "Pad 7 (halo)",
    "Pad 8 (sweep)",
    "FX 1 (rain)",
    "FX 2 (soundtrack)",
    "FX 3 (crystal)",
    "FX 4 (atmosphere)",
    "FX 5 (brightness)",
    "FX 6 (goblins)",
    "FX 7 (echoes)",
    "FX 8 (sci-fi)",
    "Sitar",
    "Banjo",
    "Shamisen",
    "Koto",
    "Kalimba",
    "Bag pipe",
    "Fiddle",
    "Shanai",
    "Tinkle Bell",
    "Agogo",
    "Steel Drums",
    "Woodblock",
    "Taiko Drum",
    "Melodic Tom",
    "Synth Drum",
    "Reverse Cymbal",
    "Guitar Fret Noise",
    "Breath Noise",
    "Seashore",
    "Bird Tweet",
    "Telephone Ring",
    "Helicopter",
    "Applause",
    "Gunshot",
];

#[cfg(test)]
#[path = "../../tests/unit/render/layout.rs"]
mod tests;
