//! Caption frame: the single still image shown for the whole video.
//!
//! A [`CaptionFrame`] is a layout (canvas size, colors, wrapped lines) that
//! serializes to an SVG document. [`CaptionRenderer`] builds frames from text
//! and rasterizes them to PNG.

pub mod renderer;

pub use renderer::{BUNDLED_FAMILY, CaptionRenderer, build_fontdb, load_bundled_font, wrap_display};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Produces the caption image for a run.
pub trait FrameRenderer: Send + Sync {
    /// Lay out `text` and write the frame as a PNG to `output_path`.
    fn render_to_png(&self, text: &str, output_path: &Path) -> Result<CaptionFrame>;
}

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb` form.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn named(name: &str) -> Option<Self> {
        let (r, g, b) = match name {
            "black" => (0, 0, 0),
            "silver" => (192, 192, 192),
            "gray" | "grey" => (128, 128, 128),
            "white" => (255, 255, 255),
            "maroon" => (128, 0, 0),
            "red" => (255, 0, 0),
            "purple" => (128, 0, 128),
            "fuchsia" => (255, 0, 255),
            "green" => (0, 128, 0),
            "lime" => (0, 255, 0),
            "olive" => (128, 128, 0),
            "yellow" => (255, 255, 0),
            "navy" => (0, 0, 128),
            "blue" => (0, 0, 255),
            "teal" => (0, 128, 128),
            "aqua" => (0, 255, 255),
            _ => return None,
        };
        Some(Self::rgb(r, g, b))
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || format!("invalid color '{}' (expected #rrggbb, #rgb or a color name)", s);

        let Some(hex) = s.strip_prefix('#') else {
            return Self::named(&s.to_ascii_lowercase()).ok_or_else(invalid);
        };
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            // #abc == #aabbcc
            3 => Ok(Self::rgb(
                channel(&hex[0..1])? * 17,
                channel(&hex[1..2])? * 17,
                channel(&hex[2..3])? * 17,
            )),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Layout of the caption image.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionFrame {
    pub width: u32,
    pub height: u32,
    /// Display lines, top to bottom
    pub lines: Vec<String>,
    pub background: Color,
    pub foreground: Color,
    /// Concrete font family the lines are set in
    pub font_family: String,
    pub font_size: u32,
    pub line_spacing: u32,
    pub top_margin: u32,
}

impl CaptionFrame {
    /// Top edge of line `i`, in pixels.
    pub fn line_top(&self, i: usize) -> u64 {
        self.top_margin as u64 + i as u64 * (self.font_size + self.line_spacing) as u64
    }

    /// Number of lines that start inside the canvas.
    pub fn visible_lines(&self) -> usize {
        (0..self.lines.len())
            .take_while(|&i| self.line_top(i) < self.height as u64)
            .count()
    }

    /// Serialize the frame as a standalone SVG document.
    ///
    /// Each line is centered on the canvas midline; its baseline sits one
    /// font size below the line top.
    pub fn to_svg(&self) -> String {
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            w = self.width,
            h = self.height
        );
        svg.push_str(&format!(
            "  <rect width=\"100%\" height=\"100%\" fill=\"{}\"/>\n",
            self.background
        ));
        svg.push_str(&format!(
            "  <g font-family=\"{}\" font-size=\"{}\" fill=\"{}\" text-anchor=\"middle\">\n",
            escape_xml(&self.font_family),
            self.font_size,
            self.foreground
        ));

        let center = self.width as f64 / 2.0;
        for (i, line) in self.lines.iter().enumerate() {
            let baseline = self.line_top(i) + self.font_size as u64;
            svg.push_str(&format!(
                "    <text x=\"{}\" y=\"{}\" xml:space=\"preserve\">{}</text>\n",
                center,
                baseline,
                escape_xml(line)
            ));
        }

        svg.push_str("  </g>\n</svg>\n");
        svg
    }
}

/// Escape text for use in SVG content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(lines: &[&str]) -> CaptionFrame {
        CaptionFrame {
            width: 640,
            height: 480,
            lines: lines.iter().map(|l| l.to_string()).collect(),
            background: Color::WHITE,
            foreground: Color::BLACK,
            font_family: "Arial".to_string(),
            font_size: 24,
            line_spacing: 5,
            top_margin: 20,
        }
    }

    #[test]
    fn test_parse_colors() {
        assert_eq!("#ff8000".parse::<Color>().unwrap(), Color::rgb(255, 128, 0));
        assert_eq!("#FFF".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("#0a0".parse::<Color>().unwrap(), Color::rgb(0, 170, 0));
        assert_eq!("Navy".parse::<Color>().unwrap(), Color::rgb(0, 0, 128));
        assert!("#12345".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
        assert!("mauve-ish".parse::<Color>().is_err());
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(Color::rgb(1, 2, 255).to_hex(), "#0102ff");
        assert_eq!(String::from(Color::WHITE), "#ffffff");
    }

    #[test]
    fn test_line_positions() {
        let f = frame(&["a", "b", "c"]);
        assert_eq!(f.line_top(0), 20);
        assert_eq!(f.line_top(1), 49);
        assert_eq!(f.line_top(2), 78);
    }

    #[test]
    fn test_visible_lines_clip_at_canvas() {
        let lines: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let f = frame(&refs);
        // 20 + 29 * 16 = 484 >= 480, so line 16 is the first off-canvas
        assert_eq!(f.visible_lines(), 16);
    }

    #[test]
    fn test_svg_centers_and_escapes() {
        let svg = frame(&["Tom & Jerry <3"]).to_svg();
        assert!(svg.contains("width=\"640\" height=\"480\""));
        assert!(svg.contains("text-anchor=\"middle\""));
        assert!(svg.contains("<text x=\"320\" y=\"44\""));
        assert!(svg.contains("Tom &amp; Jerry &lt;3"));
        assert!(svg.contains("fill=\"#ffffff\""));
        assert!(svg.contains("fill=\"#000000\""));
    }
}
