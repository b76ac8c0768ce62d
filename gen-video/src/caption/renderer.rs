//! Caption layout and rasterization.

use super::{CaptionFrame, FrameRenderer};
use crate::config::CaptionConfig;
use crate::error::{PipelineError, Result};
use anyhow::Context;
use log::debug;
use std::path::Path;
use std::sync::Arc;
use usvg::fontdb;

/// Wrap text for display at `width` characters per line.
///
/// All whitespace, newlines included, collapses to single spaces. Words
/// longer than `width` are broken across lines.
pub fn wrap_display(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        // Break over-long words into width-sized pieces
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Load every font file directly inside `dir`.
fn load_fonts_from_dir(db: &mut fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        debug!("Fonts directory {} not readable", dir.display());
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" && ext != "ttc" {
            continue;
        }
        if let Err(e) = db.load_font_file(&path) {
            debug!("Skipping font {}: {}", path.display(), e);
        }
    }
}

/// Public-domain sans face shipped with the binary.
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/Tuffy.ttf");

/// Family name of the bundled face.
pub const BUNDLED_FAMILY: &str = "Tuffy";

/// Add the bundled face, so a database is never empty.
pub fn load_bundled_font(db: &mut fontdb::Database) {
    db.load_font_data(BUNDLED_FONT.to_vec());
}

/// System fonts, an optional extra directory, then the bundled face.
pub fn build_fontdb(fonts_dir: Option<&Path>) -> Arc<fontdb::Database> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(dir) = fonts_dir {
        load_fonts_from_dir(&mut db, dir);
    }
    load_bundled_font(&mut db);
    debug!("Font database holds {} faces", db.len());
    Arc::new(db)
}

fn regular<'a>(families: &'a [fontdb::Family<'a>]) -> fontdb::Query<'a> {
    fontdb::Query {
        families,
        weight: fontdb::Weight::NORMAL,
        stretch: fontdb::Stretch::Normal,
        style: fontdb::Style::Normal,
    }
}

/// Lays out caption frames and rasterizes them.
pub struct CaptionRenderer {
    config: CaptionConfig,
    fontdb: Arc<fontdb::Database>,
}

impl CaptionRenderer {
    /// Renderer over system fonts and `config.fonts_dir`.
    pub fn new(config: CaptionConfig) -> Self {
        let fontdb = build_fontdb(config.fonts_dir.as_deref());
        Self { config, fontdb }
    }

    /// Renderer over an explicit font database.
    pub fn with_fontdb(config: CaptionConfig, fontdb: Arc<fontdb::Database>) -> Self {
        Self { config, fontdb }
    }

    pub fn face_count(&self) -> usize {
        self.fontdb.len()
    }

    /// Pick the family to set captions in.
    ///
    /// Preferred family first, then the generic sans-serif face, then
    /// whatever face the database has. Databases from [`build_fontdb`] always
    /// hold at least the bundled face.
    pub fn resolve_font_family(&self) -> Result<String> {
        let family_of = |id: fontdb::ID| {
            self.fontdb
                .face(id)
                .and_then(|face| face.families.first())
                .map(|(name, _)| name.clone())
        };

        let preferred = [fontdb::Family::Name(self.config.font_family.as_str())];
        if let Some(name) = self.fontdb.query(&regular(&preferred)).and_then(family_of) {
            return Ok(name);
        }

        let generic = [fontdb::Family::SansSerif];
        if let Some(name) = self.fontdb.query(&regular(&generic)).and_then(family_of) {
            debug!("Font '{}' not found, using sans-serif '{}'", self.config.font_family, name);
            return Ok(name);
        }

        if let Some(name) = self.fontdb.faces().next().and_then(|face| family_of(face.id)) {
            debug!("No sans-serif face, using '{}'", name);
            return Ok(name);
        }

        Err(PipelineError::render(anyhow::anyhow!(
            "No usable font found (wanted '{}')",
            self.config.font_family
        )))
    }

    /// Lay out `text` on a caption frame.
    pub fn render(&self, text: &str) -> Result<CaptionFrame> {
        let font_family = self.resolve_font_family()?;
        let lines = wrap_display(text, self.config.wrap_width);

        let frame = CaptionFrame {
            width: self.config.width,
            height: self.config.height,
            lines,
            background: self.config.background,
            foreground: self.config.foreground,
            font_family,
            font_size: self.config.font_size,
            line_spacing: self.config.line_spacing,
            top_margin: self.config.top_margin,
        };

        let visible = frame.visible_lines();
        if visible < frame.lines.len() {
            debug!(
                "Caption overflows the canvas: {} of {} lines visible",
                visible,
                frame.lines.len()
            );
        }

        Ok(frame)
    }

    /// Rasterize a frame to a PNG file.
    pub fn rasterize(&self, frame: &CaptionFrame, output_path: &Path) -> Result<()> {
        self.rasterize_inner(frame, output_path)
            .map_err(PipelineError::render)
    }

    fn rasterize_inner(&self, frame: &CaptionFrame, output_path: &Path) -> anyhow::Result<()> {
        let opts = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&frame.to_svg(), &opts).context("parse caption svg")?;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(frame.width, frame.height)
            .ok_or_else(|| anyhow::anyhow!("failed to allocate {}x{} pixmap", frame.width, frame.height))?;
        resvg::render(&tree, resvg::tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        // Opaque background, so premultiplied RGBA equals straight RGBA
        image::save_buffer_with_format(
            output_path,
            pixmap.data(),
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write {}", output_path.display()))?;

        debug!("Caption written to {}", output_path.display());
        Ok(())
    }
}

impl FrameRenderer for CaptionRenderer {
    fn render_to_png(&self, text: &str, output_path: &Path) -> Result<CaptionFrame> {
        let frame = self.render(text)?;
        self.rasterize(&frame, output_path)?;
        Ok(frame)
    }
}
