//! Key face rendering
//!
//! A face is an icon (`<assets>/<name>.png`) scaled into the area above a
//! reserved caption strip, with the slot's label drawn centred on a
//! baseline just above the bottom edge. The composed RGBA canvas is then
//! rotated, flipped and encoded into the device's native format.

use std::io::Cursor;
use std::path::PathBuf;

use deck_transport::{ImageEncoding, KeyImageFormat};
use fontdue::{Font, FontSettings};
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgba, RgbaImage, RgbImage};
use tracing::debug;

use crate::config::Slot;
use crate::error::DeckError;

/// Produces native key images from slot definitions
pub trait FaceRenderer: Send + Sync {
    /// Render one slot. `Ok(None)` for an empty slot: nothing to upload.
    fn render(&self, slot: &Slot, format: &KeyImageFormat) -> Result<Option<Vec<u8>>, DeckError>;

    /// All-black native image, used to clear a key
    fn blank(&self, format: &KeyImageFormat) -> Result<Vec<u8>, DeckError>;
}

/// Pixels reserved around the icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Margins {
    /// Reserve a strip at the bottom of the key for the caption
    pub fn caption(bottom: u32) -> Self {
        Self {
            bottom,
            ..Self::default()
        }
    }
}

/// Caption font and icon layout
#[derive(Debug, Clone, PartialEq)]
pub struct KeyStyle {
    /// Font file name, looked up in the assets directory
    pub font_file: String,
    /// Caption pixel size
    pub font_size: f32,
    /// Space kept free around the icon
    pub margins: Margins,
}

impl Default for KeyStyle {
    fn default() -> Self {
        Self {
            font_file: "Courier Prime Bold.ttf".to_string(),
            font_size: 14.0,
            margins: Margins::caption(30),
        }
    }
}

/// Caption baseline distance from the bottom edge
const CAPTION_BASELINE_OFFSET: u32 = 5;

/// Renders faces from PNG icons and a TrueType caption font
#[derive(Debug, Clone)]
pub struct KeyRenderer {
    assets_dir: PathBuf,
    style: KeyStyle,
}

impl KeyRenderer {
    pub fn new(assets_dir: impl Into<PathBuf>, style: KeyStyle) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            style,
        }
    }

    /// Icon path for an action name
    pub fn icon_path(&self, name: &str) -> PathBuf {
        self.assets_dir.join(format!("{name}.png"))
    }

    /// Caption font path
    pub fn font_path(&self) -> PathBuf {
        self.assets_dir.join(&self.style.font_file)
    }

    fn load_icon(&self, name: &str) -> Result<DynamicImage, DeckError> {
        let path = require(self.icon_path(name))?;
        Ok(image::open(&path)?)
    }

    // Loaded on every render; faces are only drawn on presses and page turns
    fn load_font(&self) -> Result<Font, DeckError> {
        let path = require(self.font_path())?;
        let bytes = std::fs::read(&path)
            .map_err(|e| DeckError::Render(format!("{}: {e}", path.display())))?;
        Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| DeckError::Render(format!("{}: {e}", path.display())))
    }
}

fn require(path: PathBuf) -> Result<PathBuf, DeckError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(DeckError::AssetMissing { path })
    }
}

impl FaceRenderer for KeyRenderer {
    fn render(&self, slot: &Slot, format: &KeyImageFormat) -> Result<Option<Vec<u8>>, DeckError> {
        let (name, label) = match slot {
            Slot::Empty => return Ok(None),
            Slot::Action { name, label, .. } => (name, label),
        };

        let icon = self.load_icon(name)?;
        let font = self.load_font()?;

        let mut canvas = black_canvas(format);
        place_icon(&mut canvas, &icon, self.style.margins);
        draw_caption(&mut canvas, &font, label, self.style.font_size);

        debug!("Rendered \"{}\" at {}x{}", name, format.width, format.height);
        to_native(canvas, format).map(Some)
    }

    fn blank(&self, format: &KeyImageFormat) -> Result<Vec<u8>, DeckError> {
        to_native(black_canvas(format), format)
    }
}

fn black_canvas(format: &KeyImageFormat) -> RgbaImage {
    RgbaImage::from_pixel(format.width, format.height, Rgba([0, 0, 0, 255]))
}

/// Scale `icon` to fit the box left by `margins`, preserving aspect ratio,
/// and centre it there. Icons are scaled up as well as down.
pub fn place_icon(canvas: &mut RgbaImage, icon: &DynamicImage, margins: Margins) {
    let (width, height) = canvas.dimensions();
    let box_w = width.saturating_sub(margins.left + margins.right);
    let box_h = height.saturating_sub(margins.top + margins.bottom);
    if box_w == 0 || box_h == 0 || icon.width() == 0 || icon.height() == 0 {
        return;
    }

    let scaled = icon.resize(box_w, box_h, FilterType::Lanczos3).to_rgba8();
    let x = margins.left + (box_w - scaled.width()) / 2;
    let y = margins.top + (box_h - scaled.height()) / 2;
    imageops::overlay(canvas, &scaled, i64::from(x), i64::from(y));
}

/// Draw `text` in white, centred horizontally, baseline 5px above the bottom
pub fn draw_caption(canvas: &mut RgbaImage, font: &Font, text: &str, size: f32) {
    if text.is_empty() {
        return;
    }
    let (width, height) = canvas.dimensions();

    let glyphs: Vec<_> = text.chars().map(|ch| font.rasterize(ch, size)).collect();
    let advance: f32 = glyphs.iter().map(|(m, _)| m.advance_width).sum();

    let baseline = height.saturating_sub(CAPTION_BASELINE_OFFSET) as f32;
    let mut cursor_x = width as f32 / 2.0 - advance / 2.0;

    for (metrics, bitmap) in &glyphs {
        let glyph_x = (cursor_x + metrics.xmin as f32).round() as i64;
        let glyph_y = (baseline - metrics.ymin as f32 - metrics.height as f32).round() as i64;

        for row in 0..metrics.height {
            for col in 0..metrics.width {
                let coverage = bitmap[row * metrics.width + col];
                if coverage == 0 {
                    continue;
                }
                let px = glyph_x + col as i64;
                let py = glyph_y + row as i64;
                if px < 0 || py < 0 || px >= i64::from(width) || py >= i64::from(height) {
                    continue;
                }
                blend_white(canvas.get_pixel_mut(px as u32, py as u32), coverage);
            }
        }

        cursor_x += metrics.advance_width;
    }
}

fn blend_white(pixel: &mut Rgba<u8>, coverage: u8) {
    let a = u16::from(coverage);
    for channel in pixel.0.iter_mut().take(3) {
        *channel = ((u16::from(*channel) * (255 - a) + 255 * a) / 255) as u8;
    }
}

/// Orient and encode a composed face for the device
///
/// Rotation is counter-clockwise and happens before the flips.
pub fn to_native(canvas: RgbaImage, format: &KeyImageFormat) -> Result<Vec<u8>, DeckError> {
    let mut rgb = orient(DynamicImage::ImageRgba8(canvas).to_rgb8(), format)?;
    if format.flip_horizontal {
        imageops::flip_horizontal_in_place(&mut rgb);
    }
    if format.flip_vertical {
        imageops::flip_vertical_in_place(&mut rgb);
    }
    encode(&rgb, format.encoding)
}

fn orient(rgb: RgbImage, format: &KeyImageFormat) -> Result<RgbImage, DeckError> {
    // imageops rotates clockwise
    match format.rotation {
        0 => Ok(rgb),
        90 => Ok(imageops::rotate270(&rgb)),
        180 => Ok(imageops::rotate180(&rgb)),
        270 => Ok(imageops::rotate90(&rgb)),
        other => Err(DeckError::Render(format!("Unsupported rotation: {other}"))),
    }
}

fn encode(rgb: &RgbImage, encoding: ImageEncoding) -> Result<Vec<u8>, DeckError> {
    let mut out = Cursor::new(Vec::new());
    let (width, height) = rgb.dimensions();
    match encoding {
        ImageEncoding::Jpeg => JpegEncoder::new_with_quality(&mut out, 100).write_image(
            rgb.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        )?,
        ImageEncoding::Bmp => BmpEncoder::new(&mut out).write_image(
            rgb.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        )?,
    }
    Ok(out.into_inner())
}
