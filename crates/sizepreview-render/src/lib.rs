use std::fmt::{self, Display, Formatter};

use anyhow::{bail, Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sizepreview_core::{Dimensions, PreviewReport};
use sizepreview_format::{format_dimensions, FormattedDimensions};
use sizepreview_image::{estimate_rgb_bytes, resolution_info, ResolutionInfo};

/// Largest raster side rendered for a PNG surface.
pub const MAX_RASTER_SIDE: u32 = 8192;
/// Largest RGB buffer allocated for a PNG surface.
pub const MAX_RASTER_BYTES: u64 = 64 * 1024 * 1024;

const CHECKER_CELL: u32 = 10;
const CHECKER_LIGHT: [u8; 3] = [0xff, 0xff, 0xff];
const CHECKER_DARK: [u8; 3] = [0xf0, 0xf0, 0xf0];
const BOX_COLOR: [u8; 3] = [0x4c, 0xaf, 0x50];
const BOX_OPACITY: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewDocument {
    pub title: String,
    pub markup: String,
}

pub fn preview_document(report: &PreviewReport, thousands_separator: &str) -> PreviewDocument {
    let formatted = format_dimensions(report.dimensions, thousands_separator);
    PreviewDocument {
        title: document_title(report),
        markup: render_html(report, &formatted),
    }
}

pub fn document_title(report: &PreviewReport) -> String {
    format!("Resolution preview - {}", report.dimensions)
}

pub fn render_html(report: &PreviewReport, formatted: &FormattedDimensions) -> String {
    let info = resolution_info(report.dimensions);
    PreviewPage {
        report,
        formatted,
        info: &info,
    }
    .to_string()
}

/// The popup document; formatting it writes the full HTML.
pub struct PreviewPage<'a> {
    pub report: &'a PreviewReport,
    pub formatted: &'a FormattedDimensions,
    pub info: &'a ResolutionInfo,
}

impl Display for PreviewPage<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (report, formatted, info) = (self.report, self.formatted, self.info);
        let fit = &report.fit;
        f.write_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n")?;
        writeln!(f, "<title>{}</title>", Escaped(&document_title(report)))?;
        f.write_str(STYLE)?;
        f.write_str("</head>\n<body>\n<div class=\"container\">\n<h1>Resolution preview</h1>\n")?;

        f.write_str("<div class=\"info\">\n<h3>Dimensions</h3>\n")?;
        writeln!(f, "<div class=\"dimensions\">{}</div>", Escaped(&formatted.dimensions))?;
        writeln!(
            f,
            "<div class=\"ratio\">Aspect ratio: {} ({}, {})</div>",
            Escaped(&formatted.aspect_ratio),
            Escaped(&info.aspect_name),
            info.orientation.label()
        )?;
        writeln!(f, "<div>Total pixels: {}</div>", Escaped(&formatted.pixel_count))?;
        writeln!(
            f,
            "<div>Megapixels: {} MP ({} resolution)</div>",
            Escaped(&formatted.megapixels),
            Escaped(info.level.label())
        )?;
        if report.any_substituted() {
            f.write_str("<div class=\"note\">A missing size was replaced by the default.</div>\n")?;
        }
        f.write_str("</div>\n")?;

        writeln!(
            f,
            "<div class=\"preview-area\" style=\"width: {}px; height: {}px;\">",
            Px(report.viewport.width),
            Px(report.viewport.height)
        )?;
        writeln!(
            f,
            "<div class=\"preview-box\" style=\"width: {}px; height: {}px; left: {}px; top: {}px;\"></div>",
            Px(fit.scaled_width),
            Px(fit.scaled_height),
            Px(fit.offset_x),
            Px(fit.offset_y)
        )?;
        f.write_str("</div>\n")?;

        f.write_str("<div class=\"info\">\n<h3>Suggested use</h3>\n")?;
        writeln!(f, "<div class=\"suggestion\">{}</div>", Escaped(report.suggestion.label()))?;
        f.write_str("</div>\n</div>\n</body>\n</html>\n")
    }
}

const STYLE: &str = "<style>
body { margin: 0; padding: 20px; font-family: Arial, sans-serif; background: #f0f0f0; }
.container { max-width: 860px; margin: 0 auto; background: white; padding: 20px; border-radius: 10px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
.preview-area { box-sizing: content-box; border: 2px dashed #ccc; margin: 20px 0; position: relative;
  background: linear-gradient(45deg, #f0f0f0 25%, transparent 25%, transparent 75%, #f0f0f0 75%, #f0f0f0),
              linear-gradient(45deg, #f0f0f0 25%, transparent 25%, transparent 75%, #f0f0f0 75%, #f0f0f0);
  background-size: 20px 20px; background-position: 0 0, 10px 10px; }
.preview-box { background: #4CAF50; opacity: 0.7; position: absolute; }
.info { background: #e3f2fd; padding: 15px; border-radius: 5px; margin: 10px 0; }
.info h3 { margin-top: 0; }
.dimensions { font-size: 24px; font-weight: bold; color: #2196F3; }
.ratio { font-size: 18px; color: #666; }
.note { color: #b26a00; }
</style>
";

/// CSS length: at most three decimals, trailing zeros dropped.
struct Px(f64);

impl Display for Px {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rounded = (self.0 * 1000.0).round() / 1000.0;
        let text = format!("{:.3}", rounded);
        f.write_str(text.trim_end_matches('0').trim_end_matches('.'))
    }
}

/// Writes text with HTML metacharacters escaped.
pub struct Escaped<'a>(pub &'a str);

impl Display for Escaped<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(pos) = rest.find(['&', '<', '>', '"', '\'']) {
            f.write_str(&rest[..pos])?;
            let entity = match rest.as_bytes()[pos] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                _ => "&#39;",
            };
            f.write_str(entity)?;
            rest = &rest[pos + 1..];
        }
        f.write_str(rest)
    }
}

/// Rasterizes the preview area and encodes it as PNG.
pub fn render_png(report: &PreviewReport) -> Result<Vec<u8>> {
    let image = render_raster(report)?;
    let mut encoded = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut encoded), ImageFormat::Png)
        .context("encoding preview png")?;
    Ok(encoded)
}

pub fn render_raster(report: &PreviewReport) -> Result<RgbImage> {
    let width = report.viewport.width.round();
    let height = report.viewport.height.round();
    if !(width >= 1.0 && height >= 1.0) {
        bail!("viewport {}x{} is too small to rasterize", report.viewport.width, report.viewport.height);
    }
    if width > MAX_RASTER_SIDE as f64 || height > MAX_RASTER_SIDE as f64 {
        bail!("viewport {}x{} exceeds the {} px raster limit", width, height, MAX_RASTER_SIDE);
    }
    let raster = Dimensions::new(width as u32, height as u32).context("raster dimensions")?;
    let bytes = estimate_rgb_bytes(raster);
    if bytes > MAX_RASTER_BYTES {
        bail!("viewport {} needs {} bytes, over the {} byte raster budget", raster, bytes, MAX_RASTER_BYTES);
    }

    let fit = &report.fit;
    let left = fit.offset_x.round();
    let top = fit.offset_y.round();
    let right = (fit.offset_x + fit.scaled_width).round();
    let bottom = (fit.offset_y + fit.scaled_height).round();

    Ok(RgbImage::from_fn(raster.width(), raster.height(), |x, y| {
        let background = if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
            CHECKER_LIGHT
        } else {
            CHECKER_DARK
        };
        let (fx, fy) = (x as f64, y as f64);
        if fx >= left && fx < right && fy >= top && fy < bottom {
            Rgb(blend(BOX_COLOR, background, BOX_OPACITY))
        } else {
            Rgb(background)
        }
    }))
}

fn blend(top: [u8; 3], bottom: [u8; 3], alpha: f64) -> [u8; 3] {
    let mix = |a: u8, b: u8| (a as f64 * alpha + b as f64 * (1.0 - alpha)).round().clamp(0.0, 255.0) as u8;
    [mix(top[0], bottom[0]), mix(top[1], bottom[1]), mix(top[2], bottom[2])]
}
