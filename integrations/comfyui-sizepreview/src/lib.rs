use std::rc::Rc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sizepreview_core::{
    build_preview_with_telemetry, resolve_preview_config, v1, DimensionPolicy, Dimensions, ErrorCode, ErrorInfo,
    PreviewConfig, PreviewConfigOverrides, PreviewReport, SurfaceTarget,
};
use sizepreview_format::format_dimensions;
use sizepreview_image::{estimate_rgb_bytes, resolution_info, DimensionRange, ResolutionInfo};
use sizepreview_render::preview_document;
use sizepreview_telemetry::sink_from_env;
use tracing::{debug, error, warn};

pub const EXTENSION_NAME: &str = "ResolutionPresets.SizePreview";
pub const TARGET_NODE_TYPE: &str = "ResolutionPresetImage";
pub const PREVIEW_BUTTON_LABEL: &str = "预览尺寸";

/// Reads the current value of a node widget by its display label.
pub trait WidgetSource {
    fn widget_value(&self, label: &str) -> Option<f64>;
}

/// Opens a transient display surface (a popup window) with the given markup.
pub trait SurfaceFactory {
    fn open_surface(&self, title: &str, markup: &str) -> Result<()>;
}

pub trait NodeHandle {
    fn widgets(&self) -> Rc<dyn WidgetSource>;
    fn add_button(&mut self, label: &str, on_click: Box<dyn Fn()>);
}

pub trait ExtensionRegistry {
    fn register_extension(&mut self, name: &str, node_type: &str, on_node_created: Box<dyn Fn(&mut dyn NodeHandle)>);
}

/// Registration hook, called once when the host loads the extension.
///
/// Every `ResolutionPresetImage` node created afterwards gets a preview
/// button. Clicking it never propagates an error into the host; failures are
/// logged instead.
pub fn init(registry: &mut dyn ExtensionRegistry, surfaces: Rc<dyn SurfaceFactory>, config: PreviewConfig) {
    debug!(extension = EXTENSION_NAME, node_type = TARGET_NODE_TYPE, "registering size preview");
    let config = Rc::new(config);
    registry.register_extension(
        EXTENSION_NAME,
        TARGET_NODE_TYPE,
        Box::new(move |node: &mut dyn NodeHandle| {
            let widgets = node.widgets();
            let surfaces = Rc::clone(&surfaces);
            let config = Rc::clone(&config);
            node.add_button(
                PREVIEW_BUTTON_LABEL,
                Box::new(move || {
                    if let Err(err) = show_preview(widgets.as_ref(), surfaces.as_ref(), &config) {
                        error!(error = %err, "size preview failed");
                    }
                }),
            );
        }),
    );
}

/// Body of the preview button: read both widgets, compute, render, open.
pub fn show_preview(widgets: &dyn WidgetSource, surfaces: &dyn SurfaceFactory, config: &PreviewConfig) -> Result<PreviewReport> {
    let raw_width = widgets.widget_value(&config.width_label);
    let raw_height = widgets.widget_value(&config.height_label);
    debug!(?raw_width, ?raw_height, "size preview triggered");

    let telemetry = sink_from_env();
    let telemetry_ref = telemetry.as_ref().map(|sink| sink.as_ref());
    let report = build_preview_with_telemetry(raw_width, raw_height, config, SurfaceTarget::Html, telemetry_ref)
        .context("building size preview")?;
    if report.any_substituted() {
        warn!(
            ?raw_width,
            ?raw_height,
            dimensions = %report.dimensions,
            "missing or invalid size replaced by default"
        );
    }
    let range = DimensionRange::default();
    if !range.contains(report.dimensions.width()) || !range.contains(report.dimensions.height()) {
        debug!(
            dimensions = %report.dimensions,
            nearest = %range.snap_dimensions(report.dimensions),
            "size is outside the widget range"
        );
    }

    let document = preview_document(&report, &config.thousands_separator);
    surfaces
        .open_surface(&document.title, &document.markup)
        .context("opening preview surface")?;
    Ok(report)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewCommandRequest {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub viewport_width: Option<f64>,
    pub viewport_height: Option<f64>,
    pub fill_ratio: Option<f64>,
    pub dimension_policy: Option<String>,
    pub include_markup: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewCommandResponse {
    pub report: PreviewReport,
    pub aspect_ratio: String,
    pub pixel_count: String,
    pub megapixels: String,
    pub suggestion: String,
    pub resolution: ResolutionInfo,
    /// Uncompressed 8-bit RGB size of one image at this resolution.
    pub estimated_rgb_bytes: u64,
    /// Nearest size the host's width/height widgets can hold.
    pub widget_size: Dimensions,
    pub in_widget_range: bool,
    pub markup: Option<String>,
}

pub fn preview_command(request: PreviewCommandRequest) -> std::result::Result<PreviewCommandResponse, String> {
    let config = resolve_preview_config(PreviewConfigOverrides {
        viewport_width: request.viewport_width,
        viewport_height: request.viewport_height,
        fill_ratio: request.fill_ratio,
        dimension_policy: parse_dimension_policy_opt(request.dimension_policy.as_deref())?,
        ..PreviewConfigOverrides::default()
    });
    let telemetry = sink_from_env();
    let telemetry_ref = telemetry.as_ref().map(|sink| sink.as_ref());
    let report = build_preview_with_telemetry(request.width, request.height, &config, SurfaceTarget::Command, telemetry_ref)
        .map_err(|err| err.to_string())?;
    let formatted = format_dimensions(report.dimensions, &config.thousands_separator);
    let markup = if request.include_markup.unwrap_or(false) {
        Some(preview_document(&report, &config.thousands_separator).markup)
    } else {
        None
    };
    let range = DimensionRange::default();
    let widget_size = range.snap_dimensions(report.dimensions);
    Ok(PreviewCommandResponse {
        aspect_ratio: formatted.aspect_ratio,
        pixel_count: formatted.pixel_count,
        megapixels: formatted.megapixels,
        suggestion: report.suggestion.label().to_string(),
        resolution: resolution_info(report.dimensions),
        estimated_rgb_bytes: estimate_rgb_bytes(report.dimensions),
        in_widget_range: widget_size == report.dimensions,
        widget_size,
        markup,
        report,
    })
}

pub fn preview_v1(request: v1::PreviewRequest) -> std::result::Result<v1::PreviewResponse, ErrorInfo> {
    let policy = parse_dimension_policy_opt(request.dimension_policy.as_deref()).map_err(|message| ErrorInfo {
        code: ErrorCode::InvalidArgument,
        message,
    })?;
    let config = resolve_preview_config(PreviewConfigOverrides {
        viewport_width: request.viewport_width,
        viewport_height: request.viewport_height,
        fill_ratio: request.fill_ratio,
        dimension_policy: policy,
        ..PreviewConfigOverrides::default()
    });
    let telemetry = sink_from_env();
    let telemetry_ref = telemetry.as_ref().map(|sink| sink.as_ref());
    let report = build_preview_with_telemetry(request.width, request.height, &config, SurfaceTarget::Command, telemetry_ref)
        .map_err(|err| err.as_error_info())?;
    let formatted = format_dimensions(report.dimensions, &config.thousands_separator);
    Ok(v1::PreviewResponse {
        width: report.dimensions.width(),
        height: report.dimensions.height(),
        scaled_width: report.fit.scaled_width,
        scaled_height: report.fit.scaled_height,
        offset_x: report.fit.offset_x,
        offset_y: report.fit.offset_y,
        aspect_ratio: formatted.aspect_ratio,
        pixel_count: formatted.pixel_count,
        megapixels: formatted.megapixels,
        suggestion: report.suggestion.label().to_string(),
        defaulted: report.any_substituted(),
    })
}

/// JSON in, JSON out; errors come back as an `ErrorInfo` object.
pub fn preview_v1_json(request_json: &str) -> String {
    let request: v1::PreviewRequest = match serde_json::from_str(request_json) {
        Ok(request) => request,
        Err(err) => {
            return error_json(&ErrorInfo {
                code: ErrorCode::InvalidArgument,
                message: format!("invalid request json: {}", err),
            })
        }
    };
    match preview_v1(request) {
        Ok(response) => serde_json::to_string(&response).unwrap_or_else(|err| {
            error_json(&ErrorInfo {
                code: ErrorCode::InvalidArgument,
                message: format!("response encode failed: {}", err),
            })
        }),
        Err(info) => error_json(&info),
    }
}

fn error_json(info: &ErrorInfo) -> String {
    serde_json::to_string(info).unwrap_or_else(|_| "{\"code\":\"invalid-argument\",\"message\":\"\"}".to_string())
}

fn parse_dimension_policy_opt(raw: Option<&str>) -> std::result::Result<Option<DimensionPolicy>, String> {
    match raw.map(|value| value.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(value) => match value.as_str() {
            "" => Ok(None),
            "lenient" | "default" => Ok(Some(DimensionPolicy::Lenient)),
            "strict" => Ok(Some(DimensionPolicy::Strict)),
            other => Err(format!(
                "unknown dimension policy '{}'; expected one of: lenient, default, strict",
                other
            )),
        },
    }
}
