use std::fmt::{Display, Formatter};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod fit;
mod suggestion;

pub use fit::{fit, fit_default, DEFAULT_FILL_RATIO};
pub use suggestion::{classify, classify_megapixels, Suggestion};

/// Side length the host falls back to when a widget value is missing.
pub const DEFAULT_DIMENSION: u32 = 512;
pub const DEFAULT_VIEWPORT_WIDTH: f64 = 800.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DimensionField {
    Width,
    Height,
    ViewportWidth,
    ViewportHeight,
    FillRatio,
}

impl DimensionField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Width => "width",
            Self::Height => "height",
            Self::ViewportWidth => "viewport width",
            Self::ViewportHeight => "viewport height",
            Self::FillRatio => "fill ratio",
        }
    }
}

impl Display for DimensionField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A target resolution. Both sides are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DimensionsRepr")]
pub struct Dimensions {
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct DimensionsRepr {
    width: u32,
    height: u32,
}

impl TryFrom<DimensionsRepr> for Dimensions {
    type Error = CoreError;

    fn try_from(repr: DimensionsRepr) -> Result<Self, Self::Error> {
        Dimensions::new(repr.width, repr.height)
    }
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Result<Self, CoreError> {
        if width == 0 {
            return Err(CoreError::InvalidDimension {
                field: DimensionField::Width,
                value: Some(0.0),
            });
        }
        if height == 0 {
            return Err(CoreError::InvalidDimension {
                field: DimensionField::Height,
                value: Some(0.0),
            });
        }
        Ok(Self { width, height })
    }

    pub fn width(self) -> u32 {
        self.width
    }

    pub fn height(self) -> u32 {
        self.height
    }

    pub fn aspect_ratio(self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn megapixels(self) -> f64 {
        self.pixel_count() as f64 / 1_000_000.0
    }
}

impl Display for Dimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

/// Width over height for unvalidated sides.
pub fn aspect_ratio(width: u32, height: u32) -> Result<f64, CoreError> {
    if height == 0 {
        return Err(CoreError::DivisionByZero);
    }
    Ok(width as f64 / height as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitResult {
    pub scaled_width: f64,
    pub scaled_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid {field}: {}", describe_value(.value))]
    InvalidDimension { field: DimensionField, value: Option<f64> },
    #[error("division by zero: height must be positive")]
    DivisionByZero,
}

fn describe_value(value: &Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "missing".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    InvalidDimension,
    DivisionByZero,
    /// Malformed request or unknown option at a host entry point.
    InvalidArgument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn as_error_info(&self) -> ErrorInfo {
        match self {
            Self::InvalidDimension { .. } => ErrorInfo {
                code: ErrorCode::InvalidDimension,
                message: self.to_string(),
            },
            Self::DivisionByZero => ErrorInfo {
                code: ErrorCode::DivisionByZero,
                message: self.to_string(),
            },
        }
    }
}

/// How raw host values that are missing or not positive are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DimensionPolicy {
    /// Substitute the configured default side length.
    #[default]
    Lenient,
    /// Fail with `CoreError::InvalidDimension`.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDimensions {
    pub dimensions: Dimensions,
    pub width_substituted: bool,
    pub height_substituted: bool,
}

impl ResolvedDimensions {
    pub fn any_substituted(&self) -> bool {
        self.width_substituted || self.height_substituted
    }
}

fn usable_side(raw: Option<f64>) -> Option<u32> {
    let value = raw?;
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if rounded < 1.0 || rounded > u32::MAX as f64 {
        return None;
    }
    Some(rounded as u32)
}

fn resolve_side(
    raw: Option<f64>,
    field: DimensionField,
    policy: DimensionPolicy,
    default: u32,
) -> Result<(u32, bool), CoreError> {
    match (usable_side(raw), policy) {
        (Some(value), _) => Ok((value, false)),
        (None, DimensionPolicy::Lenient) => {
            // A zero default cannot form `Dimensions`.
            let side = if default == 0 { DEFAULT_DIMENSION } else { default };
            Ok((side, true))
        }
        (None, DimensionPolicy::Strict) => Err(CoreError::InvalidDimension { field, value: raw }),
    }
}

pub fn resolve_dimensions(
    raw_width: Option<f64>,
    raw_height: Option<f64>,
    policy: DimensionPolicy,
    default: u32,
) -> Result<ResolvedDimensions, CoreError> {
    let (width, width_substituted) = resolve_side(raw_width, DimensionField::Width, policy, default)?;
    let (height, height_substituted) = resolve_side(raw_height, DimensionField::Height, policy, default)?;
    Ok(ResolvedDimensions {
        dimensions: Dimensions::new(width, height)?,
        width_substituted,
        height_substituted,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewConfig {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub fill_ratio: f64,
    pub default_dimension: u32,
    pub dimension_policy: DimensionPolicy,
    pub thousands_separator: String,
    pub width_label: String,
    pub height_label: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            fill_ratio: DEFAULT_FILL_RATIO,
            default_dimension: DEFAULT_DIMENSION,
            dimension_policy: DimensionPolicy::Lenient,
            thousands_separator: ",".to_string(),
            width_label: "宽度".to_string(),
            height_label: "高度".to_string(),
        }
    }
}

impl PreviewConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewConfigOverrides {
    pub viewport_width: Option<f64>,
    pub viewport_height: Option<f64>,
    pub fill_ratio: Option<f64>,
    pub default_dimension: Option<u32>,
    pub dimension_policy: Option<DimensionPolicy>,
    pub thousands_separator: Option<String>,
    pub width_label: Option<String>,
    pub height_label: Option<String>,
}

pub fn resolve_preview_config(overrides: PreviewConfigOverrides) -> PreviewConfig {
    let mut cfg = PreviewConfig::default();
    if let Some(width) = overrides.viewport_width {
        cfg.viewport_width = width;
    }
    if let Some(height) = overrides.viewport_height {
        cfg.viewport_height = height;
    }
    if let Some(ratio) = overrides.fill_ratio {
        cfg.fill_ratio = ratio;
    }
    if let Some(default) = overrides.default_dimension.filter(|v| *v >= 1) {
        cfg.default_dimension = default;
    }
    if let Some(policy) = overrides.dimension_policy {
        cfg.dimension_policy = policy;
    }
    // An empty separator is allowed: it disables grouping.
    if let Some(separator) = overrides.thousands_separator {
        cfg.thousands_separator = separator;
    }
    if let Some(label) = overrides.width_label.filter(|v| !v.trim().is_empty()) {
        cfg.width_label = label;
    }
    if let Some(label) = overrides.height_label.filter(|v| !v.trim().is_empty()) {
        cfg.height_label = label;
    }
    cfg
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurfaceTarget {
    Html,
    Png,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TelemetryEventType {
    PreviewStart,
    PreviewSuccess,
    PreviewError,
    DefaultSubstituted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_type: TelemetryEventType,
    pub surface: SurfaceTarget,
    pub dimensions: Option<Dimensions>,
    pub duration_ms: Option<u64>,
    pub detail: Option<String>,
}

pub trait TelemetrySink {
    fn emit(&self, event: TelemetryEvent);
}

/// Everything a surface needs to draw one preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub dimensions: Dimensions,
    pub viewport: Viewport,
    pub fill_ratio: f64,
    pub fit: FitResult,
    pub megapixels: f64,
    pub suggestion: Suggestion,
    pub width_substituted: bool,
    pub height_substituted: bool,
}

impl PreviewReport {
    pub fn any_substituted(&self) -> bool {
        self.width_substituted || self.height_substituted
    }
}

pub fn preview_dimensions(dimensions: Dimensions, config: &PreviewConfig) -> Result<PreviewReport, CoreError> {
    preview_resolved(
        ResolvedDimensions {
            dimensions,
            width_substituted: false,
            height_substituted: false,
        },
        config,
    )
}

fn preview_resolved(resolved: ResolvedDimensions, config: &PreviewConfig) -> Result<PreviewReport, CoreError> {
    let viewport = config.viewport();
    let dimensions = resolved.dimensions;
    Ok(PreviewReport {
        dimensions,
        viewport,
        fill_ratio: config.fill_ratio,
        fit: fit(dimensions, viewport, config.fill_ratio)?,
        megapixels: dimensions.megapixels(),
        suggestion: classify(dimensions),
        width_substituted: resolved.width_substituted,
        height_substituted: resolved.height_substituted,
    })
}

pub fn build_preview(
    raw_width: Option<f64>,
    raw_height: Option<f64>,
    config: &PreviewConfig,
) -> Result<PreviewReport, CoreError> {
    build_preview_with_telemetry(raw_width, raw_height, config, SurfaceTarget::Html, None)
}

pub fn build_preview_with_telemetry(
    raw_width: Option<f64>,
    raw_height: Option<f64>,
    config: &PreviewConfig,
    surface: SurfaceTarget,
    telemetry: Option<&dyn TelemetrySink>,
) -> Result<PreviewReport, CoreError> {
    let start = Instant::now();
    if let Some(sink) = telemetry {
        sink.emit(TelemetryEvent {
            event_type: TelemetryEventType::PreviewStart,
            surface,
            dimensions: None,
            duration_ms: None,
            detail: Some(format!("width={:?},height={:?}", raw_width, raw_height)),
        });
    }
    let outcome = resolve_dimensions(raw_width, raw_height, config.dimension_policy, config.default_dimension)
        .and_then(|resolved| {
            if resolved.any_substituted() {
                if let Some(sink) = telemetry {
                    sink.emit(TelemetryEvent {
                        event_type: TelemetryEventType::DefaultSubstituted,
                        surface,
                        dimensions: Some(resolved.dimensions),
                        duration_ms: None,
                        detail: Some(format!(
                            "width_substituted={},height_substituted={}",
                            resolved.width_substituted, resolved.height_substituted
                        )),
                    });
                }
            }
            preview_resolved(resolved, config)
        });
    match outcome {
        Ok(report) => {
            if let Some(sink) = telemetry {
                sink.emit(TelemetryEvent {
                    event_type: TelemetryEventType::PreviewSuccess,
                    surface,
                    dimensions: Some(report.dimensions),
                    duration_ms: Some(start.elapsed().as_millis() as u64),
                    detail: Some(format!("suggestion={}", report.suggestion)),
                });
            }
            Ok(report)
        }
        Err(err) => {
            if let Some(sink) = telemetry {
                sink.emit(TelemetryEvent {
                    event_type: TelemetryEventType::PreviewError,
                    surface,
                    dimensions: None,
                    duration_ms: Some(start.elapsed().as_millis() as u64),
                    detail: Some(err.to_string()),
                });
            }
            Err(err)
        }
    }
}

pub mod v1 {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PreviewRequest {
        pub width: Option<f64>,
        pub height: Option<f64>,
        pub viewport_width: Option<f64>,
        pub viewport_height: Option<f64>,
        pub fill_ratio: Option<f64>,
        pub dimension_policy: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PreviewResponse {
        pub width: u32,
        pub height: u32,
        pub scaled_width: f64,
        pub scaled_height: f64,
        pub offset_x: f64,
        pub offset_y: f64,
        pub aspect_ratio: String,
        pub pixel_count: String,
        pub megapixels: String,
        pub suggestion: String,
        pub defaulted: bool,
    }
}
