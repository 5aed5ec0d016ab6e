use crate::{CoreError, DimensionField, Dimensions, FitResult, Viewport};

/// Fraction of the viewport the preview rectangle may occupy on its limiting side.
pub const DEFAULT_FILL_RATIO: f64 = 0.8;

fn check_positive(field: DimensionField, value: f64) -> Result<(), CoreError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidDimension {
            field,
            value: Some(value),
        })
    }
}

/// Scales `dimensions` into `viewport`, preserving aspect ratio, and centers it.
///
/// The limiting side is scaled to `fill_ratio` of the viewport; the other
/// side follows from the aspect ratio. `fill_ratio` must lie in `(0, 1]`.
pub fn fit(dimensions: Dimensions, viewport: Viewport, fill_ratio: f64) -> Result<FitResult, CoreError> {
    check_positive(DimensionField::ViewportWidth, viewport.width)?;
    check_positive(DimensionField::ViewportHeight, viewport.height)?;
    if !(fill_ratio.is_finite() && fill_ratio > 0.0 && fill_ratio <= 1.0) {
        return Err(CoreError::InvalidDimension {
            field: DimensionField::FillRatio,
            value: Some(fill_ratio),
        });
    }

    let aspect = dimensions.aspect_ratio();
    let (scaled_width, scaled_height) = if aspect > 1.0 {
        let width = (viewport.width * fill_ratio).min(viewport.height * fill_ratio * aspect);
        (width, width / aspect)
    } else {
        let height = (viewport.height * fill_ratio).min(viewport.width * fill_ratio / aspect);
        (height * aspect, height)
    };

    Ok(FitResult {
        scaled_width,
        scaled_height,
        offset_x: (viewport.width - scaled_width) / 2.0,
        offset_y: (viewport.height - scaled_height) / 2.0,
    })
}

pub fn fit_default(dimensions: Dimensions, viewport: Viewport) -> Result<FitResult, CoreError> {
    fit(dimensions, viewport, DEFAULT_FILL_RATIO)
}
