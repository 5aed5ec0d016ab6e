use sizepreview_core::{aspect_ratio, CoreError, Dimensions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedDimensions {
    pub dimensions: String,
    pub aspect_ratio: String,
    pub pixel_count: String,
    pub megapixels: String,
}

pub fn format_dimensions(dimensions: Dimensions, thousands_separator: &str) -> FormattedDimensions {
    FormattedDimensions {
        dimensions: format!("{} × {}", dimensions.width(), dimensions.height()),
        aspect_ratio: format_aspect_ratio(dimensions),
        pixel_count: format_pixel_count(dimensions, thousands_separator),
        megapixels: format_megapixels(dimensions),
    }
}

/// `width / height` as `R:1` with two decimals, e.g. `1.78:1`.
pub fn format_aspect_ratio(dimensions: Dimensions) -> String {
    format!("{}:1", fixed2(dimensions.aspect_ratio()))
}

pub fn format_aspect_ratio_raw(width: u32, height: u32) -> Result<String, CoreError> {
    Ok(format!("{}:1", fixed2(aspect_ratio(width, height)?)))
}

pub fn format_pixel_count(dimensions: Dimensions, thousands_separator: &str) -> String {
    group_thousands(dimensions.pixel_count(), thousands_separator)
}

pub fn format_megapixels(dimensions: Dimensions) -> String {
    fixed2(dimensions.megapixels())
}

pub fn group_thousands(value: u64, separator: &str) -> String {
    let digits = value.to_string();
    if separator.is_empty() {
        return digits;
    }
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

// Two decimals with ties rounded up, as host number widgets display them.
fn fixed2(value: f64) -> String {
    format!("{:.2}", (value * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions::new(width, height).expect("positive test dimensions")
    }

    #[test]
    fn aspect_ratio_uses_two_decimals() {
        assert_eq!(format_aspect_ratio(dims(1920, 1080)), "1.78:1");
        assert_eq!(format_aspect_ratio(dims(512, 512)), "1.00:1");
        assert_eq!(format_aspect_ratio(dims(832, 1216)), "0.68:1");
    }

    #[test]
    fn aspect_ratio_ties_round_up() {
        assert_eq!(format_aspect_ratio(dims(1152, 1024)), "1.13:1");
    }

    #[test]
    fn raw_aspect_ratio_reports_zero_height() {
        assert_eq!(format_aspect_ratio_raw(1920, 1080).as_deref(), Ok("1.78:1"));
        assert_eq!(format_aspect_ratio_raw(1920, 0), Err(CoreError::DivisionByZero));
    }

    #[test]
    fn pixel_count_groups_thousands() {
        assert_eq!(format_pixel_count(dims(1920, 1080), ","), "2,073,600");
        assert_eq!(format_pixel_count(dims(4096, 3072), "\u{202f}"), "12\u{202f}582\u{202f}912");
        assert_eq!(format_pixel_count(dims(10, 10), ","), "100");
        assert_eq!(format_pixel_count(dims(100, 10), ","), "1,000");
    }

    #[test]
    fn empty_separator_disables_grouping() {
        assert_eq!(group_thousands(1_234_567, ""), "1234567");
    }

    #[test]
    fn megapixels_use_two_decimals() {
        assert_eq!(format_megapixels(dims(4096, 3072)), "12.58");
        assert_eq!(format_megapixels(dims(100, 100)), "0.01");
        assert_eq!(format_megapixels(dims(512, 512)), "0.26");
    }

    #[test]
    fn bundle_formats_every_field() {
        let formatted = format_dimensions(dims(1024, 768), ",");
        assert_eq!(
            formatted,
            FormattedDimensions {
                dimensions: "1024 × 768".to_string(),
                aspect_ratio: "1.33:1".to_string(),
                pixel_count: "786,432".to_string(),
                megapixels: "0.79".to_string(),
            }
        );
    }
}
