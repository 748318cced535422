use crate::types::{KmzError, KmzResult, SharedChartRange, TimeSeriesField, ValidityMask};
use chrono::NaiveDate;
use std::fmt::Write;

const CHART_HEADER: &str = "Date, Displacement";

/// Chart data for one pixel: dated displacements plus the shared range
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPayload {
    pub points: Vec<(NaiveDate, f64)>,
    pub range: SharedChartRange,
    pub y_label: String,
}

impl ChartPayload {
    /// The chart's CSV input as a concatenated JavaScript string literal.
    ///
    /// Only dates and finite numbers are interpolated, so the literal never
    /// needs escaping.
    pub fn data_literal(&self) -> String {
        let mut out = format!("\"{}\\n\" + \n", CHART_HEADER);
        for (date, value) in &self.points {
            // Writing to a String cannot fail
            let _ = write!(
                out,
                "\"{}, {}\\n\" + \n",
                date.format("%Y-%m-%d"),
                format_value(*value)
            );
        }
        out.push_str("\"\"");
        out
    }

    /// Chart options object literal
    pub fn options_literal(&self) -> String {
        format!(
            "{{valueRange: [{},{}],ylabel: '{}',}}",
            format_value(self.range.min),
            format_value(self.range.max),
            escape_single_quoted(&self.y_label)
        )
    }
}

/// Escape text for a single-quoted JavaScript string
fn escape_single_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '<' => out.push_str("\\x3c"),
            _ => out.push(c),
        }
    }
    out
}

/// Values come from single-precision rasters; print them at that precision
fn format_value(v: f64) -> String {
    format!("{}", v as f32)
}

/// Min/max over every (date, valid cell) displacement, after unit scaling.
///
/// Cells outside the mask never contribute. A missing value inside the
/// mask means velocity and time-series disagree on validity.
pub fn compute_shared_range(
    field: &TimeSeriesField,
    mask: &ValidityMask,
    scale: f64,
) -> KmzResult<SharedChartRange> {
    let (_, rows, cols) = field.data.dim();
    if mask.dim() != (rows, cols) {
        return Err(KmzError::DataShapeMismatch(format!(
            "Mask is {:?} but time-series grid is {:?}",
            mask.dim(),
            (rows, cols)
        )));
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for band in field.data.outer_iter() {
        for ((idx, &v), &valid) in band.indexed_iter().zip(mask.iter()) {
            if !valid {
                continue;
            }
            if !v.is_finite() {
                return Err(KmzError::DataShapeMismatch(format!(
                    "Missing displacement at valid pixel {:?}",
                    idx
                )));
            }
            let v = v as f64 * scale;
            min = min.min(v);
            max = max.max(v);
        }
    }

    if min > max {
        return Err(KmzError::DataShapeMismatch(
            "No valid pixels to derive a chart range from".to_string(),
        ));
    }
    log::debug!("Shared chart range: [{}, {}]", min, max);
    Ok(SharedChartRange { min, max })
}

/// Encodes pixel histories against one shared chart range
#[derive(Debug, Clone)]
pub struct TimeSeriesEncoder {
    range: SharedChartRange,
    y_label: String,
}

impl TimeSeriesEncoder {
    pub fn new(range: SharedChartRange, unit_label: &str) -> Self {
        Self {
            range,
            y_label: format!("[{}]", unit_label),
        }
    }

    pub fn range(&self) -> SharedChartRange {
        self.range
    }

    /// Build the chart payload of one pixel's (date, displacement) history
    pub fn encode(&self, series: &[(NaiveDate, f64)]) -> KmzResult<ChartPayload> {
        if let Some((date, _)) = series.iter().find(|(_, v)| !v.is_finite()) {
            return Err(KmzError::DataShapeMismatch(format!(
                "Missing displacement on {} for a valid pixel",
                date
            )));
        }
        if series.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(KmzError::DataShapeMismatch(
                "Pixel series is not in ascending date order".to_string(),
            ));
        }
        Ok(ChartPayload {
            points: series.to_vec(),
            range: self.range,
            y_label: self.y_label.clone(),
        })
    }
}
