use crate::domain::model::{Record, DUNS, PRIMARY_SIC, ZIP5};

/// Values that mean "no value" and must never be padded into zeros.
const MISSING_SENTINELS: [&str; 6] = ["", "nan", "NaN", "null", "None", "0"];

pub const ZIP_REFERENCE_ZIP: &str = "zipcode";
pub const ZIP_REFERENCE_STATE: &str = "statefips";
pub const ZIP_REFERENCE_COUNTY: &str = "countyfips";

/// Left-pads `value` with zeros to `width`.
///
/// A float rendering of an integer (`"6037.0"`) is reduced to its digits first.
/// Missing-value sentinels come back unchanged.
pub fn pad_code(value: &str, width: usize) -> String {
    let trimmed = value.trim();
    if MISSING_SENTINELS.contains(&trimmed) {
        return trimmed.to_string();
    }

    let digits = strip_float_suffix(trimmed);
    if digits == "0" || digits.len() >= width {
        return digits.to_string();
    }
    format!("{:0>width$}", digits, width = width)
}

fn strip_float_suffix(value: &str) -> &str {
    match value.split_once('.') {
        Some((int, frac))
            if !int.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b == b'0') =>
        {
            int
        }
        _ => value,
    }
}

/// Restores fixed-width identifier fields after they may have lost leading zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNormalizer {
    widths: Vec<(String, usize)>,
}

impl FieldNormalizer {
    pub fn new<S: Into<String>>(widths: impl IntoIterator<Item = (S, usize)>) -> Self {
        Self {
            widths: widths.into_iter().map(|(f, w)| (f.into(), w)).collect(),
        }
    }

    /// DUNS, ZIP and primary SIC of the establishment extract.
    pub fn dnb() -> Self {
        Self::new([(DUNS, 9), (ZIP5, 5), (PRIMARY_SIC, 4)])
    }

    /// ZIP, state and county codes of the ZIP-to-county reference table.
    pub fn zip_reference() -> Self {
        Self::new([
            (ZIP_REFERENCE_ZIP, 5),
            (ZIP_REFERENCE_STATE, 2),
            (ZIP_REFERENCE_COUNTY, 3),
        ])
    }

    pub fn normalize(&self, record: &mut Record) {
        for (field, width) in &self.widths {
            if let Some(value) = record.data.get_mut(field) {
                *value = pad_code(value, *width);
            }
        }
    }

    pub fn normalize_all(&self, records: &mut [Record]) {
        for record in records.iter_mut() {
            self.normalize(record);
        }
    }
}
