//! CSV export of peak tables
//!
//! Field and decimal separators follow the user's locale: `,` and `.` for
//! English-style locales, `;` and `,` where the comma is the decimal mark.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use super::spectrum::PeakRow;

/// Separators used when writing numbers and fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvFormat {
    pub field_separator: char,
    pub decimal_separator: char,
}

impl CsvFormat {
    pub const ENGLISH: CsvFormat = CsvFormat {
        field_separator: ',',
        decimal_separator: '.',
    };

    pub const EUROPEAN: CsvFormat = CsvFormat {
        field_separator: ';',
        decimal_separator: ',',
    };

    /// Format for a locale tag such as `en_US` or `fr-FR`
    pub fn for_locale(locale: &str) -> Self {
        let language = locale
            .split(|c| c == '_' || c == '-' || c == '.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match language.as_str() {
            "en" | "ja" | "zh" | "ko" | "he" | "th" | "" | "c" | "posix" => Self::ENGLISH,
            _ => Self::EUROPEAN,
        }
    }

    fn number(&self, value: f64, decimals: usize) -> String {
        let text = format!("{:.*}", decimals, value);
        if self.decimal_separator == '.' {
            text
        } else {
            text.replace('.', &self.decimal_separator.to_string())
        }
    }

    fn text(&self, value: &str) -> String {
        if value.contains(self.field_separator) || value.contains('"') || value.contains('\n') {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self::ENGLISH
    }
}

/// Peak rows of one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakTable {
    pub sample: String,
    pub rows: Vec<PeakRow>,
}

/// Write the peak tables of several samples as one CSV document
///
/// Columns: sample, peak number, factor, frequency (Hz), cent correction.
pub fn write_peaks_csv<W: Write>(
    writer: &mut W,
    tables: &[PeakTable],
    format: CsvFormat,
) -> io::Result<()> {
    let sep = format.field_separator;
    writeln!(writer, "sample{sep}peak{sep}factor{sep}frequency{sep}correction")?;
    for table in tables {
        let sample = format.text(&table.sample);
        for row in &table.rows {
            writeln!(
                writer,
                "{}{sep}{}{sep}{}{sep}{}{sep}{}",
                sample,
                row.number,
                format.number(row.factor, 3),
                format.number(row.frequency, 2),
                row.correction,
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> Vec<PeakTable> {
        vec![PeakTable {
            sample: "Flute; C5".to_string(),
            rows: vec![PeakRow {
                number: 1,
                factor: 1.0,
                frequency: 523.25,
                key: 72,
                correction: -3,
            }],
        }]
    }

    #[test]
    fn test_english_format() {
        let mut out = Vec::new();
        write_peaks_csv(&mut out, &table(), CsvFormat::ENGLISH).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "sample,peak,factor,frequency,correction\nFlute; C5,1,1.000,523.25,-3\n"
        );
    }

    #[test]
    fn test_european_format_quotes_separator() {
        let mut out = Vec::new();
        write_peaks_csv(&mut out, &table(), CsvFormat::EUROPEAN).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "sample;peak;factor;frequency;correction\n\"Flute; C5\";1;1,000;523,25;-3\n"
        );
    }

    #[test]
    fn test_locale_lookup() {
        assert_eq!(CsvFormat::for_locale("en_US.UTF-8"), CsvFormat::ENGLISH);
        assert_eq!(CsvFormat::for_locale("fr-FR"), CsvFormat::EUROPEAN);
        assert_eq!(CsvFormat::for_locale("C"), CsvFormat::ENGLISH);
    }
}
