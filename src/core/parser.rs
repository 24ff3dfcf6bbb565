//! Fixed-width record parsing.
//!
//! Column offsets are 1-indexed and inclusive, as printed in the extract's
//! record layout. A field `(start, end)` covers bytes `[start - 1, end)` of the
//! line.

use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

impl Column {
    fn byte_range(&self, line_len: usize) -> (usize, usize) {
        let from = self.start.saturating_sub(1).min(line_len);
        let to = self.end.min(line_len).max(from);
        (from, to)
    }

    pub fn is_filler(&self) -> bool {
        self.name.starts_with("FILLER")
    }
}

/// Immutable record layout shared by every parse worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    columns: Arc<[Column]>,
}

impl ColumnSpec {
    /// Builds a layout from `(name, start, end)` triples.
    ///
    /// Rejects zero or inverted offsets and columns that start before the
    /// previous one ended.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = (S, usize, usize)>) -> Result<Self> {
        let columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, start, end)| Column {
                name: name.into(),
                start,
                end,
            })
            .collect();

        let mut previous_end = 0;
        for column in &columns {
            if column.start == 0 || column.end < column.start {
                return Err(EtlError::ConfigValidationError {
                    field: format!("schema.{}", column.name),
                    message: format!("invalid offsets {}-{}", column.start, column.end),
                });
            }
            if column.start <= previous_end {
                return Err(EtlError::ConfigValidationError {
                    field: format!("schema.{}", column.name),
                    message: format!(
                        "starts at {} but the previous column ends at {}",
                        column.start, previous_end
                    ),
                });
            }
            previous_end = column.end;
        }

        Ok(Self {
            columns: columns.into(),
        })
    }

    /// Layout of the D&B DMI establishment extract, bytes 1-560.
    pub fn dnb() -> Self {
        let columns: [(&str, usize, usize); 58] = [
            ("DUNS", 1, 9),
            ("DCOMP", 10, 39),
            ("DTRADE", 40, 69),
            ("DSTREET", 70, 94),
            ("DCITY", 95, 114),
            ("DSTATEAB", 115, 116),
            ("DZIP5", 117, 121),
            ("DZIP4EXT", 122, 125),
            ("DMAILADD", 126, 150),
            ("DMAILCIT", 151, 170),
            ("DMAILSTA", 171, 172),
            ("DMAILZIP", 173, 177),
            ("DMAILZP4", 178, 181),
            ("DCARRRTC", 182, 185),
            ("FILLER10", 186, 187),
            ("DNATLCOD", 188, 190),
            ("DSTATECO", 191, 192),
            ("DCOUNTYC", 193, 195),
            ("DCITYCOD", 196, 199),
            ("DSMSACOD", 200, 202),
            ("DTELEPHO", 203, 212),
            ("DCEONAME", 213, 242),
            ("DCEOTITT", 243, 272),
            ("DSALESVO", 273, 287),
            ("DSLSVOLC", 288, 288),
            ("DEMTLTOT", 289, 297),
            ("DEMTOTC", 298, 298),
            ("DEMTLHER", 299, 307),
            ("DEMPHRCDC", 308, 308),
            ("DYRSTART", 309, 312),
            ("DSTATUSI", 313, 313),
            ("DSUBSIDI", 314, 314),
            ("DMANUFIN", 315, 315),
            ("DULTDUN", 316, 324),
            ("DHDQDUN", 325, 333),
            ("DPARDUN", 334, 342),
            ("DPRHQCT", 343, 362),
            ("DPRHQST", 363, 364),
            ("FILLER1", 365, 372),
            ("FILLER2", 373, 382),
            ("DHIER", 383, 384),
            ("DDIAS", 385, 393),
            ("DPOPLCD", 394, 394),
            ("DTRANCD", 395, 395),
            ("DRPTDAT", 396, 401),
            ("FILLER3", 402, 420),
            ("DRCRDCL", 421, 421),
            ("DLINEBU", 422, 440),
            ("DPRIMSI", 441, 444),
            ("DSICEXT1", 445, 448),
            ("DSICEXT2", 449, 452),
            ("DSICEXT3", 453, 456),
            ("DSICEXT4", 457, 460),
            ("DSIC2", 461, 480),
            ("DSIC3", 481, 500),
            ("DSIC4", 501, 520),
            ("DSIC5", 521, 540),
            ("DSIC6", 541, 560),
        ];

        let columns: Vec<Column> = columns
            .iter()
            .map(|&(name, start, end)| Column {
                name: name.to_string(),
                start,
                end,
            })
            .collect();
        Self {
            columns: columns.into(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Field names written to the parsed table; filler spans are left out.
    pub fn output_fields(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !c.is_filler())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn record_width(&self) -> usize {
        self.columns.last().map(|c| c.end).unwrap_or(0)
    }
}

/// Raw (untrimmed) bytes of `column` in `line`, clamped to the line length.
pub fn slice_field<'a>(line: &'a str, column: &Column) -> &'a [u8] {
    let bytes = line.as_bytes();
    let (from, to) = column.byte_range(bytes.len());
    &bytes[from..to]
}

pub fn parse_line(line: &str, spec: &ColumnSpec) -> Record {
    let data = spec
        .columns()
        .iter()
        .map(|column| {
            let raw = String::from_utf8_lossy(slice_field(line, column));
            (column.name.clone(), raw.trim().to_string())
        })
        .collect();
    Record { data }
}

#[derive(Debug, Clone)]
pub struct FixedWidthParser {
    spec: ColumnSpec,
    workers: usize,
}

impl FixedWidthParser {
    pub fn new(spec: ColumnSpec) -> Self {
        Self {
            spec,
            workers: default_workers(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn spec(&self) -> &ColumnSpec {
        &self.spec
    }

    /// Parses every line on a dedicated pool. Results keep input order.
    pub fn parse_lines(&self, lines: &[&str]) -> Result<Vec<Record>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| EtlError::processing(format!("failed to build parse pool: {}", e)))?;

        let spec = &self.spec;
        Ok(pool.install(|| lines.par_iter().map(|line| parse_line(line, spec)).collect()))
    }

    pub fn parse_text(&self, text: &str) -> Result<Vec<Record>> {
        let lines: Vec<&str> = text.lines().collect();
        self.parse_lines(&lines)
    }

    /// Reads and parses a whole extract. Unreadable or non-UTF-8 files are fatal.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Record>> {
        let start = Instant::now();
        let text = std::fs::read_to_string(path.as_ref())?;
        let records = self.parse_text(&text)?;

        let short_lines = text
            .lines()
            .filter(|l| l.len() < self.spec.record_width())
            .count();
        if short_lines > 0 {
            tracing::debug!(
                "{} of {} lines are shorter than the {}-byte layout",
                short_lines,
                records.len(),
                self.spec.record_width()
            );
        }

        tracing::info!(
            "📄 Parsed {} records from {} with {} workers in {:?}",
            records.len(),
            path.as_ref().display(),
            self.workers,
            start.elapsed()
        );
        Ok(records)
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
