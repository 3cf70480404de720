// Fixed-grid export parsing.
//
// A view export is a pipe-delimited grid: a fixed count of boilerplate
// lines, one header line, then data lines interleaved with divider lines.
// Header and data lines carry the same decorative leading/trailing cells,
// and divider lines are recognized by a dash at a fixed byte offset. Cells
// are assigned to category groups by caller-supplied inclusive column
// ranges, so category membership stays declarative and nothing is scanned
// twice.

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::ingest::record::Category;
use crate::ingest::IngestError;

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// An inclusive (start, end) column range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub start: usize,
    pub end: usize,
}

impl ColumnRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Shape of the export grid plus the category column ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportLayout {
    /// Boilerplate lines discarded before the header.
    pub preamble_lines: usize,
    /// Decorative cells stripped from the front of every split line.
    pub leading_cells: usize,
    /// Decorative cells stripped from the back of every split line.
    pub trailing_cells: usize,
    /// Byte offset checked for the divider sentinel `-`.
    pub divider_offset: usize,
    /// Disjoint column range per category, applied to header and data rows
    /// alike.
    pub ranges: Vec<(Category, ColumnRange)>,
}

impl Default for ExportLayout {
    /// The stock player-search view layout.
    fn default() -> Self {
        Self {
            preamble_lines: 8,
            leading_cells: 1,
            trailing_cells: 3,
            divider_offset: 3,
            ranges: vec![
                (Category::Stats, ColumnRange::new(0, 22)),
                (Category::Attributes, ColumnRange::new(23, 69)),
                (Category::Contract, ColumnRange::new(70, 75)),
                (Category::Rating, ColumnRange::new(79, 79)),
                (Category::Identity, ColumnRange::new(80, 81)),
                (Category::Profile, ColumnRange::new(82, 90)),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Single-pass reader over one export. Construction consumes the preamble
/// and header; iteration yields one trimmed cell vector per data line,
/// skipping blank and divider lines. Not restartable: the underlying reader
/// is consumed as it goes.
#[derive(Debug)]
pub struct ExportReader<R: BufRead> {
    lines: std::io::Lines<R>,
    headers: Vec<String>,
    leading_cells: usize,
    trailing_cells: usize,
    divider_offset: usize,
}

impl<R: BufRead> ExportReader<R> {
    pub fn new(reader: R, layout: &ExportLayout) -> Result<Self, IngestError> {
        let mut lines = reader.lines();
        for i in 0..layout.preamble_lines {
            lines.next().transpose()?.ok_or_else(|| {
                IngestError::Format(format!(
                    "export ended inside the preamble (line {} of {})",
                    i + 1,
                    layout.preamble_lines
                ))
            })?;
        }

        let header_line = lines
            .next()
            .transpose()?
            .ok_or_else(|| IngestError::Format("export has no header line".to_string()))?;
        let headers = split_cells(&header_line, layout.leading_cells, layout.trailing_cells);
        if headers.is_empty() {
            return Err(IngestError::Format(format!(
                "header line has no cells after stripping {} leading and {} trailing",
                layout.leading_cells, layout.trailing_cells
            )));
        }

        Ok(Self {
            lines,
            headers,
            leading_cells: layout.leading_cells,
            trailing_cells: layout.trailing_cells,
            divider_offset: layout.divider_offset,
        })
    }

    /// Header cells, stripped and trimmed like every data row.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: BufRead> Iterator for ExportReader<R> {
    type Item = Result<Vec<String>, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                continue;
            }
            if line.as_bytes().get(self.divider_offset) == Some(&b'-') {
                continue;
            }
            let cells = split_cells(&line, self.leading_cells, self.trailing_cells);
            if cells.len() != self.headers.len() {
                return Some(Err(IngestError::Format(format!(
                    "data line has {} cells, header has {}",
                    cells.len(),
                    self.headers.len()
                ))));
            }
            return Some(Ok(cells));
        }
    }
}

/// Split a grid line on `|`, strip the decorative cells, trim the rest.
fn split_cells(line: &str, leading: usize, trailing: usize) -> Vec<String> {
    let cells: Vec<&str> = line.split('|').collect();
    if cells.len() <= leading + trailing {
        return Vec::new();
    }
    cells[leading..cells.len() - trailing]
        .iter()
        .map(|c| c.trim().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Range slicing
// ---------------------------------------------------------------------------

/// Slice header and value arrays by the layout's category ranges, producing
/// `{category → [(header, value)]}` for one row.
pub fn slice_groups<'a>(
    headers: &'a [String],
    cells: &'a [String],
    ranges: &[(Category, ColumnRange)],
) -> Result<Vec<(Category, Vec<(&'a str, &'a str)>)>, IngestError> {
    let mut groups = Vec::with_capacity(ranges.len());
    for (category, range) in ranges {
        if range.start > range.end {
            return Err(IngestError::Format(format!(
                "{category} range starts at {} but ends at {}",
                range.start, range.end
            )));
        }
        if range.end >= headers.len() || range.end >= cells.len() {
            return Err(IngestError::Format(format!(
                "{category} range ends at column {} but the row has {} cells",
                range.end,
                cells.len()
            )));
        }
        let pairs = headers[range.start..=range.end]
            .iter()
            .zip(&cells[range.start..=range.end])
            .map(|(h, v)| (h.as_str(), v.as_str()))
            .collect();
        groups.push((*category, pairs));
    }
    Ok(groups)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
