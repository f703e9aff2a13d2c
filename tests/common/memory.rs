// In-memory tabular backend with A1 range addressing and fault injection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;

use steam_player_tracker::sheets::{SheetsError, TabularClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    start_col: usize,
    start_row: Option<usize>,
    end_col: usize,
    end_row: Option<usize>,
}

/// Parses `Sheet!A1:B2`, `Sheet!A:B`, `Sheet!A2:A` or `Sheet!A1` (rows 1-based).
fn parse_range(range: &str) -> Result<(&str, CellRange), SheetsError> {
    let bad = || SheetsError::RangeNotFound(range.to_string());
    let (sheet, cells) = range.rsplit_once('!').ok_or_else(bad)?;
    let (start, end) = cells.split_once(':').unwrap_or((cells, cells));
    let (start_col, start_row) = parse_cell(start).ok_or_else(bad)?;
    let (end_col, end_row) = parse_cell(end).ok_or_else(bad)?;
    if end_col < start_col {
        return Err(bad());
    }
    Ok((
        sheet,
        CellRange {
            start_col,
            start_row,
            end_col,
            end_row,
        },
    ))
}

fn parse_cell(cell: &str) -> Option<(usize, Option<usize>)> {
    let split = cell.find(|c: char| c.is_ascii_digit()).unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        col = col * 26 + (c as usize - 'A' as usize + 1);
    }
    let row = if digits.is_empty() {
        None
    } else {
        Some(digits.parse::<usize>().ok().filter(|r| *r > 0)?)
    };
    Some((col - 1, row))
}

fn last_non_empty_row(rows: &[Vec<String>]) -> usize {
    rows.iter()
        .rposition(|r| r.iter().any(|c| !c.is_empty()))
        .map_or(0, |i| i + 1)
}

fn write_block(rows: &mut Vec<Vec<String>>, first_row: usize, first_col: usize, block: Vec<Vec<String>>) {
    for (offset, values) in block.into_iter().enumerate() {
        let idx = first_row + offset;
        if rows.len() <= idx {
            rows.resize_with(idx + 1, Vec::new);
        }
        let row = &mut rows[idx];
        if row.len() < first_col + values.len() {
            row.resize(first_col + values.len(), String::new());
        }
        for (c, v) in values.into_iter().enumerate() {
            row[first_col + c] = v;
        }
    }
}

/// Spreadsheet held in memory. Missing sheets answer with `RangeNotFound`, like the real service.
#[derive(Debug, Default)]
pub struct MemoryTabularClient {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    unavailable: AtomicBool,
    fail_next: AtomicU32,
    requests: AtomicUsize,
}

impl MemoryTabularClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every request fails with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fails the next `n` requests with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Non-empty rows of `sheet` including the header, trailing empty cells trimmed.
    pub fn rows(&self, sheet: &str) -> Vec<Vec<String>> {
        let sheets = self.sheets.lock().unwrap_or_else(|e| e.into_inner());
        sheets
            .get(sheet)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.iter().any(|c| !c.is_empty()))
                    .map(|r| trim_row(r))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn begin(&self) -> Result<(), SheetsError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SheetsError::Transport("service unavailable".into()));
        }
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(SheetsError::Transport("injected failure".into()));
        }
        Ok(())
    }

    fn with_sheet<T>(
        &self,
        range: &str,
        f: impl FnOnce(&mut Vec<Vec<String>>, CellRange) -> T,
    ) -> Result<T, SheetsError> {
        self.begin()?;
        let (sheet, cells) = parse_range(range)?;
        let mut sheets = self.sheets.lock().unwrap_or_else(|e| e.into_inner());
        let rows = sheets
            .get_mut(sheet)
            .ok_or_else(|| SheetsError::RangeNotFound(range.to_string()))?;
        Ok(f(rows, cells))
    }
}

fn trim_row(row: &[String]) -> Vec<String> {
    let len = row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
    row[..len].to_vec()
}

#[async_trait]
impl TabularClient for MemoryTabularClient {
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        self.with_sheet(range, |rows, cells| {
            let first = cells.start_row.unwrap_or(1) - 1;
            let last = cells.end_row.unwrap_or(rows.len()).min(rows.len());
            let mut out: Vec<Vec<String>> = (first..last)
                .map(|i| {
                    let row = &rows[i];
                    let end = (cells.end_col + 1).min(row.len());
                    let slice = if cells.start_col < end {
                        &row[cells.start_col..end]
                    } else {
                        &[][..]
                    };
                    trim_row(slice)
                })
                .collect();
            while out.last().is_some_and(|r| r.is_empty()) {
                out.pop();
            }
            out
        })
    }

    async fn update_values(&self, range: &str, values: Vec<Vec<String>>) -> Result<(), SheetsError> {
        self.with_sheet(range, |rows, cells| {
            let first = cells.start_row.unwrap_or(1) - 1;
            write_block(rows, first, cells.start_col, values);
        })
    }

    async fn append_values(&self, range: &str, values: Vec<Vec<String>>) -> Result<(), SheetsError> {
        self.with_sheet(range, |rows, cells| {
            let first = last_non_empty_row(rows);
            write_block(rows, first, cells.start_col, values);
        })
    }

    async fn clear_values(&self, range: &str) -> Result<(), SheetsError> {
        self.with_sheet(range, |rows, cells| {
            let first = cells.start_row.unwrap_or(1) - 1;
            let last = cells.end_row.unwrap_or(rows.len()).min(rows.len());
            for row in rows.iter_mut().take(last).skip(first) {
                let end = (cells.end_col + 1).min(row.len());
                for cell in row.iter_mut().take(end).skip(cells.start_col) {
                    cell.clear();
                }
            }
        })
    }

    async fn add_sheet(&self, title: &str) -> Result<(), SheetsError> {
        self.begin()?;
        let mut sheets = self.sheets.lock().unwrap_or_else(|e| e.into_inner());
        if sheets.contains_key(title) {
            return Err(SheetsError::SheetExists(title.to_string()));
        }
        sheets.insert(title.to_string(), Vec::new());
        Ok(())
    }
}
