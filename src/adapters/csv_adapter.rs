//! CSV file indicator provider.
//!
//! One `<SYMBOL>.csv` per symbol with a header row:
//! `date,open,high,low,close,volume[,rsi10,ema9,ema200]`.
//! Blank cells load as missing values so the day is skipped downstream;
//! unparsable cells fail the whole file. When the file has no indicator
//! columns at all they are derived from the full close history before the
//! date filter is applied.

use crate::domain::bar::DailyBar;
use crate::domain::error::DipbuyerError;
use crate::domain::indicator;
use crate::ports::data_port::IndicatorProvider;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvBarProvider {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    indicators: Option<IndicatorColumns>,
}

struct IndicatorColumns {
    rsi10: Option<usize>,
    ema9: Option<usize>,
    ema200: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, path: &Path) -> Result<Self, DipbuyerError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| DipbuyerError::Data {
                reason: format!("{}: missing {} column", path.display(), name),
            })
        };

        let rsi10 = find("rsi10");
        let ema9 = find("ema9");
        let ema200 = find("ema200");
        let indicators = if rsi10.is_none() && ema9.is_none() && ema200.is_none() {
            None
        } else {
            Some(IndicatorColumns { rsi10, ema9, ema200 })
        };

        Ok(Columns {
            date: require("date")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: require("volume")?,
            indicators,
        })
    }
}

fn cell<'r>(record: &'r StringRecord, idx: usize) -> Option<&'r str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_optional(
    record: &StringRecord,
    idx: Option<usize>,
    name: &str,
    line: u64,
) -> Result<Option<f64>, DipbuyerError> {
    match idx.and_then(|i| cell(record, i)) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|e| DipbuyerError::Data {
            reason: format!("line {}: invalid {} value {:?}: {}", line, name, raw, e),
        }),
    }
}

fn parse_price(
    record: &StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<f64, DipbuyerError> {
    Ok(parse_optional(record, Some(idx), name, line)?.unwrap_or(f64::NAN))
}

impl CsvBarProvider {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn load(&self, symbol: &str) -> Result<Vec<DailyBar>, DipbuyerError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Err(DipbuyerError::NoData {
                symbol: symbol.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| DipbuyerError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| DipbuyerError::Data {
            reason: format!("{}: CSV header error: {}", path.display(), e),
        })?;
        let cols = Columns::from_headers(headers, &path)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| DipbuyerError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let date_str = cell(&record, cols.date).ok_or_else(|| DipbuyerError::Data {
                reason: format!("line {}: missing date", line),
            })?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                DipbuyerError::Data {
                    reason: format!("line {}: invalid date format: {}", line, e),
                }
            })?;

            let volume = match cell(&record, cols.volume) {
                None => 0,
                Some(raw) => raw.parse::<f64>().map(|v| v as i64).map_err(|e| {
                    DipbuyerError::Data {
                        reason: format!("line {}: invalid volume value: {}", line, e),
                    }
                })?,
            };

            let (rsi10, ema9, ema200) = match &cols.indicators {
                Some(ind) => (
                    parse_optional(&record, ind.rsi10, "rsi10", line)?,
                    parse_optional(&record, ind.ema9, "ema9", line)?,
                    parse_optional(&record, ind.ema200, "ema200", line)?,
                ),
                None => (None, None, None),
            };

            bars.push(DailyBar {
                date,
                open: parse_price(&record, cols.open, "open", line)?,
                high: parse_price(&record, cols.high, "high", line)?,
                low: parse_price(&record, cols.low, "low", line)?,
                close: parse_price(&record, cols.close, "close", line)?,
                volume,
                rsi10,
                ema9,
                ema200,
            });
        }

        bars.sort_by_key(|b| b.date);
        if cols.indicators.is_none() {
            tracing::debug!(symbol, bars = bars.len(), "deriving indicators from closes");
            indicator::enrich(&mut bars);
        }
        Ok(bars)
    }
}

impl IndicatorProvider for CsvBarProvider {
    fn get_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, DipbuyerError> {
        let mut bars = self.load(symbol)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, DipbuyerError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| DipbuyerError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DipbuyerError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume,rsi10,ema9,ema200\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000,41.0,112.0,100.0\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000,28.5,108.0,99.0\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000,,109.0,99.5\n";

        fs::write(path.join("AAPL.csv"), csv_content).unwrap();
        fs::write(path.join("MSFT.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "ignore me").unwrap();

        (dir, path)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn get_bars_reads_sorted_with_indicators() {
        let (_dir, path) = setup_test_data();
        let provider = CsvBarProvider::new(path);

        let bars = provider
            .get_bars("AAPL", d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, d(2024, 1, 15));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].volume, 50000);
        assert_eq!(bars[0].rsi10, Some(28.5));
        assert_eq!(bars[0].ema200, Some(99.0));
        assert!(bars[0].is_complete());
    }

    #[test]
    fn blank_indicator_cell_is_missing() {
        let (_dir, path) = setup_test_data();
        let provider = CsvBarProvider::new(path);
        let bars = provider
            .get_bars("AAPL", d(2024, 1, 16), d(2024, 1, 16))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].rsi10, None);
        assert!(!bars[0].is_complete());
    }

    #[test]
    fn get_bars_filters_date_range() {
        let (_dir, path) = setup_test_data();
        let provider = CsvBarProvider::new(path);
        let bars = provider
            .get_bars("AAPL", d(2024, 1, 16), d(2024, 1, 17))
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(2024, 1, 16));
    }

    #[test]
    fn missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let provider = CsvBarProvider::new(path);
        let err = provider
            .get_bars("NVDA", d(2024, 1, 1), d(2024, 12, 31))
            .unwrap_err();
        assert!(matches!(err, DipbuyerError::NoData { symbol } if symbol == "NVDA"));
    }

    #[test]
    fn invalid_number_fails_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("BAD.csv"),
            "date,open,high,low,close,volume\n2024-01-02,abc,1,1,1,1\n",
        )
        .unwrap();
        let provider = CsvBarProvider::new(dir.path().to_path_buf());
        let err = provider
            .get_bars("BAD", d(2024, 1, 1), d(2024, 12, 31))
            .unwrap_err();
        assert!(matches!(err, DipbuyerError::Data { .. }));
    }

    #[test]
    fn missing_required_column_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("X.csv"), "date,open,high,low,close\n").unwrap();
        let provider = CsvBarProvider::new(dir.path().to_path_buf());
        let err = provider
            .get_bars("X", d(2024, 1, 1), d(2024, 12, 31))
            .unwrap_err();
        assert!(err.to_string().contains("volume"));
    }

    #[test]
    fn blank_price_loads_as_malformed_day() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("GAP.csv"),
            "date,open,high,low,close,volume,rsi10,ema9,ema200\n2024-01-02,10,11,,10.5,100,40,10,9\n",
        )
        .unwrap();
        let provider = CsvBarProvider::new(dir.path().to_path_buf());
        let bars = provider
            .get_bars("GAP", d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        let err = bars[0].validate().unwrap_err();
        assert_eq!(err.field, "low");
    }

    #[test]
    fn indicators_derived_when_columns_absent() {
        let dir = TempDir::new().unwrap();
        let mut content = String::from("date,open,high,low,close,volume\n");
        let start = d(2023, 1, 1);
        for i in 0..220 {
            let date = start + chrono::Duration::days(i);
            let close = 50.0 + (i as f64 * 0.3).sin() * 3.0;
            content.push_str(&format!(
                "{},{},{},{},{},1000\n",
                date.format("%Y-%m-%d"),
                close,
                close + 0.5,
                close - 0.5,
                close
            ));
        }
        fs::write(dir.path().join("RAW.csv"), content).unwrap();
        let provider = CsvBarProvider::new(dir.path().to_path_buf());

        // Range starts after the warm-up: history before it still seeds EMA(200).
        let from = start + chrono::Duration::days(205);
        let bars = provider.get_bars("RAW", from, d(2030, 1, 1)).unwrap();
        assert_eq!(bars.len(), 15);
        assert!(bars.iter().all(DailyBar::is_complete));
    }

    #[test]
    fn blank_close_without_indicator_columns_skips_one_day() {
        let dir = TempDir::new().unwrap();
        let mut content = String::from("date,open,high,low,close,volume\n");
        let start = d(2023, 1, 1);
        for i in 0..400 {
            let date = start + chrono::Duration::days(i);
            let close = 50.0 + (i as f64 * 0.3).sin() * 3.0;
            let close_cell = if i == 5 {
                String::new()
            } else {
                close.to_string()
            };
            content.push_str(&format!(
                "{},{},{},{},{},1000\n",
                date.format("%Y-%m-%d"),
                close,
                close + 0.5,
                close - 0.5,
                close_cell
            ));
        }
        fs::write(dir.path().join("HOLE.csv"), content).unwrap();
        let provider = CsvBarProvider::new(dir.path().to_path_buf());

        let bars = provider
            .get_bars("HOLE", start, d(2030, 1, 1))
            .unwrap();
        assert_eq!(bars.len(), 400);
        assert_eq!(bars[5].validate().unwrap_err().field, "close");

        let complete = bars.iter().filter(|b| b.is_complete()).count();
        assert_eq!(complete, 200);
        assert!(bars[399].ema200.unwrap().is_finite());
    }

    #[test]
    fn list_symbols_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let provider = CsvBarProvider::new(path);
        assert_eq!(provider.list_symbols().unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn list_symbols_missing_directory_fails() {
        let provider = CsvBarProvider::new(PathBuf::from("/nonexistent/bars"));
        assert!(provider.list_symbols().is_err());
    }
}
