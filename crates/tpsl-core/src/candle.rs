use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLC bar. Volume is carried but never read by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Struct-of-Arrays candle storage for cache-efficient access.
///
/// All vectors are parallel: index `i` across all fields is one candle.
/// The store is built once by the loader and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct CandleStore {
    pub timestamps: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl CandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(cap),
            open: Vec::with_capacity(cap),
            high: Vec::with_capacity(cap),
            low: Vec::with_capacity(cap),
            close: Vec::with_capacity(cap),
            volume: Vec::with_capacity(cap),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, ts: i64, o: f64, h: f64, l: f64, c: f64, v: f64) {
        self.timestamps.push(ts);
        self.open.push(o);
        self.high.push(h);
        self.low.push(l);
        self.close.push(c);
        self.volume.push(v);
    }

    /// Row view of candle `i`. Panics if `i` is out of bounds, like slice indexing.
    #[inline]
    pub fn candle(&self, i: usize) -> Candle {
        Candle {
            timestamp: self.timestamps[i],
            open: self.open[i],
            high: self.high[i],
            low: self.low[i],
            close: self.close[i],
            volume: self.volume[i],
        }
    }

    /// Load candles from a CSV file using memory-mapped I/O.
    ///
    /// Expected row format: `datetime;open;high;low;close[;volume]` (commas are
    /// accepted too). See [`CandleStore::parse_csv_bytes`].
    pub fn from_csv(path: &Path) -> Result<Self, CsvError> {
        let file = std::fs::File::open(path)
            .map_err(|e| CsvError::Io(format!("{}: {}", path.display(), e)))?;
        // SAFETY: the map is read-only and dropped before this function returns.
        let mmap =
            unsafe { memmap2::Mmap::map(&file) }.map_err(|e| CsvError::Io(e.to_string()))?;

        let store = Self::parse_csv_bytes(&mmap[..])?;
        tracing::info!(path = %path.display(), candles = store.len(), "loaded candles");
        Ok(store)
    }

    /// Parse CSV from raw bytes (testable without files).
    ///
    /// Rows whose numeric fields do not parse (header lines, blank or truncated
    /// rows) are skipped. The result is stably sorted by timestamp.
    ///
    /// A row whose prices parse but whose datetime is in an unknown format is
    /// kept. If any row is like that, the whole file stays in file order and
    /// such rows get their row index as timestamp.
    pub fn parse_csv_bytes(data: &[u8]) -> Result<Self, CsvError> {
        // Estimate row count for pre-allocation (avg ~50 bytes per row)
        let mut store = Self::with_capacity(data.len() / 50);
        let mut skipped = 0usize;
        let mut untimed = 0usize;
        let mut first_row = true;

        let len = data.len();
        let mut pos = 0;
        while pos < len {
            let line_end = memchr::memchr(b'\n', &data[pos..])
                .map(|i| pos + i)
                .unwrap_or(len);
            let mut line = &data[pos..line_end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            pos = line_end + 1;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match Self::parse_row(line) {
                Ok((c, timed)) => {
                    let ts = if timed {
                        c.timestamp
                    } else {
                        untimed += 1;
                        store.len() as i64
                    };
                    store.push(ts, c.open, c.high, c.low, c.close, c.volume);
                }
                // A leading non-numeric row is the header.
                Err(_) if first_row => {}
                Err(e) => {
                    tracing::trace!(error = %e, "skipping csv row");
                    skipped += 1;
                }
            }
            first_row = false;
        }

        if skipped > 0 {
            tracing::warn!(skipped, kept = store.len(), "skipped malformed csv rows");
        }
        if store.is_empty() {
            return Err(CsvError::Empty);
        }
        if untimed > 0 {
            tracing::warn!(untimed, "unrecognised datetime format, keeping file order");
            return Ok(store);
        }

        let mut indices: Vec<usize> = (0..store.len()).collect();
        indices.sort_by_key(|&i| store.timestamps[i]);
        if indices.windows(2).all(|w| w[0] < w[1]) {
            return Ok(store);
        }
        Ok(Self::reorder(&store, &indices))
    }

    /// Parse one row. The flag is false when the datetime was not understood,
    /// in which case `timestamp` is 0.
    fn parse_row(line: &[u8]) -> Result<(Candle, bool), CsvError> {
        let delim = if memchr::memchr(b';', line).is_some() {
            b';'
        } else {
            b','
        };

        let mut fields = [&line[..0]; 6];
        let mut count = 0;
        let mut start = 0;
        for end in memchr::memchr_iter(delim, line).chain(std::iter::once(line.len())) {
            if count == fields.len() {
                break;
            }
            fields[count] = trim(&line[start..end.max(start)]);
            count += 1;
            start = end + 1;
        }

        if count < 5 {
            return Err(CsvError::Parse(format!(
                "expected at least 5 columns, got {}",
                count
            )));
        }

        let ts = parse_timestamp(fields[0]).ok();
        let o = parse_price(fields[1], "open")?;
        let h = parse_price(fields[2], "high")?;
        let l = parse_price(fields[3], "low")?;
        let c = parse_price(fields[4], "close")?;
        let v = if count > 5 && !fields[5].is_empty() {
            parse_price(fields[5], "volume")?
        } else {
            0.0
        };

        let candle = Candle {
            timestamp: ts.unwrap_or(0),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        };
        Ok((candle, ts.is_some()))
    }

    fn reorder(store: &CandleStore, indices: &[usize]) -> CandleStore {
        let mut result = CandleStore::with_capacity(indices.len());
        for &i in indices {
            result.push(
                store.timestamps[i],
                store.open[i],
                store.high[i],
                store.low[i],
                store.close[i],
                store.volume[i],
            );
        }
        result
    }
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn parse_price(bytes: &[u8], field: &str) -> Result<f64, CsvError> {
    let value: f64 =
        fast_float::parse(bytes).map_err(|_| CsvError::Parse(format!("bad {}", field)))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CsvError::Parse(format!("non-finite {}", field)))
    }
}

/// Parse a timestamp to Unix epoch seconds.
///
/// Handles `2025-11-08T00:00:00Z`, `2024-02-08 00:00:00+00:00`, `2024.02.08 13:45`
/// and plain integer unix seconds. Any single byte may separate the date and
/// time components.
fn parse_timestamp(bytes: &[u8]) -> Result<i64, CsvError> {
    if !bytes.is_empty() && bytes.iter().all(u8::is_ascii_digit) {
        return digits(bytes)
            .map(|v| v as i64)
            .ok_or_else(|| CsvError::Parse("bad unix timestamp".into()));
    }

    if bytes.len() < 16 {
        return Err(CsvError::Parse(format!(
            "timestamp too short: {}",
            String::from_utf8_lossy(bytes)
        )));
    }

    let field = |range: std::ops::Range<usize>, name: &str| {
        digits(&bytes[range]).ok_or_else(|| CsvError::Parse(format!("bad {}", name)))
    };

    let year = field(0..4, "year")? as i32;
    let month = field(5..7, "month")? as u32;
    let day = field(8..10, "day")? as u32;
    let hour = field(11..13, "hour")?;
    let minute = field(14..16, "minute")?;
    let second = if bytes.len() >= 19 && bytes[16] == b':' {
        field(17..19, "second")?
    } else {
        0
    };

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 60 {
        return Err(CsvError::Parse(format!(
            "timestamp out of range: {}",
            String::from_utf8_lossy(bytes)
        )));
    }

    let days = days_from_civil(year, month, day);
    Ok(days * 86400 + hour as i64 * 3600 + minute as i64 * 60 + second as i64)
}

fn digits(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    bytes.iter().try_fold(0u64, |acc, &b| {
        if b.is_ascii_digit() {
            acc.checked_mul(10)?.checked_add((b - b'0') as u64)
        } else {
            None
        }
    })
}

/// Convert civil date to days since Unix epoch (Howard Hinnant algorithm).
fn days_from_civil(year: i32, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year } as i64;
    let m = if month <= 2 {
        month as i64 + 9
    } else {
        month as i64 - 3
    };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let doy = (153 * m as u64 + 2) / 5 + day as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no candles found")]
    Empty,
}
