//! Line oriented trace reader.

use std::io::{BufRead, Read};

use crate::{LINE_SIZE, MAX_UNITS, TraceError, TraceResult};

/// Reads the names line and then one line of values per call. Blank lines
/// and `#` comments are skipped.
pub struct TraceReader<R> {
    inner: R,
    line_no: usize,
    n_units: Option<usize>,
    buf: Vec<u8>,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            n_units: None,
            buf: Vec::with_capacity(1024),
        }
    }

    /// Lines consumed so far, skipped ones included.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    fn next_line(&mut self) -> TraceResult<Option<String>> {
        loop {
            self.buf.clear();
            let n = (&mut self.inner)
                .take(LINE_SIZE as u64)
                .read_until(b'\n', &mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if n == LINE_SIZE && self.buf.last() != Some(&b'\n') {
                return Err(TraceError::LineTooLong {
                    line: self.line_no,
                    limit: LINE_SIZE,
                });
            }
            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }

    /// Read the header line of block names.
    pub fn read_names(&mut self) -> TraceResult<Vec<String>> {
        let line = self.next_line()?.ok_or(TraceError::NotEnoughNames)?;
        let names: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if names.len() > MAX_UNITS {
            return Err(TraceError::TooManyUnits { max: MAX_UNITS });
        }
        self.n_units = Some(names.len());
        Ok(names)
    }

    /// Read one timestep. `None` at end of stream.
    pub fn read_vals(&mut self) -> TraceResult<Option<Vec<f64>>> {
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };
        let vals = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| TraceError::InvalidValue {
                        line: self.line_no,
                        token: token.to_string(),
                    })
            })
            .collect::<TraceResult<Vec<f64>>>()?;
        if vals.len() > MAX_UNITS {
            return Err(TraceError::TooManyUnits { max: MAX_UNITS });
        }
        if let Some(expected) = self.n_units
            && vals.len() != expected
        {
            return Err(TraceError::ColumnCount {
                line: self.line_no,
                expected,
                got: vals.len(),
            });
        }
        Ok(Some(vals))
    }
}
