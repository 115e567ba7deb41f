//! Trace writers: tab separated, two decimals.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::TraceResult;

pub struct TraceWriter<W: Write> {
    inner: W,
}

impl TraceWriter<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed.
    pub fn append(path: &Path) -> TraceResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_names<S: AsRef<str>>(&mut self, names: &[S]) -> TraceResult<()> {
        let line: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        writeln!(self.inner, "{}", line.join("\t"))?;
        Ok(())
    }

    pub fn write_vals(&mut self, vals: &[f64]) -> TraceResult<()> {
        let line: Vec<String> = vals.iter().map(|v| format!("{v:.2}")).collect();
        writeln!(self.inner, "{}", line.join("\t"))?;
        Ok(())
    }

    pub fn flush(&mut self) -> TraceResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_tab_separated_with_two_decimals() {
        let mut w = TraceWriter::new(Vec::new());
        w.write_names(&["a", "b", "c"]).unwrap();
        w.write_vals(&[1.0, 2.346, 333.333]).unwrap();
        let text = String::from_utf8(w.into_inner()).unwrap();
        assert_eq!(text, "a\tb\tc\n1.00\t2.35\t333.33\n");
    }

    #[test]
    fn append_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ttrace");
        for v in [1.0, 2.0] {
            let mut w = TraceWriter::append(&path).unwrap();
            w.write_vals(&[v]).unwrap();
            w.flush().unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1.00\n2.00\n");
    }
}
