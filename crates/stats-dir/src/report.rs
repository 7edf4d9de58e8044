use std::borrow::Cow;
use std::io::{self, Write};

use jobstats::{ComparisonRow, IncrementalityRow, PairedIncrementalityRow, TraceEvent};

/// A row of a tab-separated report
pub trait TsvRow {
    /// Column names, in output order
    const HEADER: &'static [&'static str];

    /// Field values, in the same order as [`TsvRow::HEADER`]
    fn fields(&self) -> Vec<String>;
}

impl TsvRow for IncrementalityRow {
    const HEADER: &'static [&'static str] = &["incrementality", "name"];

    fn fields(&self) -> Vec<String> {
        vec![self.incrementality_pct.to_string(), self.name.clone()]
    }
}

impl TsvRow for PairedIncrementalityRow {
    const HEADER: &'static [&'static str] = &[
        "old_pct",
        "old_skip",
        "new_pct",
        "new_skip",
        "delta_pct",
        "delta_skip",
        "name",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.old_pct.to_string(),
            self.old_skip.to_string(),
            self.new_pct.to_string(),
            self.new_skip.to_string(),
            self.delta_pct.to_string(),
            self.delta_skip.to_string(),
            self.name.clone(),
        ]
    }
}

impl TsvRow for ComparisonRow {
    const HEADER: &'static [&'static str] = &["old", "new", "delta_pct", "name"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.old.to_string(),
            self.new.to_string(),
            self.delta_pct.to_string(),
            self.name.clone(),
        ]
    }
}

/// Writes rows of one type as a tab-separated table with a header line
pub struct TsvWriter<W: Write, R: TsvRow> {
    writer: W,
    _row: std::marker::PhantomData<R>,
}

impl<W: Write, R: TsvRow> TsvWriter<W, R> {
    /// Creates the writer and emits the header line
    pub fn new(mut writer: W) -> io::Result<Self> {
        writeln!(writer, "{}", R::HEADER.join("\t"))?;
        Ok(Self {
            writer,
            _row: std::marker::PhantomData,
        })
    }

    pub fn write(&mut self, row: &R) -> io::Result<()> {
        let fields = row.fields();
        let quoted: Vec<_> = fields.iter().map(|f| quote_field(f)).collect();
        writeln!(self.writer, "{}", quoted.join("\t"))
    }

    pub fn write_rows<'a, I>(&mut self, rows: I) -> io::Result<()>
    where
        I: IntoIterator<Item = &'a R>,
        R: 'a,
    {
        for row in rows {
            self.write(row)?;
        }
        Ok(())
    }

    /// Flushes and returns the underlying writer
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Quotes a field holding a separator, line break or quote, doubling inner quotes
fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains(['\t', '\n', '\r', '"']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Writes trace events as a single JSON array
pub fn write_trace<W: Write>(writer: W, events: &[TraceEvent]) -> serde_json::Result<()> {
    serde_json::to_writer(writer, events)
}
