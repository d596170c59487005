//! Terminal output: ASCII tables, streamed CSV, and page progress.

use std::io::Write;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use little_owl::{OwlError, QuerySummary, Result, Row, RowSink};

/// Braille spinner frames; the last one marks a finished run.
const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"];

/// Renders rows as a bordered table. The first row is the header.
///
/// Column widths count `char`s, not terminal cells: accented text lines up,
/// but double-width glyphs (CJK, most emoji) push their row out of line.
pub fn render_table(rows: &[Row]) -> String {
    let Some((header, body)) = rows.split_first() else {
        return String::new();
    };

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let border = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };

    let format_row = |row: &Row| {
        let mut line = String::from("|");
        for (i, width) in widths.iter().enumerate() {
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            let pad = width - cell.chars().count();
            line.push(' ');
            line.push_str(cell);
            line.push_str(&" ".repeat(pad + 1));
            line.push('|');
        }
        line
    };

    let mut out = Vec::with_capacity(body.len() + 4);
    out.push(border.clone());
    out.push(format_row(header));
    out.push(border.clone());
    out.extend(body.iter().map(format_row));
    if !body.is_empty() {
        out.push(border);
    }
    out.join("\n")
}

/// Spinner on stderr, advanced once per fetched page.
pub struct Progress {
    bar: ProgressBar,
    rows: u64,
}

impl Progress {
    /// Draws to stderr; indicatif skips drawing when stderr is not a terminal.
    pub fn stderr() -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        bar.set_style(spinner_style());
        Self { bar, rows: 0 }
    }

    pub fn disabled() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            rows: 0,
        }
    }

    fn add_row(&mut self) {
        self.rows += 1;
    }

    fn page(&self, number: u32, has_more: bool) {
        let tail = if has_more { "..." } else { "" };
        self.bar
            .set_message(format!("page {number}, {} rows{tail}", self.rows));
        self.bar.tick();
    }

    fn finish(&self, summary: &QuerySummary) {
        self.bar.finish_with_message(format!(
            "{} rows in {} pages ({})",
            summary.rows, summary.pages, summary.handle
        ));
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        // Keep the last status line when the run stopped early.
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

fn spinner_style() -> ProgressStyle {
    let style = ProgressStyle::default_spinner().tick_strings(TICKS);
    style
        .clone()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or(style)
}

/// Streams rows as CSV, flushing after every page.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    progress: Progress,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W, progress: Progress) -> Self {
        Self {
            writer: csv::WriterBuilder::new().flexible(true).from_writer(out),
            progress,
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|err| sink_error(err.error()))
    }
}

fn sink_error(err: impl std::fmt::Display) -> OwlError {
    OwlError::Sink(err.to_string())
}

impl<W: Write> RowSink for CsvSink<W> {
    fn on_header(&mut self, header: &[String]) -> Result<()> {
        self.writer.write_record(header).map_err(sink_error)
    }

    fn on_row(&mut self, row: Row) -> Result<()> {
        self.writer.write_record(&row).map_err(sink_error)?;
        self.progress.add_row();
        Ok(())
    }

    fn on_page(&mut self, number: u32, has_more: bool) -> Result<()> {
        self.writer.flush().map_err(sink_error)?;
        self.progress.page(number, has_more);
        Ok(())
    }

    fn on_complete(&mut self, summary: &QuerySummary) -> Result<()> {
        self.writer.flush().map_err(sink_error)?;
        self.progress.finish(summary);
        Ok(())
    }
}
