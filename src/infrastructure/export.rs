use crate::domain::Review;
use crate::error::Result;
use crate::utils::timestamped_filename;
use chrono::Local;
use clap::ValueEnum;
use rust_xlsxwriter::{Format, Workbook};
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const FILE_PREFIX: &str = "google_reviews";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

/// Column titles. The terminal exports use field names, the web ones titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSet {
    Plain,
    Titled,
}

impl HeaderSet {
    pub fn columns(self) -> [&'static str; 4] {
        match self {
            HeaderSet::Plain => ["name", "rating", "date", "text"],
            HeaderSet::Titled => ["Reviewer", "Rating", "Date", "Review"],
        }
    }
}

fn row(review: &Review) -> [&str; 4] {
    [
        review.name.as_str(),
        review.rating.as_str(),
        review.date.as_str(),
        review.text.as_str(),
    ]
}

pub fn write_csv<W: Write>(writer: W, reviews: &[Review], headers: HeaderSet) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(headers.columns())?;
    for review in reviews {
        wtr.write_record(row(review))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn csv_bytes(reviews: &[Review], headers: HeaderSet) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, reviews, headers)?;
    Ok(buffer)
}

fn workbook(reviews: &[Review], headers: HeaderSet) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Reviews")?;

    for (col, title) in headers.columns().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }
    for (i, review) in reviews.iter().enumerate() {
        let r = i as u32 + 1;
        for (col, value) in row(review).iter().enumerate() {
            sheet.write_string(r, col as u16, *value)?;
        }
    }

    sheet.set_column_width(0, 24)?;
    sheet.set_column_width(2, 16)?;
    sheet.set_column_width(3, 80)?;
    Ok(workbook)
}

pub fn xlsx_bytes(reviews: &[Review], headers: HeaderSet) -> Result<Vec<u8>> {
    Ok(workbook(reviews, headers)?.save_to_buffer()?)
}

pub fn export_bytes(reviews: &[Review], format: ExportFormat, headers: HeaderSet) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => csv_bytes(reviews, headers),
        ExportFormat::Xlsx => xlsx_bytes(reviews, headers),
    }
}

pub fn export_filename(format: ExportFormat) -> String {
    timestamped_filename(FILE_PREFIX, format.extension(), Local::now())
}

/// Creates `name` in `dir`, or `stem_1.ext`, `stem_2.ext`, ... when taken.
fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, File)> {
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    let mut suffix = 0;
    loop {
        let candidate = match suffix {
            0 => name.to_string(),
            n if ext.is_empty() => format!("{}_{}", stem, n),
            n => format!("{}_{}.{}", stem, n, ext),
        };
        let path = dir.join(candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Writes `reviews` to a new timestamped file in `dir` and returns its path.
/// Existing files are never overwritten.
pub fn export_to_dir(
    reviews: &[Review],
    format: ExportFormat,
    headers: HeaderSet,
    dir: &Path,
) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }

    let bytes = export_bytes(reviews, format, headers)?;
    let (path, mut file) = create_unique(dir, &export_filename(format))?;
    file.write_all(&bytes)?;

    info!("Exported {} reviews to {}", reviews.len(), path.display());
    Ok(path)
}
