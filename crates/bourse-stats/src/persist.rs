//! Aggregate view persistence.
//!
//! Views are written with overwrite semantics and a header row, in either a
//! columnar (Parquet) or delimited-text (CSV) format chosen by the caller.
//! There is no append or merge mode.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use bourse_traits::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// On-disk format for an aggregate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewFormat {
    /// Columnar Parquet file.
    Parquet,
    /// Comma-delimited text with a header row.
    Csv,
}

impl ViewFormat {
    /// File extension, which is also the name of the per-format directory.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
        }
    }
}

/// `root/<format>/<name>.<format>`, e.g. `root/parquet/averages.parquet`.
pub fn view_path(root: &Path, name: &str, format: ViewFormat) -> PathBuf {
    root.join(format.extension())
        .join(format!("{}.{}", name, format.extension()))
}

/// Writes `df` to `path`, replacing whatever was there.
pub fn write_view(df: &DataFrame, path: &Path, format: ViewFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = df.clone();
    let mut file = File::create(path)?;
    match format {
        ViewFormat::Parquet => {
            ParquetWriter::new(&mut file).finish(&mut out)?;
        }
        ViewFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut out)?;
        }
    }
    Ok(())
}

/// Reads a view previously written with [`write_view`].
///
/// CSV files come back with inferred types, so dates are read as strings.
pub fn read_view(path: &Path, format: ViewFormat) -> Result<DataFrame> {
    let df = match format {
        ViewFormat::Parquet => ParquetReader::new(File::open(path)?).finish()?,
        ViewFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
    };
    Ok(df)
}

/// Writes named views under a root directory in every enabled format.
#[derive(Debug, Clone)]
pub struct ViewWriter {
    root: PathBuf,
    formats: Vec<ViewFormat>,
}

impl ViewWriter {
    /// Create a writer rooted at `root` that writes each view in `formats`.
    pub fn new(root: impl Into<PathBuf>, formats: Vec<ViewFormat>) -> Self {
        Self {
            root: root.into(),
            formats,
        }
    }

    /// Builds the format list from the two caller flags.
    pub fn from_flags(root: impl Into<PathBuf>, parquet: bool, csv: bool) -> Self {
        let mut formats = Vec::new();
        if parquet {
            formats.push(ViewFormat::Parquet);
        }
        if csv {
            formats.push(ViewFormat::Csv);
        }
        Self::new(root, formats)
    }

    /// The enabled formats.
    pub fn formats(&self) -> &[ViewFormat] {
        &self.formats
    }

    /// Writes `df` as `name` in each enabled format and returns the paths.
    pub fn persist(&self, name: &str, df: &DataFrame) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.formats.len());
        for &format in &self.formats {
            let path = view_path(&self.root, name, format);
            write_view(df, &path, format)?;
            info!("Wrote {} rows to {}", df.height(), path.display());
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AVG_RETURN, date_average_returns};
    use crate::{Loader, derive_returns};
    use bourse_traits::types::{DATE, float_values, string_values};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bourse_persist_{name}"));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn averages() -> DataFrame {
        let raw = df! {
            "date" => &["2024-01-03", "2024-01-02", "2024-01-02"],
            "ticker" => &["AAPL", "AAPL", "MSFT"],
            "open" => &[100.0, 100.0, 50.0],
            "high" => &[111.0, 111.0, 51.0],
            "low" => &[99.0, 99.0, 49.0],
            "close" => &[110.0, 95.0, 51.0],
            "volume" => &[1.0, 2.0, 3.0],
        }
        .unwrap();
        let table = derive_returns(&Loader::default().clean(raw).unwrap()).unwrap();
        date_average_returns(&table).unwrap()
    }

    #[test]
    fn test_view_path() {
        let path = view_path(Path::new("out"), "averages", ViewFormat::Parquet);
        assert_eq!(path, PathBuf::from("out/parquet/averages.parquet"));
        let path = view_path(Path::new("out"), "volatility", ViewFormat::Csv);
        assert_eq!(path, PathBuf::from("out/csv/volatility.csv"));
    }

    #[test]
    fn test_parquet_round_trip() {
        let dir = scratch("parquet_round_trip");
        let df = averages();
        let path = view_path(&dir, "averages", ViewFormat::Parquet);

        write_view(&df, &path, ViewFormat::Parquet).unwrap();
        let back = read_view(&path, ViewFormat::Parquet).unwrap();

        assert!(back.equals_missing(&df));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_csv_round_trip_keeps_rows_and_column_order() {
        let dir = scratch("csv_round_trip");
        let df = averages();
        let path = view_path(&dir, "averages", ViewFormat::Csv);

        write_view(&df, &path, ViewFormat::Csv).unwrap();
        let back = read_view(&path, ViewFormat::Csv).unwrap();

        assert_eq!(back.get_column_names(), df.get_column_names());
        assert_eq!(
            string_values(&back, DATE).unwrap(),
            vec![Some("2024-01-02".to_string()), Some("2024-01-03".to_string())]
        );
        assert_eq!(
            float_values(&back, AVG_RETURN).unwrap(),
            float_values(&df, AVG_RETURN).unwrap()
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_overwrites() {
        let dir = scratch("overwrite");
        let df = averages();
        let path = view_path(&dir, "averages", ViewFormat::Csv);

        write_view(&df, &path, ViewFormat::Csv).unwrap();
        write_view(&df.head(Some(1)), &path, ViewFormat::Csv).unwrap();

        let back = read_view(&path, ViewFormat::Csv).unwrap();
        assert_eq!(back.height(), 1);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_view_writer_flags() {
        let dir = scratch("writer_flags");
        let writer = ViewWriter::from_flags(&dir, false, true);
        assert_eq!(writer.formats(), &[ViewFormat::Csv]);

        let written = writer.persist("volatility", &averages()).unwrap();
        assert_eq!(written, vec![dir.join("csv").join("volatility.csv")]);
        assert!(!dir.join("parquet").exists());
        fs::remove_dir_all(&dir).ok();
    }
}
