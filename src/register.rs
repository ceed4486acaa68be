use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::catalog;
use crate::columns::ColumnDefinition;
use crate::domain::AVError;
use crate::labels::LabelAsset;

/// Cell text used for missing values.
pub const NULL_CELL: &str = "∅";

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// One register column, every value already rendered to text.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub max_width: usize,
    pub data: Vec<String>,
}

impl Column {
    pub fn new(name: &str, data: Vec<String>) -> Self {
        let max_width = data.iter().map(|s| s.chars().count()).max().unwrap_or(0);
        Self {
            name: name.to_string(),
            max_width,
            data,
        }
    }

    fn cell(&self, row: usize) -> Option<&str> {
        self.data
            .get(row)
            .map(String::as_str)
            .filter(|s| *s != NULL_CELL && !s.is_empty())
    }
}

/// The loaded asset register.
#[derive(Debug)]
pub struct Register {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Register {
    pub fn from_columns(name: &str, columns: Vec<Column>) -> Self {
        Self {
            name: name.to_string(),
            columns,
        }
    }

    pub fn load(path: PathBuf) -> Result<Self, AVError> {
        let file_info = Register::get_file_info(path)?;
        debug!("Loading {:?} ({} bytes)", file_info.file_type, file_info.file_size);
        let frame = match file_info.file_type {
            FileType::CSV => Register::load_csv(&file_info.path)?,
            FileType::PARQUET => Register::load_parquet(&file_info.path)?,
            FileType::ARROW => Register::load_arrow(&file_info.path)?,
        };

        // Every column is decoded to strings on its own rayon worker.
        let start_time = Instant::now();
        let df = frame.collect()?;
        let columns: Vec<Column> = df
            .get_column_names()
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect::<Result<_, PolarsError>>()?;

        if columns.is_empty() {
            return Err(AVError::LoadingFailed("register has no columns".into()));
        }
        info!(
            "Loaded {} columns x {} rows in {}ms",
            columns.len(),
            df.height(),
            start_time.elapsed().as_millis()
        );

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        Ok(Register { name, columns })
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == key)
    }

    /// Column definitions in file order, labelled from the asset catalog.
    pub fn definitions(&self) -> Vec<ColumnDefinition> {
        self.columns
            .iter()
            .map(|c| ColumnDefinition::new(&c.name, catalog::label_for(&c.name).unwrap_or(&c.name)))
            .collect()
    }

    /// Rows (out of `rows`) where any column contains `term`, case-insensitive.
    pub fn matching_rows(&self, term: &str, rows: &[usize]) -> Vec<usize> {
        let needle = term.to_lowercase();
        rows.iter()
            .copied()
            .filter(|&r| {
                self.columns
                    .iter()
                    .any(|c| c.data[r].to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Label data of the given rows. Without a quantity column every row
    /// counts as a single item.
    pub fn label_assets(&self, rows: &[usize]) -> Vec<LabelAsset> {
        let id = self.column(catalog::ID_KEY);
        let name = self.column(catalog::NAME_KEY);
        let department = self.column(catalog::DEPARTMENT_KEY);
        let quantity = self.column(catalog::QUANTITY_KEY);

        rows.iter()
            .map(|&r| LabelAsset {
                id: id
                    .and_then(|c| c.cell(r))
                    .map(str::to_string)
                    .unwrap_or_else(|| (r + 1).to_string()),
                name: name
                    .and_then(|c| c.cell(r))
                    .unwrap_or("-")
                    .to_string(),
                department: department.and_then(|c| c.cell(r)).map(str::to_string),
                quantity: match quantity {
                    Some(c) => c.cell(r).map(parse_quantity).unwrap_or(0),
                    None => 1,
                },
            })
            .collect()
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Column, PolarsError> {
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let series = col.str()?;
        let data = series
            .into_iter()
            .map(|value| match value {
                Some(s) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
                None => String::from(NULL_CELL),
            })
            .collect();
        Ok(Column::new(col_name, data))
    }

    fn detect_file_type(path: &Path) -> Result<FileType, AVError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(AVError::UnknownFileType),
        }
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, AVError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AVError::FileNotFound,
            ErrorKind::PermissionDenied => AVError::PermissionDenied,
            _ => AVError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(AVError::LoadingFailed("Not a file!".into()));
        }

        let file_type = Register::detect_file_type(&path)?;

        Ok(FileInfo {
            path,
            file_size: metadata.len(),
            file_type,
        })
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

// Registers store quantities as "3" or, after a float column round trip, "3.0".
fn parse_quantity(s: &str) -> i64 {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        .unwrap_or(0)
}
