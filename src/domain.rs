use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use clap::Parser;
use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::storage::StoreError;

pub const HELP_TEXT: &str = "\
Table
  ↑ ↓ ← →, PgUp/PgDn   move
  g / G                first / last row
  space                mark row for label printing
  /                    filter rows
  c                    choose columns
  p                    print labels of marked (or all filtered) rows
  esc                  clear filter / close
  q                    quit

Column picker
  ↑ ↓                  move
  space                toggle column / collapse group
  a / n                select all / deselect all
  1..9                 apply preset
  /                    search columns
  esc                  back to table
";

#[derive(Debug)]
pub enum AVError {
    IoError(Error),
    PolarsError(PolarsError),
    StoreError(StoreError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl fmt::Display for AVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AVError::IoError(e) => write!(f, "I/O error: {e}"),
            AVError::PolarsError(e) => write!(f, "could not read register: {e}"),
            AVError::StoreError(e) => write!(f, "state storage: {e}"),
            AVError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            AVError::FileNotFound => write!(f, "file not found"),
            AVError::PermissionDenied => write!(f, "permission denied"),
            AVError::UnknownFileType => write!(f, "unknown file type (expected csv, parquet or arrow)"),
        }
    }
}

impl std::error::Error for AVError {}

impl From<Error> for AVError {
    fn from(err: Error) -> Self {
        AVError::IoError(err)
    }
}

impl From<PolarsError> for AVError {
    fn from(err: PolarsError) -> Self {
        AVError::PolarsError(err)
    }
}

impl From<StoreError> for AVError {
    fn from(err: StoreError) -> Self {
        AVError::StoreError(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    FilterRows,
    SearchColumns,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Exit,
    Help,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Resize(usize, usize),
    ToggleMark,
    Filter,
    ColumnPicker,
    SearchColumns,
    SelectAll,
    DeselectAll,
    Preset(usize),
    PrintLabels,
    RawKey(KeyEvent),
}

#[derive(Parser, Debug)]
#[command(version, about = "Browse an asset register, pick columns and print asset labels")]
pub struct Args {
    /// Asset register export (csv, parquet or arrow)
    pub file: PathBuf,

    /// Directory holding persisted viewer state
    #[arg(long)]
    pub state_dir: Option<String>,

    /// Keep column choices in memory only
    #[arg(long)]
    pub no_persist: bool,

    /// Forget the saved column choices before starting
    #[arg(long)]
    pub reset_columns: bool,

    #[arg(long, default_value = "assetview.log")]
    pub log_file: PathBuf,

    /// Where printed label sheets are written
    #[arg(long, default_value = "asset-labels.html")]
    pub label_output: PathBuf,

    /// Company name printed on every label
    #[arg(long, default_value = "COMPANY")]
    pub company: String,

    /// Base url of the asset pages, labels get a QR code to `<url>/assets/<id>`
    #[arg(long)]
    pub qr_base_url: Option<String>,

    /// Print labels for every row and exit without starting the viewer
    #[arg(long)]
    pub print_labels: bool,

    /// With --print-labels, write a text preview to stdout instead of html
    #[arg(long, requires = "print_labels")]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct AVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub label_output: PathBuf,
    pub company: String,
    pub qr_base_url: Option<String>,
}

impl Default for AVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            label_output: PathBuf::from("asset-labels.html"),
            company: "COMPANY".to_string(),
            qr_base_url: None,
        }
    }
}

impl From<&Args> for AVConfig {
    fn from(args: &Args) -> Self {
        AVConfig::default()
            .label_output(args.label_output.clone())
            .company(args.company.clone())
            .qr_base_url(args.qr_base_url.clone())
    }
}
