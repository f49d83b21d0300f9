use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::data::RecordError;
use crate::histogram::HistogramError;
use crate::reader::ParseError;
use crate::writer::WriteError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Histogram(#[from] HistogramError),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("Failed to initialise event generator: {0}")]
    SimulatorInit(String),
    #[error("Cannot open input file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("Failed to write {}: {source}", path.display())]
    Persist { path: PathBuf, source: io::Error },
}
