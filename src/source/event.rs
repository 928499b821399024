use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A single log event as deposited in the ingestion directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub service: String,
    /// Unix seconds.
    pub timestamp: f64,
    pub message: String,
}

impl Event {
    pub fn new(service: impl Into<String>, timestamp: f64, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            timestamp,
            message: message.into(),
        }
    }
}

/// Top-level shapes accepted in an event file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventFile {
    Many(Vec<Event>),
    One(Event),
}

impl From<EventFile> for Vec<Event> {
    fn from(file: EventFile) -> Self {
        match file {
            EventFile::Many(events) => events,
            EventFile::One(event) => vec![event],
        }
    }
}

/// All events parsed from one source file, delivered as a unit.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: Uuid,
    pub source: PathBuf,
    pub events: Vec<Event>,
}

impl Batch {
    pub fn new(source: impl Into<PathBuf>, events: Vec<Event>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            events,
        }
    }

    /// Parse the full contents of a file.
    ///
    /// Accepts either a single event object or an array of event objects.
    /// Anything else, including an event missing a field, is rejected as a whole.
    pub fn parse(source: &Path, contents: &[u8]) -> Result<Self, LoadError> {
        let file: EventFile =
            serde_json::from_slice(contents).map_err(|source_err| LoadError::Parse {
                path: source.to_path_buf(),
                source: source_err,
            })?;

        Ok(Self::new(source, file.into()))
    }

    /// Read and parse a file from disk
    pub async fn load(path: &Path) -> Result<Self, LoadError> {
        let contents = tokio::fs::read(path).await.map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(path, &contents)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Largest timestamp in the batch
    pub fn newest(&self) -> Option<f64> {
        self.events.iter().map(|e| e.timestamp).reduce(f64::max)
    }

    /// Smallest timestamp in the batch
    pub fn oldest(&self) -> Option<f64> {
        self.events.iter().map(|e| e.timestamp).reduce(f64::min)
    }
}
