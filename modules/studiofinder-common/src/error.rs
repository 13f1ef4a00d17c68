use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudioFinderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Local file error ({path}): {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error ({path}): {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl StudioFinderError {
    pub fn config(msg: impl Into<String>) -> Self {
        StudioFinderError::Config(msg.into())
    }
}
