pub mod config;
pub mod error;
pub mod types;

pub use config::{
    split_keywords, Credentials, EmailCrawlConfig, KeywordStrategy, SheetsAuth, SweepConfig, WriteConfig,
};
pub use error::StudioFinderError;
pub use types::*;
