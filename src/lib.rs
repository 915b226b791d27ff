//! mangadl - MangaDex chapter downloader.
//!
//! This library provides functionality for:
//! - Listing the chapters and volumes of a manga from the MangaDex API
//! - Parsing chapter and volume selections
//! - Choosing between several releases of the same chapter
//! - Downloading pages and packing them into `.cbz` archives

pub mod archive;
pub mod catalog;
pub mod config;
pub mod console;
pub mod disambiguation;
pub mod driver;
pub mod error;
pub mod listing;
pub mod progress;
pub mod selection;
pub mod utils;

// Re-export commonly used types
pub use catalog::{Catalog, ChapterRecord, MangaDexClient, MangaId, NameLookup};
pub use config::Config;
pub use console::Console;
pub use disambiguation::{Disambiguator, PreferenceSet, Release, SameChapterPolicy};
pub use driver::{DownloadUnit, Driver, DriverOptions};
pub use error::{CatalogError, ConfigError, DownloadError};
pub use listing::{Listing, Mode};
pub use selection::{Selection, select};
