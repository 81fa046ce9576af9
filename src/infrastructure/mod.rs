pub(crate) mod browser;
pub(crate) mod export;

pub use browser::{BrowserSession, BrowserSettings, ChromePage};
pub use export::{export_bytes, export_filename, export_to_dir, ExportFormat, HeaderSet};
