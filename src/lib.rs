//! Extraction of dynamically generated answer panels from search results.
//!
//! The pipeline opens a results page in a real browser, waits for the
//! streamed answer to stop changing, locates the answer container (platform
//! selectors first, content scoring as fallback), strips UI boilerplate and
//! returns the cleaned text. Browser access goes through the
//! [`browser::BrowserRuntime`] seam so the whole pipeline is testable
//! without a browser process.

pub mod browser;
pub mod config;
pub mod dom_scripts;
pub mod extractor;
pub mod logging;
pub mod page;
pub mod runtime;
pub mod sanitize;
pub mod scorer;
pub mod selector;
pub mod stability;
pub mod types;

pub use browser::{BrowserHandle, BrowserRuntime};
pub use config::{SearchConfig, Verbosity};
pub use extractor::{extract_batch, extract_one, Extractor};
pub use types::{ExtractionResult, Source};
