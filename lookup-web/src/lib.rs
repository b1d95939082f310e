//! Page-text extraction engine.
//!
//! Given a URL, renders the page in a headless browser, waits out common
//! "checking your browser" interstitials, strips boilerplate, picks the main
//! content block and returns a cleaned text blob.
//!
//! - [`extractor::WebPageTextExtractor`]: `initialize` / `extract` / `dispose` facade
//! - [`fetch::FetchOrchestrator`]: per-request state machine and retry loop
//! - [`challenge`]: anti-bot interstitial detection
//! - [`prune`]: boilerplate removal
//! - [`candidates`]: main-content selection
//! - [`quality`]: last-line check against placeholder pages
//! - [`normalize`]: whitespace and fragment cleanup

pub mod candidates;
pub mod challenge;
pub mod extractor;
pub mod fetch;
pub mod normalize;
pub mod prune;
pub mod quality;

pub use extractor::{TextExtractor, WebPageTextExtractor};
pub use fetch::{ExtractedPage, FetchRequest};
