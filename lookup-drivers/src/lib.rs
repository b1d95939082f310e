//! Driver layer for browser automation.
//!
//! This crate owns everything that talks to a real browser:
//!
//! - [`lookup_browser::context`]: the engine/handle/context traits the extraction core
//!   is written against
//! - [`lookup_browser::session::SessionManager`]: lazily launched shared engine plus
//!   one isolated context per attempt
//! - [`lookup_browser::driver::ChromeDriverEngine`]: chromedriver-backed engine
//! - [`lookup_browser::page::LookupPage`]: fantoccini client wrapped as a context
//! - [`lookup_browser::stealth`]: launch arguments and JS evasions
//! - [`lookup_browser::fingerprint`]: user-agent and header profiles
//! - [`lookup_browser::behavioral::BehavioralEngine`]: human-like delays and retry jitter
pub mod lookup_browser;
