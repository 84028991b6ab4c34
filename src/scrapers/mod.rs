//! Source-specific scrapers and API clients.
//!
//! Each module owns everything coupled to one remote source: its URLs,
//! its extraction schema (selectors/patterns as data), and the mapping
//! from raw markup or payloads to this crate's record types.
//!
//! # Sources
//!
//! | Source | Module | Method | Feeds |
//! |--------|--------|--------|-------|
//! | mk.co.kr infostock | [`infostock`] | paginated HTML listing + bulletin pages | `stock_history` (`issue`) |
//! | FnGuide report summary | [`fnguide`] | per-day HTML endpoint | `stock_history` (`report`) |
//! | KOSCOM check-calendar | [`koscom`] | monthly JSON POST | `stock_calendar` |
//! | KRX data API | [`krx`] | per-date JSON datasets | published JSON/logo artifacts |
//!
//! # Common patterns
//!
//! - All network traffic goes through [`crate::fetch::Client`] (bounded
//!   timeout, retry with backoff).
//! - Parsing is synchronous and takes the already-fetched body, so every
//!   extractor is unit-testable against stub fixtures.
//! - Failed extraction of a required field drops the record with a log
//!   line; there are no silent empty-string fallbacks.

pub mod fnguide;
pub mod infostock;
pub mod koscom;
pub mod krx;
