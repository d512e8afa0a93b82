//! PROVIDER SEARCH TRAWLER
//!
//! The search backend caps any one query at roughly [`RESULT_CAP`]
//! reachable hits, so a single pay range is crawled as every subset of a
//! small attribute list (2^N partitioned queries), partitions that still
//! brush the cap are re-walked under alternate sort orders, and every
//! walk's ids merge into one deduplicated set that gets written back out
//! in the API's own response shape.

mod macros;

mod error;
pub mod filter;
mod parse;
pub mod process;
mod request;

pub use error::{Error, Result};

use std::ops::RangeInclusive;

/// How many partitions walk concurrently.
pub const WORKER_POOL_SIZE: usize = 16;
/// Most hits the backend will surface for any single query, give or take.
pub const RESULT_CAP: usize = 500;
/// A walk collecting more ids than this sits close enough to [`RESULT_CAP`]
/// that pagination alone probably missed some; triggers the sort-order
/// reruns.
pub const SATURATION_THRESHOLD: usize = 498;
/// Pause between page fetches in milliseconds, jittered uniformly.
pub const PAGE_DELAY_MS: RangeInclusive<u64> = 350..=550;
pub const SEARCH_PAGE_SIZE: u32 = 20;
/// `__typename` of connection edges that carry a real provider record.
pub const PROVIDER_NODE_TAG: &str = "SearchProvidersSuccess";
/// Envelope label used for output when no response ever revealed one.
pub const DEFAULT_ENVELOPE_KEY: &str = "searchProvidersChildCare";
/// Envelope labels per care vertical, tried before structurally probing
/// unknown keys.
pub const KNOWN_ENVELOPE_KEYS: [&str; 5] = [
    "searchProvidersChildCare",
    "searchProvidersSeniorCare",
    "searchProvidersHousekeeping",
    "searchProvidersPetCare",
    "searchProvidersTutoring",
];
