use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use reqwest::Client;
use trawl::{
    filter::SearchFilter,
    info_time,
    process::{process_range, RangeCrawl},
    Result,
};

const SEARCH_ENDPOINT: &str = "https://www.care.com/api/graphql";
const POSTAL_CODE: &str = "10001";
const OUT_DIR: &str = "ranges";
/// The endpoint serves a browser app; plain library user agents get a
/// different (worse) treatment from the edge.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Hourly pay ranges to sweep, with the hit total the search UI reports
/// for each. The totals drive early exit, so refresh them when they
/// drift too far from what the site shows.
const RATE_RANGES: [(u32, u32, usize); 4] = [
    (10, 15, 2153),
    (15, 20, 3870),
    (20, 25, 1742),
    (25, 30, 604),
];

/// Provider attributes the crawl partitions each range across. 6 tags
/// make 64 partitions per range.
const ATTRIBUTE_UNIVERSE: [&str; 6] = [
    "NON_SMOKER",
    "CPR_TRAINED",
    "COMFORTABLE_WITH_PETS",
    "OWN_TRANSPORTATION",
    "FIRST_AID_TRAINED",
    "COLLEGE_EDUCATED",
];

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()?;

    for (min_rate, max_rate, expected_hits) in RATE_RANGES {
        let crawl = RangeCrawl {
            endpoint: SEARCH_ENDPOINT.to_string(),
            base: SearchFilter::new(min_rate, max_rate, POSTAL_CODE),
            attribute_universe: ATTRIBUTE_UNIVERSE.iter().map(|s| s.to_string()).collect(),
            expected_hits,
            out_dir: PathBuf::from(OUT_DIR),
        };
        let report = process_range(&client, &crawl).await?;
        info_time!(
            "Wrote {} ids for range {min_rate}-{max_rate} to {:?}",
            report.unique_ids,
            report.output_path
        );
    }

    info_time!(start_time, "Full program time:");

    Ok(())
}
