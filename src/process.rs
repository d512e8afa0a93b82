use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{
    fs::File,
    io::AsyncWriteExt,
    sync::{Mutex, Semaphore},
    task::JoinSet,
};

use crate::filter::{attribute_partitions, SearchFilter, ALTERNATE_SORT_ORDERS};
use crate::request::{walk_partition, PartitionWalk};
use crate::{
    info_time, Result, DEFAULT_ENVELOPE_KEY, PROVIDER_NODE_TAG, SATURATION_THRESHOLD,
    WORKER_POOL_SIZE,
};

/// Caller-supplied inputs for crawling one pay range.
#[derive(Debug, Clone)]
pub struct RangeCrawl {
    /// GraphQL endpoint the walks POST against.
    pub endpoint: String,
    /// The pay range and fixed query fields: no partition attributes,
    /// primary sort order.
    pub base: SearchFilter,
    /// Attribute tags the range is partitioned across. Every subset
    /// becomes one query, so 2^N of them: keep this to a dozen tags or so.
    pub attribute_universe: Vec<String>,
    /// Hit total the search reports for this range. Dispatch stops early
    /// once the merged set reaches it.
    pub expected_hits: usize,
    /// Directory the result file lands in; created on demand.
    pub out_dir: PathBuf,
}

/// Outcome summary for one crawled range.
#[derive(Debug)]
pub struct RangeReport {
    pub unique_ids: usize,
    pub expected_hits: usize,
    pub output_path: PathBuf,
}

/// Everything the workers share: the merged id set and the envelope key
/// the first successful page revealed. One lock owns both, and merges and
/// early-exit checks each take it exactly once.
#[derive(Debug, Default)]
struct CrawlState {
    ids: HashSet<String>,
    envelope_key: Option<String>,
}

impl CrawlState {
    /// Folds one partition's walk into the aggregate. Ids union in; the
    /// first observed envelope key sticks.
    fn merge(&mut self, walk: PartitionWalk) {
        if self.envelope_key.is_none() {
            self.envelope_key = walk.envelope_key;
        }
        self.ids.extend(walk.ids);
    }
}

/// Crawls one pay range to best-effort exhaustion.
///
/// Every attribute partition fans out over a fixed pool of
/// [`WORKER_POOL_SIZE`] workers. A partition whose primary walk comes back
/// saturated is rerun under the three alternate sort orders before its ids
/// merge in. Once the merged set reaches `expected_hits`, no further
/// partitions launch, but partitions already in flight run to completion
/// and still merge; there is no cancellation.
///
/// Nothing a single partition does can fail the range: walks are
/// fail-open and the closing count comparison is advisory. Errors out of
/// here are the runtime's (task join) or the file system's.
pub async fn process_range(client: &Client, crawl: &RangeCrawl) -> Result<RangeReport> {
    let start_time = Local::now();
    let partitions = attribute_partitions(&crawl.attribute_universe);
    info_time!(
        "Range {}-{}: crawling {} partitions, expecting ~{} hits",
        crawl.base.min_rate,
        crawl.base.max_rate,
        partitions.len(),
        crawl.expected_hits
    );

    let state = Arc::new(Mutex::new(CrawlState::default()));
    let pool = Arc::new(Semaphore::new(WORKER_POOL_SIZE));
    let mut workers = JoinSet::new();

    for attributes in partitions {
        // Enough ids already? Skip launching the rest. In-flight
        // partitions finish and merge regardless.
        {
            let state = state.lock().await;
            if state.ids.len() >= crawl.expected_hits {
                info_time!(
                    "Range {}-{}: {} ids >= expected {}, skipping remaining partitions",
                    crawl.base.min_rate,
                    crawl.base.max_rate,
                    state.ids.len(),
                    crawl.expected_hits
                );
                break;
            }
        }

        let permit = Arc::clone(&pool).acquire_owned().await?;
        let filter = crawl.base.with_attributes(attributes);
        let client = client.clone();
        let endpoint = crawl.endpoint.clone();
        let state = Arc::clone(&state);

        workers.spawn(async move {
            let _permit = permit;
            let mut walk = walk_partition(&client, &endpoint, &filter).await;
            if walk.ids.len() > SATURATION_THRESHOLD {
                info_time!(
                    "Partition {:?} saturated at {} ids, rerunning under alternate sort orders",
                    filter.attributes,
                    walk.ids.len()
                );
                for sort_order in ALTERNATE_SORT_ORDERS {
                    let resorted = filter.with_sort(sort_order);
                    walk.absorb(walk_partition(&client, &endpoint, &resorted).await);
                }
            }
            state.lock().await.merge(walk);
        });
    }

    while let Some(worker) = workers.join_next().await {
        worker?;
    }

    let state = state.lock().await;
    info_time!(
        start_time,
        "Range {}-{}: DONE, {} unique ids, expected {}",
        crawl.base.min_rate,
        crawl.base.max_rate,
        state.ids.len(),
        crawl.expected_hits
    );
    let output_path = write_range_results(&state, crawl).await?;

    Ok(RangeReport {
        unique_ids: state.ids.len(),
        expected_hits: crawl.expected_hits,
        output_path,
    })
}

/// Writes the merged set as one synthetic response page:
/// `data.<key>.searchProvidersConnection.edges`, with the unique and
/// expected counts alongside the connection. The file is keyed by the
/// range bounds and replaced wholesale on every run.
async fn write_range_results(state: &CrawlState, crawl: &RangeCrawl) -> Result<PathBuf> {
    let envelope_key = match &state.envelope_key {
        Some(key) => key.clone(),
        None => {
            info_time!("No envelope key observed this run, defaulting to {DEFAULT_ENVELOPE_KEY}");
            DEFAULT_ENVELOPE_KEY.to_string()
        }
    };

    // Set iteration order is randomized; sort so identical crawls write
    // identical files.
    let mut ids: Vec<&String> = state.ids.iter().collect();
    ids.sort();
    let edges: Vec<Value> = ids
        .into_iter()
        .map(|id| json!({"node": {"__typename": PROVIDER_NODE_TAG, "member": {"id": id}}}))
        .collect();

    let document = json!({
        "data": {
            envelope_key: {
                "searchProvidersConnection": {"edges": edges},
                "aggregatedUniqueCount": state.ids.len(),
                "RangeTotalHits": crawl.expected_hits,
            },
        },
    });

    tokio::fs::create_dir_all(&crawl.out_dir).await?;
    let path = crawl.out_dir.join(format!(
        "providers_{}_{}.json",
        crawl.base.min_rate, crawl.base.max_rate
    ));
    let mut file = File::create(&path).await?;
    file.write_all(&serde_json::to_vec_pretty(&document)?).await?;
    // Writes queue on a background blocking task and dropping the handle
    // does not wait for them; flush so the path is readable on return.
    file.flush().await?;
    Ok(path)
}
