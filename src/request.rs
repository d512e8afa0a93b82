use std::collections::HashSet;
use std::time::Duration;

use chrono::Local;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::filter::SearchFilter;
use crate::parse::parse_page;
use crate::{info_time, Result, PAGE_DELAY_MS};

/// Document sent with every search request. The response's top-level field
/// is named after the care vertical, which is why the decode side
/// discovers the envelope key instead of assuming one.
const SEARCH_QUERY: &str = r#"
query SearchProvidersByRange($input: SearchProvidersInput!) {
  searchProviders(input: $input) {
    searchProvidersConnection {
      pageInfo {
        hasNextPage
        endCursor
      }
      edges {
        node {
          __typename
          ... on SearchProvidersSuccess {
            member {
              id
            }
          }
        }
      }
    }
  }
}
"#;

/// Wire shape of one search request: `{"query": ..., "variables": {"input": ...}}`.
#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    query: &'static str,
    variables: Variables<'a>,
}

#[derive(Debug, Serialize)]
struct Variables<'a> {
    input: SearchInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchInput<'a> {
    care_type: &'a str,
    filters: Filters<'a>,
    /// Sent only for non-empty partitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<&'a [String]>,
    ages_served_in_months: &'a [u32],
    number_of_children: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Filters<'a> {
    pay_range: PayRange<'a>,
    postal_code: &'a str,
    search_page_size: u32,
    search_after: &'a str,
    languages_spoken: &'a [String],
    search_sort_order: &'static str,
}

#[derive(Debug, Serialize)]
struct PayRange<'a> {
    min: Money<'a>,
    max: Money<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Money<'a> {
    amount: u32,
    currency_code: &'a str,
}

fn request_body(filter: &SearchFilter) -> SearchBody<'_> {
    SearchBody {
        query: SEARCH_QUERY,
        variables: Variables {
            input: SearchInput {
                care_type: &filter.care_type,
                filters: Filters {
                    pay_range: PayRange {
                        min: Money {
                            amount: filter.min_rate,
                            currency_code: &filter.currency,
                        },
                        max: Money {
                            amount: filter.max_rate,
                            currency_code: &filter.currency,
                        },
                    },
                    postal_code: &filter.postal_code,
                    search_page_size: filter.page_size,
                    search_after: &filter.search_after,
                    languages_spoken: &filter.languages,
                    search_sort_order: filter.sort_order.as_wire(),
                },
                attributes: (!filter.attributes.is_empty()).then_some(filter.attributes.as_slice()),
                ages_served_in_months: &filter.ages_served_in_months,
                number_of_children: filter.number_of_children,
            },
        },
    }
}

/// Issues one search POST and returns the decoded JSON body.
/// Non-2xx statuses and transport failures surface as errors; the caller
/// decides what a failed page means for its walk.
async fn post_search(client: &Client, endpoint: &str, filter: &SearchFilter) -> Result<Value> {
    let resp = client
        .post(endpoint)
        .json(&request_body(filter))
        .send()
        .await?
        .error_for_status()?;
    Ok(resp.json().await?)
}

/// What one partition walk produced.
#[derive(Debug, Default)]
pub(crate) struct PartitionWalk {
    /// Ids collected across every page of the walk.
    pub ids: HashSet<String>,
    /// Envelope key observed on the walk's first parsed page.
    pub envelope_key: Option<String>,
}

impl PartitionWalk {
    /// Folds a rerun's output into this walk's.
    pub fn absorb(&mut self, other: PartitionWalk) {
        self.ids.extend(other.ids);
        if self.envelope_key.is_none() {
            self.envelope_key = other.envelope_key;
        }
    }
}

/// Walks one (filter, sort order) configuration to exhaustion, page by
/// page from the blank cursor.
///
/// Fail-open: a transport failure or malformed page ends the walk with
/// whatever ids earlier pages yielded, so an erroring partition
/// contributes less instead of poisoning the run. Every fetched page is
/// followed by a short jittered pause out of courtesy to the server.
pub(crate) async fn walk_partition(
    client: &Client,
    endpoint: &str,
    filter: &SearchFilter,
) -> PartitionWalk {
    let mut walk = PartitionWalk::default();
    let mut cursor = String::new();

    loop {
        let page_filter = filter.with_cursor(&cursor);
        let body = match post_search(client, endpoint, &page_filter).await {
            Ok(body) => body,
            Err(e) => {
                info_time!(
                    "Page fetch failed [{:?} / {}]: {e}",
                    page_filter.attributes,
                    page_filter.sort_order.as_wire()
                );
                break;
            }
        };
        let page = match parse_page(&body) {
            Ok(page) => page,
            Err(e) => {
                info_time!(
                    "Unusable page [{:?} / {}]: {e}",
                    page_filter.attributes,
                    page_filter.sort_order.as_wire()
                );
                break;
            }
        };

        if walk.envelope_key.is_none() {
            walk.envelope_key = Some(page.envelope_key);
        }
        walk.ids
            .extend(page.connection.provider_ids().map(str::to_owned));

        page_delay().await;

        match page.connection.page_info.next_cursor() {
            Some(next) => cursor = next.to_string(),
            None => break,
        }
    }

    walk
}

/// Jittered pause between page fetches. Courtesy pacing, not retry backoff.
async fn page_delay() {
    let ms = rand::rng().random_range(PAGE_DELAY_MS);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PROVIDER_NODE_TAG;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture_page(ids: &[&str], next_cursor: Option<&str>) -> Value {
        let edges: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({"node": {"__typename": PROVIDER_NODE_TAG, "member": {"id": id}}})
            })
            .collect();
        json!({
            "data": {
                "searchProvidersChildCare": {
                    "searchProvidersConnection": {
                        "edges": edges,
                        "pageInfo": {
                            "hasNextPage": next_cursor.is_some(),
                            "endCursor": next_cursor,
                        },
                    },
                },
            },
        })
    }

    async fn mount_page(server: &MockServer, cursor: &str, page: Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "variables": {"input": {"filters": {"searchAfter": cursor}}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page))
            .mount(server)
            .await;
    }

    fn request_cursors(requests: &[wiremock::Request]) -> Vec<String> {
        requests
            .iter()
            .map(|r| {
                let body: Value = serde_json::from_slice(&r.body).unwrap();
                body["variables"]["input"]["filters"]["searchAfter"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    #[tokio::test]
    async fn walk_follows_cursors_in_order() {
        let server = MockServer::start().await;
        mount_page(&server, "", fixture_page(&["1", "2"], Some("c1"))).await;
        mount_page(&server, "c1", fixture_page(&["3", "4"], Some("c2"))).await;
        mount_page(&server, "c2", fixture_page(&["5"], None)).await;

        let filter = SearchFilter::new(15, 20, "10001");
        let walk = walk_partition(&Client::new(), &server.uri(), &filter).await;

        let expected: HashSet<String> =
            ["1", "2", "3", "4", "5"].iter().map(|s| s.to_string()).collect();
        assert_eq!(walk.ids, expected);
        assert_eq!(walk.envelope_key.as_deref(), Some("searchProvidersChildCare"));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(request_cursors(&requests), ["", "c1", "c2"]);
    }

    #[tokio::test]
    async fn walk_keeps_partial_ids_when_a_page_carries_errors() {
        let server = MockServer::start().await;
        mount_page(&server, "", fixture_page(&["1", "2"], Some("c1"))).await;
        mount_page(
            &server,
            "c1",
            json!({"data": null, "errors": [{"message": "throttled"}]}),
        )
        .await;

        let filter = SearchFilter::new(15, 20, "10001");
        let walk = walk_partition(&Client::new(), &server.uri(), &filter).await;

        let expected: HashSet<String> = ["1", "2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(walk.ids, expected);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn walk_survives_a_server_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let filter = SearchFilter::new(15, 20, "10001");
        let walk = walk_partition(&Client::new(), &server.uri(), &filter).await;

        assert!(walk.ids.is_empty());
        assert!(walk.envelope_key.is_none());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn body_carries_attributes_only_for_non_empty_partitions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture_page(&[], None)))
            .mount(&server)
            .await;

        let base = SearchFilter::new(15, 20, "10001");
        walk_partition(&Client::new(), &server.uri(), &base).await;
        let partitioned = base.with_attributes(vec!["NON_SMOKER".to_string()]);
        walk_partition(&Client::new(), &server.uri(), &partitioned).await;

        let requests = server.received_requests().await.unwrap();
        let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert!(first["variables"]["input"].get("attributes").is_none());
        assert_eq!(second["variables"]["input"]["attributes"], json!(["NON_SMOKER"]));
        assert_eq!(
            second["variables"]["input"]["filters"]["searchSortOrder"],
            json!("BEST_MATCH")
        );
    }
}
