use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result, KNOWN_ENVELOPE_KEYS, PROVIDER_NODE_TAG};

/// One decoded page of search results, with the envelope key it arrived
/// under. The key varies by care vertical, so it gets discovered per page
/// rather than assumed.
#[derive(Debug)]
pub struct SearchPage {
    pub envelope_key: String,
    pub connection: SearchConnection,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "searchProvidersConnection")]
    search_providers_connection: SearchConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConnection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct Edge {
    pub node: ProviderNode,
}

/// A connection node. Only nodes tagged as real provider records carry a
/// member; the API interleaves other variants we skip.
#[derive(Debug, Deserialize)]
pub struct ProviderNode {
    #[serde(rename = "__typename")]
    pub typename: String,
    #[serde(default)]
    pub member: Option<Member>,
}

#[derive(Debug, Deserialize)]
pub struct Member {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Cursor for the next fetch, or `None` once the walk is done.
    /// `hasNextPage` without an `endCursor` also ends the walk; there is
    /// nothing left to continue from.
    pub fn next_cursor(&self) -> Option<&str> {
        if self.has_next_page {
            self.end_cursor.as_deref()
        } else {
            None
        }
    }
}

impl SearchConnection {
    /// Ids of every edge carrying a real provider record. Other node
    /// variants (error placeholders and the like) are skipped silently.
    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.edges
            .iter()
            .filter(|edge| edge.node.typename == PROVIDER_NODE_TAG)
            .filter_map(|edge| edge.node.member.as_ref())
            .map(|member| member.id.as_str())
    }
}

/// Decodes a full response body into a [`SearchPage`].
///
/// Bodies carrying an "errors" array or missing "data" are rejected
/// outright. The envelope key is tried against the known category labels
/// first, then every remaining key under "data" is structurally probed;
/// whichever value decodes as a search connection wins.
pub fn parse_page(body: &Value) -> Result<SearchPage> {
    if let Some(errors) = body.get("errors") {
        return Err(Error::GraphqlErrors(errors.to_string()));
    }
    let data = body
        .get("data")
        .and_then(Value::as_object)
        .ok_or(Error::MissingData)?;

    let candidates = KNOWN_ENVELOPE_KEYS
        .iter()
        .copied()
        .filter(|key| data.contains_key(*key))
        .chain(
            data.keys()
                .map(String::as_str)
                .filter(|key| !KNOWN_ENVELOPE_KEYS.contains(key)),
        );

    for key in candidates {
        if let Ok(envelope) = serde_json::from_value::<Envelope>(data[key].clone()) {
            return Ok(SearchPage {
                envelope_key: key.to_string(),
                connection: envelope.search_providers_connection,
            });
        }
    }

    Err(Error::UnknownEnvelope)
}
