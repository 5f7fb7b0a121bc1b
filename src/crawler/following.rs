//! Following-list lookup
//!
//! Resolves the first page of accounts a replier follows, reduced to the
//! handle and whether the acting session already blocks that account. A
//! failed or unexpected lookup yields an empty list rather than an error.

use crate::crawler::endpoints::Endpoints;
use crate::crawler::timeline::Timeline;
use crate::crawler::transport::{Cancelled, Transport};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// An account the replier follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowingEdge {
    pub screen_name: String,
    pub is_blocked: bool,
}

#[derive(Deserialize)]
struct FollowingResponse {
    data: FollowingData,
}

#[derive(Deserialize)]
struct FollowingData {
    user: FollowingUser,
}

#[derive(Deserialize)]
struct FollowingUser {
    result: FollowingUserResult,
}

#[derive(Deserialize)]
struct FollowingUserResult {
    timeline: FollowingTimeline,
}

#[derive(Deserialize)]
struct FollowingTimeline {
    timeline: Timeline,
}

#[derive(Deserialize)]
struct UserEntry {
    content: UserEntryContent,
}

#[derive(Deserialize)]
#[serde(tag = "entryType")]
enum UserEntryContent {
    TimelineTimelineItem {
        #[serde(rename = "itemContent")]
        item_content: UserItem,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct UserItem {
    user_results: Option<UserResults>,
}

#[derive(Deserialize)]
struct UserResults {
    result: Option<UserResult>,
}

#[derive(Deserialize)]
#[serde(tag = "__typename")]
enum UserResult {
    User(UserRecord),
    UserUnavailable {},
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct UserRecord {
    #[serde(default)]
    core: Map<String, Value>,
    #[serde(default)]
    legacy: Map<String, Value>,
    #[serde(default)]
    relationship_perspectives: Map<String, Value>,
}

impl UserRecord {
    fn into_edge(self) -> Option<FollowingEdge> {
        let screen_name = self
            .core
            .get("screen_name")
            .or_else(|| self.legacy.get("screen_name"))
            .and_then(Value::as_str)?
            .to_string();

        let is_blocked = self
            .relationship_perspectives
            .get("blocking")
            .or_else(|| self.legacy.get("blocking"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Some(FollowingEdge {
            screen_name,
            is_blocked,
        })
    }
}

/// Extracts following edges from a decoded response
///
/// Entries that are not user items, unavailable users and users without a
/// handle are dropped. A response of any other shape yields no edges.
pub fn parse_following(json: Value) -> Vec<FollowingEdge> {
    let response: FollowingResponse = match serde_json::from_value(json) {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Unexpected following response: {}", e);
            return Vec::new();
        }
    };

    response
        .data
        .user
        .result
        .timeline
        .timeline
        .instructions
        .into_iter()
        .flat_map(|instruction| instruction.entries)
        .filter_map(|raw| serde_json::from_value::<UserEntry>(raw).ok())
        .filter_map(|entry| match entry.content {
            UserEntryContent::TimelineTimelineItem { item_content } => item_content.user_results,
            UserEntryContent::Unknown => None,
        })
        .filter_map(|results| match results.result {
            Some(UserResult::User(record)) => record.into_edge(),
            _ => None,
        })
        .collect()
}

/// Fetches the first page of accounts `user_id` follows
///
/// # Arguments
///
/// * `transport` - Authenticated transport
/// * `endpoints` - Endpoint URLs
/// * `user_id` - Numeric id of the replier
/// * `count` - Requested page size
/// * `cancel` - Run cancellation token
///
/// # Returns
///
/// * `Ok(edges)` - Possibly empty; lookup failures are absorbed here
/// * `Err(Cancelled)` - The run was cancelled
pub async fn fetch_following(
    transport: &Transport,
    endpoints: &Endpoints,
    user_id: &str,
    count: u32,
    cancel: &CancellationToken,
) -> Result<Vec<FollowingEdge>, Cancelled> {
    let url = endpoints.following(user_id, count);
    match transport.request(Method::GET, url, None, cancel).await? {
        Some(json) => Ok(parse_following(json)),
        None => {
            tracing::debug!("Following lookup failed for user {}", user_id);
            Ok(Vec::new())
        }
    }
}
