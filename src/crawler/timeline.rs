//! Conversation timeline extraction
//!
//! This module turns one page of the conversation API into an ordered list
//! of entries:
//! - Reply tweets with their author's profile record
//! - Continuation cursors for further pages
//! - Withheld tweets (limited visibility, tombstones), which are skipped
//!
//! Entries are decoded one at a time, so a single unexpected entry never
//! spoils the rest of the page. Only a missing instruction list makes the
//! whole page malformed.

use serde::Deserialize;
use serde_json::{Map, Value};

/// One page of a conversation
#[derive(Debug, Clone, Default)]
pub struct ConversationPage {
    /// Entries in document order
    pub entries: Vec<Entry>,
}

#[cfg(test)]
impl ConversationPage {
    /// Continuation cursors on this page, in document order
    pub fn cursors(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Cursor(token) => Some(token.as_str()),
            _ => None,
        })
    }

    /// Reply tweets on this page, in document order
    pub fn tweets(&self) -> impl Iterator<Item = &TweetEntry> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Tweet(tweet) => Some(tweet),
            _ => None,
        })
    }
}

/// A single item of a conversation page
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Tweet(TweetEntry),
    Cursor(String),
    Withheld(Withheld),
    Other,
}

/// Why a tweet entry carries no usable record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Withheld {
    LimitedVisibility,
    Tombstone,
}

/// A reply and its author
#[derive(Debug, Clone, PartialEq)]
pub struct TweetEntry {
    /// Numeric id of the author
    pub author_id: String,

    /// Numeric id of the tweet
    pub tweet_id: String,

    /// The author's profile record
    pub profile: Value,

    /// The tweet record
    pub tweet: Value,
}

impl TweetEntry {
    pub fn text(&self) -> &str {
        self.tweet
            .get("full_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn screen_name(&self) -> &str {
        self.profile
            .get("screen_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        self.profile
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

// Response envelope. Field names follow the wire format.

#[derive(Deserialize)]
struct ConversationResponse {
    data: ConversationData,
}

#[derive(Deserialize)]
struct ConversationData {
    threaded_conversation_with_injections_v2: Timeline,
}

/// Instruction list shared by every timeline response
#[derive(Deserialize)]
pub(crate) struct Timeline {
    pub(crate) instructions: Vec<Instruction>,
}

#[derive(Deserialize)]
pub(crate) struct Instruction {
    #[serde(default)]
    pub(crate) entries: Vec<Value>,
}

#[derive(Deserialize)]
struct RawEntry {
    content: EntryContent,
}

#[derive(Deserialize)]
#[serde(tag = "entryType")]
enum EntryContent {
    TimelineTimelineItem {
        #[serde(rename = "itemContent")]
        item_content: Value,
    },
    TimelineTimelineModule {
        #[serde(default)]
        items: Vec<ModuleItem>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct ModuleItem {
    item: ModuleItemBody,
}

#[derive(Deserialize)]
struct ModuleItemBody {
    #[serde(rename = "itemContent")]
    item_content: Value,
}

#[derive(Deserialize)]
#[serde(tag = "itemType")]
enum ItemContent {
    TimelineTweet {
        tweet_results: TweetResults,
    },
    TimelineTimelineCursor {
        value: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct TweetResults {
    result: Option<TweetResult>,
}

#[derive(Deserialize)]
#[serde(tag = "__typename")]
enum TweetResult {
    Tweet(TweetRecord),
    TweetWithVisibilityResults {},
    TweetTombstone {},
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct TweetRecord {
    rest_id: Option<String>,
    core: TweetCore,
    #[serde(default)]
    legacy: Map<String, Value>,
}

#[derive(Deserialize)]
struct TweetCore {
    user_results: UserResults,
}

#[derive(Deserialize)]
struct UserResults {
    result: AuthorRecord,
}

#[derive(Deserialize)]
struct AuthorRecord {
    rest_id: Option<String>,
    #[serde(default)]
    legacy: Map<String, Value>,
    #[serde(default)]
    core: Map<String, Value>,
}

/// Extracts the entries of one conversation page
///
/// # Arguments
///
/// * `json` - Decoded response body
///
/// # Returns
///
/// * `Ok(ConversationPage)` - Entries in document order; module items are
///   flattened in place
/// * `Err(String)` - The response has no instruction list
pub fn parse_conversation_page(json: Value) -> Result<ConversationPage, String> {
    let response: ConversationResponse =
        serde_json::from_value(json).map_err(|e| e.to_string())?;

    let mut entries = Vec::new();
    for instruction in response.data.threaded_conversation_with_injections_v2.instructions {
        for raw in instruction.entries {
            match serde_json::from_value::<RawEntry>(raw) {
                Ok(RawEntry {
                    content: EntryContent::TimelineTimelineItem { item_content },
                }) => entries.push(item_entry(item_content)),
                Ok(RawEntry {
                    content: EntryContent::TimelineTimelineModule { items },
                }) => entries.extend(items.into_iter().map(|i| item_entry(i.item.item_content))),
                Ok(RawEntry {
                    content: EntryContent::Unknown,
                }) => entries.push(Entry::Other),
                Err(e) => {
                    tracing::trace!("Skipping undecodable timeline entry: {}", e);
                    entries.push(Entry::Other);
                }
            }
        }
    }

    Ok(ConversationPage { entries })
}

fn item_entry(item_content: Value) -> Entry {
    let item = match serde_json::from_value::<ItemContent>(item_content) {
        Ok(item) => item,
        Err(e) => {
            tracing::trace!("Skipping undecodable timeline item: {}", e);
            return Entry::Other;
        }
    };

    match item {
        ItemContent::TimelineTimelineCursor { value } => Entry::Cursor(value),
        ItemContent::TimelineTweet { tweet_results } => match tweet_results.result {
            Some(TweetResult::Tweet(record)) => tweet_entry(record).unwrap_or(Entry::Other),
            Some(TweetResult::TweetWithVisibilityResults {}) => {
                Entry::Withheld(Withheld::LimitedVisibility)
            }
            Some(TweetResult::TweetTombstone {}) => Entry::Withheld(Withheld::Tombstone),
            Some(TweetResult::Unknown) | None => Entry::Other,
        },
        ItemContent::Unknown => Entry::Other,
    }
}

fn tweet_entry(record: TweetRecord) -> Option<Entry> {
    let author = record.core.user_results.result;

    let author_id = record
        .legacy
        .get("user_id_str")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(author.rest_id)?;

    let tweet_id = record
        .legacy
        .get("id_str")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(record.rest_id)?;

    // Newer responses move name and handle out of the legacy record
    let mut profile = author.legacy;
    for field in ["name", "screen_name"] {
        if !profile.contains_key(field) {
            if let Some(value) = author.core.get(field) {
                profile.insert(field.to_string(), value.clone());
            }
        }
    }

    Some(Entry::Tweet(TweetEntry {
        author_id,
        tweet_id,
        profile: Value::Object(profile),
        tweet: Value::Object(record.legacy),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn tweet_item(author_id: &str, screen_name: &str, tweet_id: &str, text: &str) -> Value {
        json!({
            "itemType": "TimelineTweet",
            "tweet_results": {
                "result": {
                    "__typename": "Tweet",
                    "rest_id": tweet_id,
                    "core": {
                        "user_results": {
                            "result": {
                                "__typename": "User",
                                "rest_id": author_id,
                                "legacy": {
                                    "name": format!("{} name", screen_name),
                                    "screen_name": screen_name,
                                    "followers_count": 10,
                                }
                            }
                        }
                    },
                    "legacy": {
                        "id_str": tweet_id,
                        "user_id_str": author_id,
                        "full_text": text,
                    }
                }
            }
        })
    }

    pub(crate) fn cursor_item(value: &str) -> Value {
        json!({
            "itemType": "TimelineTimelineCursor",
            "cursorType": "Bottom",
            "value": value,
        })
    }

    fn page(entries: Vec<Value>) -> Value {
        json!({
            "data": {
                "threaded_conversation_with_injections_v2": {
                    "instructions": [
                        {"type": "TimelineClearCache"},
                        {"type": "TimelineAddEntries", "entries": entries}
                    ]
                }
            }
        })
    }

    fn item(content: Value) -> Value {
        json!({
            "entryId": "tweet-1",
            "content": {"entryType": "TimelineTimelineItem", "itemContent": content}
        })
    }

    fn module(contents: Vec<Value>) -> Value {
        let items: Vec<Value> = contents
            .into_iter()
            .map(|c| json!({"entryId": "item", "item": {"itemContent": c}}))
            .collect();
        json!({
            "entryId": "conversationthread-1",
            "content": {"entryType": "TimelineTimelineModule", "items": items}
        })
    }

    #[test]
    fn test_parse_items_and_modules_in_order() {
        let json = page(vec![
            item(tweet_item("1", "alice", "100", "hello")),
            module(vec![
                tweet_item("2", "bob", "101", "reply"),
                cursor_item("show-more"),
            ]),
            item(cursor_item("next-page")),
        ]);

        let parsed = parse_conversation_page(json).unwrap();
        let authors: Vec<&str> = parsed.tweets().map(|t| t.author_id.as_str()).collect();
        let cursors: Vec<&str> = parsed.cursors().collect();

        assert_eq!(authors, vec!["1", "2"]);
        assert_eq!(cursors, vec!["show-more", "next-page"]);
        assert_eq!(parsed.entries.len(), 4);
    }

    #[test]
    fn test_tweet_entry_fields() {
        let parsed = parse_conversation_page(page(vec![item(tweet_item(
            "7", "carol", "55", "text here",
        ))]))
        .unwrap();
        let tweet = parsed.tweets().next().unwrap();

        assert_eq!(tweet.tweet_id, "55");
        assert_eq!(tweet.text(), "text here");
        assert_eq!(tweet.screen_name(), "carol");
        assert_eq!(tweet.display_name(), "carol name");
        assert_eq!(tweet.profile["followers_count"], 10);
    }

    #[test]
    fn test_withheld_tweets_are_skipped() {
        let limited = json!({
            "itemType": "TimelineTweet",
            "tweet_results": {"result": {"__typename": "TweetWithVisibilityResults", "tweet": {}}}
        });
        let tombstone = json!({
            "itemType": "TimelineTweet",
            "tweet_results": {"result": {"__typename": "TweetTombstone", "tombstone": {}}}
        });

        let parsed = parse_conversation_page(page(vec![item(limited), item(tombstone)])).unwrap();
        assert_eq!(
            parsed.entries,
            vec![
                Entry::Withheld(Withheld::LimitedVisibility),
                Entry::Withheld(Withheld::Tombstone)
            ]
        );
    }

    #[test]
    fn test_profile_fields_from_core() {
        let content = json!({
            "itemType": "TimelineTweet",
            "tweet_results": {"result": {
                "__typename": "Tweet",
                "core": {"user_results": {"result": {
                    "rest_id": "9",
                    "core": {"name": "Dana", "screen_name": "dana"},
                    "legacy": {"followers_count": 3}
                }}},
                "legacy": {"id_str": "77", "full_text": "hi"}
            }}
        });

        let parsed = parse_conversation_page(page(vec![item(content)])).unwrap();
        let tweet = parsed.tweets().next().unwrap();
        assert_eq!(tweet.author_id, "9");
        assert_eq!(tweet.screen_name(), "dana");
        assert_eq!(tweet.display_name(), "Dana");
    }

    #[test]
    fn test_unexpected_entries_do_not_spoil_page() {
        let json = page(vec![
            json!({"entryId": "weird", "content": {"entryType": "TimelineTimelineItem"}}),
            json!({"entryId": "promo", "content": {"entryType": "TimelinePromotedThing"}}),
            item(json!({"itemType": "TimelineTweet", "tweet_results": {}})),
            item(tweet_item("3", "erin", "12", "ok")),
        ]);

        let parsed = parse_conversation_page(json).unwrap();
        assert_eq!(parsed.tweets().count(), 1);
        assert_eq!(parsed.entries.len(), 4);
    }

    #[test]
    fn test_missing_instructions_is_malformed() {
        assert!(parse_conversation_page(json!({"data": {}})).is_err());
        assert!(parse_conversation_page(Value::Null).is_err());
        assert!(parse_conversation_page(json!({"errors": [{"message": "nope"}]})).is_err());
    }
}
