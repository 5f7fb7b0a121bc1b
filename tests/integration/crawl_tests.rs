//! Integration tests for the sweeper
//!
//! These tests use wiremock to create mock API servers and test the full
//! sweep cycle end-to-end through the real transport.

use reply_sweeper::config::{parse_config, Config};
use reply_sweeper::crawler::{Coordinator, RunOutcome, RunSummary};
use reply_sweeper::output::{BlockEvent, CrawlObserver, OutputResult};
use reply_sweeper::predicate::Predicate;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const DETAIL_PATH: &str = "/i/api/graphql/detail/TweetDetail";
const FOLLOWING_PATH: &str = "/i/api/graphql/following/Following";
const BLOCK_PATH: &str = "/i/api/1.1/blocks/create.json";

/// Creates a test configuration pointing every endpoint at the mock server
fn create_test_config(server: &MockServer) -> Config {
    let base = server.uri();
    parse_config(&format!(
        r#"
[session]
bearer-token = "AAAATEST"
cookie = "auth_token=secret; ct0=csrf-test"

[endpoints]
platform-url = "https://x.com"
tweet-detail = "{base}{DETAIL_PATH}"
following = "{base}{FOLLOWING_PATH}"
block-user = "{base}{BLOCK_PATH}"

[crawler]
max-retries = 0
retry-base-delay = 1
"#
    ))
    .expect("test config should be valid")
}

/// Matches conversation requests by the cursor in their `variables`
struct CursorIs(Option<&'static str>);

impl Match for CursorIs {
    fn matches(&self, request: &Request) -> bool {
        cursor_of(request).as_deref() == self.0
    }
}

fn variables_of(request: &Request) -> Value {
    request
        .url
        .query_pairs()
        .find(|(name, _)| name == "variables")
        .and_then(|(_, raw)| serde_json::from_str(&raw).ok())
        .unwrap_or(Value::Null)
}

fn cursor_of(request: &Request) -> Option<String> {
    variables_of(request)
        .get("cursor")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn reply(author_id: &str, screen_name: &str, tweet_id: &str, text: &str) -> Value {
    json!({
        "entryId": format!("tweet-{}", tweet_id),
        "content": {
            "entryType": "TimelineTimelineItem",
            "itemContent": {
                "itemType": "TimelineTweet",
                "tweet_results": {"result": {
                    "__typename": "Tweet",
                    "rest_id": tweet_id,
                    "core": {"user_results": {"result": {
                        "__typename": "User",
                        "rest_id": author_id,
                        "legacy": {
                            "name": format!("{} display", screen_name),
                            "screen_name": screen_name,
                            "followers_count": 12
                        }
                    }}},
                    "legacy": {
                        "id_str": tweet_id,
                        "user_id_str": author_id,
                        "full_text": text
                    }
                }}
            }
        }
    })
}

fn cursor(value: &str) -> Value {
    json!({
        "entryId": format!("cursor-bottom-{}", value),
        "content": {
            "entryType": "TimelineTimelineItem",
            "itemContent": {
                "itemType": "TimelineTimelineCursor",
                "cursorType": "Bottom",
                "value": value
            }
        }
    })
}

fn conversation_page(entries: Vec<Value>) -> Value {
    json!({"data": {"threaded_conversation_with_injections_v2": {
        "instructions": [{"type": "TimelineAddEntries", "entries": entries}]
    }}})
}

fn following_page(handles: &[&str]) -> Value {
    let entries: Vec<Value> = handles
        .iter()
        .map(|handle| {
            json!({
                "entryId": format!("user-{}", handle),
                "content": {
                    "entryType": "TimelineTimelineItem",
                    "itemContent": {"itemType": "TimelineUser", "user_results": {"result": {
                        "__typename": "User",
                        "core": {"screen_name": handle},
                        "relationship_perspectives": {"blocking": false}
                    }}}
                }
            })
        })
        .collect();
    json!({"data": {"user": {"result": {"timeline": {"timeline": {
        "instructions": [{"type": "TimelineAddEntries", "entries": entries}]
    }}}}}})
}

async fn mount_page(server: &MockServer, at: Option<&'static str>, entries: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(CursorIs(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(conversation_page(entries)))
        .mount(server)
        .await;
}

async fn mount_following(server: &MockServer, handles: &[&str]) {
    Mock::given(method("GET"))
        .and(path(FOLLOWING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(following_page(handles)))
        .mount(server)
        .await;
}

async fn mount_block(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id_str": "blocked"})))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, p: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .into_iter()
        .filter(|r| r.url.path() == p)
        .collect()
}

async fn run(server: &MockServer, source: &str) -> RunOutcome {
    let predicate = Predicate::compile(source).expect("predicate should compile");
    let mut coordinator = Coordinator::new(&create_test_config(server)).unwrap();
    coordinator
        .run("1000", &predicate, &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_single_page_blocks_only_matching_replier() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        None,
        vec![
            reply("101", "alice", "2001", "Great thread, thanks"),
            reply("102", "spambot", "2002", "Cheap followers, no spam here"),
        ],
    )
    .await;
    mount_following(&server, &[]).await;
    Mock::given(method("POST"))
        .and(path(BLOCK_PATH))
        .and(header("authorization", "Bearer AAAATEST"))
        .and(header("x-csrf-token", "csrf-test"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("user_id=102"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = run(&server, "return tweet.full_text.includes('spam');").await;

    assert_eq!(
        outcome,
        RunOutcome::Completed(RunSummary {
            blocked: 1,
            block_failures: 0,
            users_evaluated: 2,
            pages_fetched: 1,
            dry_run: false,
        })
    );
    assert_eq!(requests_to(&server, BLOCK_PATH).await.len(), 1);
}

#[tokio::test]
async fn test_cursor_links_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        None,
        vec![reply("101", "alice", "2001", "first"), cursor("page-2")],
    )
    .await;
    mount_page(&server, Some("page-2"), vec![reply("103", "carol", "2003", "second")]).await;
    mount_following(&server, &[]).await;

    let outcome = run(&server, "return false").await;

    assert!(outcome.is_completed());
    assert_eq!(outcome.summary().pages_fetched, 2);
    assert_eq!(outcome.summary().users_evaluated, 2);

    let fetches = requests_to(&server, DETAIL_PATH).await;
    assert_eq!(fetches.len(), 2);
    assert_eq!(cursor_of(&fetches[0]), None);
    assert_eq!(cursor_of(&fetches[1]).as_deref(), Some("page-2"));
    assert_eq!(variables_of(&fetches[1])["focalTweetId"], "1000");
}

#[tokio::test]
async fn test_cursors_are_visited_in_discovery_order() {
    let server = MockServer::start().await;
    mount_page(&server, None, vec![cursor("a"), cursor("b")]).await;
    mount_page(&server, Some("a"), vec![cursor("c")]).await;
    mount_page(&server, Some("b"), vec![]).await;
    mount_page(&server, Some("c"), vec![]).await;

    let outcome = run(&server, "return true").await;
    assert!(outcome.is_completed());

    let order: Vec<Option<String>> = requests_to(&server, DETAIL_PATH)
        .await
        .iter()
        .map(cursor_of)
        .collect();
    assert_eq!(
        order,
        vec![
            None,
            Some("a".to_string()),
            Some("b".to_string()),
            Some("c".to_string())
        ]
    );
}

#[tokio::test]
async fn test_never_matching_predicates_block_nobody() {
    for source in ["return false", "return profile.pinned.id_str == '1'", ""] {
        let server = MockServer::start().await;
        mount_page(
            &server,
            None,
            vec![
                reply("101", "alice", "2001", "spam"),
                reply("102", "bob", "2002", "spam"),
            ],
        )
        .await;
        mount_following(&server, &[]).await;
        mount_block(&server).await;

        let outcome = run(&server, source).await;

        assert!(outcome.is_completed(), "{:?}", source);
        assert_eq!(outcome.blocked(), 0, "{:?}", source);
        assert_eq!(outcome.summary().users_evaluated, 2, "{:?}", source);
        assert!(requests_to(&server, BLOCK_PATH).await.is_empty(), "{:?}", source);
    }
}

#[tokio::test]
async fn test_repeat_replier_is_evaluated_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        None,
        vec![
            reply("101", "alice", "2001", "one"),
            reply("101", "alice", "2002", "two"),
            cursor("more"),
        ],
    )
    .await;
    mount_page(&server, Some("more"), vec![reply("101", "alice", "2003", "three")]).await;
    mount_following(&server, &[]).await;
    mount_block(&server).await;

    let outcome = run(&server, "return true").await;

    assert_eq!(outcome.summary().users_evaluated, 1);
    assert_eq!(outcome.blocked(), 1);
    assert_eq!(requests_to(&server, FOLLOWING_PATH).await.len(), 1);
    assert_eq!(requests_to(&server, BLOCK_PATH).await.len(), 1);
}

#[tokio::test]
async fn test_following_list_reaches_predicate() {
    let server = MockServer::start().await;
    mount_page(&server, None, vec![reply("101", "alice", "2001", "hello")]).await;
    mount_following(&server, &["SomeOne", "BotFarm"]).await;
    mount_block(&server).await;

    let outcome = run(
        &server,
        "return followingUsers.some(u => u.screenName.toLowerCase() === 'botfarm');",
    )
    .await;
    assert_eq!(outcome.blocked(), 1);

    let lookup = &requests_to(&server, FOLLOWING_PATH).await[0];
    assert_eq!(variables_of(lookup)["userId"], "101");
    assert_eq!(variables_of(lookup)["count"], 20);
}

#[tokio::test]
async fn test_following_lookup_failure_is_absorbed() {
    let server = MockServer::start().await;
    mount_page(&server, None, vec![reply("101", "alice", "2001", "hello")]).await;
    Mock::given(method("GET"))
        .and(path(FOLLOWING_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_block(&server).await;

    let outcome = run(&server, "return followingUsers.length === 0").await;

    assert!(outcome.is_completed());
    assert_eq!(outcome.blocked(), 1);
}

#[tokio::test]
async fn test_failed_page_fetch_fails_run_with_partial_counts() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        None,
        vec![reply("102", "spambot", "2002", "spam"), cursor("broken")],
    )
    .await;
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(CursorIs(Some("broken")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_following(&server, &[]).await;
    mount_block(&server).await;

    let outcome = run(&server, "return true").await;

    match outcome {
        RunOutcome::Failed { cause, summary } => {
            assert!(cause.contains("broken"), "{}", cause);
            assert_eq!(summary.blocked, 1);
            assert_eq!(summary.pages_fetched, 1);
        }
        other => panic!("expected a failed run, got {:?}", other),
    }
}

#[tokio::test]
async fn test_first_page_failure_fails_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let outcome = run(&server, "return true").await;

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert_eq!(outcome.summary(), &RunSummary::default());
}

/// Cancels the run once the first user has been blocked
struct CancelAfterFirstBlock {
    token: CancellationToken,
}

impl CrawlObserver for CancelAfterFirstBlock {
    fn user_blocked(&mut self, _event: &BlockEvent) -> OutputResult<()> {
        self.token.cancel();
        Ok(())
    }
}

#[tokio::test]
async fn test_cancellation_stops_before_next_fetch() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        None,
        vec![
            reply("102", "spambot", "2002", "spam"),
            reply("103", "other", "2003", "spam"),
            cursor("next"),
        ],
    )
    .await;
    mount_page(&server, Some("next"), vec![reply("104", "late", "2004", "spam")]).await;
    mount_following(&server, &[]).await;
    mount_block(&server).await;

    let token = CancellationToken::new();
    let predicate = Predicate::compile("return true").unwrap();
    let mut coordinator = Coordinator::new(&create_test_config(&server))
        .unwrap()
        .with_observer(Box::new(CancelAfterFirstBlock {
            token: token.clone(),
        }));

    let outcome = coordinator.run("1000", &predicate, &token).await;

    assert_eq!(
        outcome,
        RunOutcome::Cancelled(RunSummary {
            blocked: 1,
            block_failures: 0,
            users_evaluated: 1,
            pages_fetched: 1,
            dry_run: false,
        })
    );
    assert_eq!(requests_to(&server, DETAIL_PATH).await.len(), 1);
    assert_eq!(requests_to(&server, BLOCK_PATH).await.len(), 1);
}

#[tokio::test]
async fn test_dry_run_sends_no_blocks() {
    let server = MockServer::start().await;
    mount_page(&server, None, vec![reply("102", "spambot", "2002", "spam")]).await;
    mount_following(&server, &[]).await;
    mount_block(&server).await;

    let predicate = Predicate::compile("return true").unwrap();
    let mut coordinator = Coordinator::new(&create_test_config(&server))
        .unwrap()
        .with_dry_run(true);
    let outcome = coordinator
        .run("1000", &predicate, &CancellationToken::new())
        .await;

    assert_eq!(outcome.blocked(), 1);
    assert!(outcome.summary().dry_run);
    assert!(requests_to(&server, BLOCK_PATH).await.is_empty());
}
