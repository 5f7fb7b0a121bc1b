use serde::Deserialize;

/// Main configuration structure for Reply-Sweeper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub session: SessionConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub predicate: PredicateConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Credentials of the session the crawler acts on behalf of
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Bearer token sent in the `authorization` header
    #[serde(rename = "bearer-token")]
    pub bearer_token: String,

    /// Raw `cookie` header of the logged-in session
    #[serde(default)]
    pub cookie: String,

    /// Explicit anti-forgery token; derived from the `ct0` cookie when absent
    #[serde(rename = "csrf-token", default)]
    pub csrf_token: Option<String>,
}

impl SessionConfig {
    /// Returns the `authorization` header value, adding the `Bearer` scheme if missing
    pub fn authorization(&self) -> String {
        let token = self.bearer_token.trim();
        if token.starts_with("Bearer ") {
            token.to_string()
        } else {
            format!("Bearer {}", token)
        }
    }

    /// Returns the anti-forgery token for the session
    ///
    /// An explicit `csrf-token` wins; otherwise the value of the `ct0`
    /// cookie is used.
    pub fn csrf_token(&self) -> Option<String> {
        if let Some(token) = self.csrf_token.as_deref().map(str::trim) {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }

        self.cookie
            .split(';')
            .map(str::trim)
            .find_map(|pair| pair.strip_prefix("ct0="))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// API endpoints used by the crawler
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Base URL used to build permalinks of blocked replies
    #[serde(rename = "platform-url", default = "default_platform_url")]
    pub platform_url: String,

    /// Conversation (thread detail) GraphQL endpoint
    #[serde(rename = "tweet-detail", default = "default_tweet_detail")]
    pub tweet_detail: String,

    /// Following list GraphQL endpoint
    #[serde(default = "default_following")]
    pub following: String,

    /// Block action REST endpoint
    #[serde(rename = "block-user", default = "default_block_user")]
    pub block_user: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            platform_url: default_platform_url(),
            tweet_detail: default_tweet_detail(),
            following: default_following(),
            block_user: default_block_user(),
        }
    }
}

fn default_platform_url() -> String {
    "https://x.com".to_string()
}

fn default_tweet_detail() -> String {
    "https://x.com/i/api/graphql/c9RRUtQyVCoDVtyu4CXG0g/TweetDetail".to_string()
}

fn default_following() -> String {
    "https://x.com/i/api/graphql/0HRVUaBSRLwHSp3nc4HdYg/Following".to_string()
}

fn default_block_user() -> String {
    "https://x.com/i/api/1.1/blocks/create.json".to_string()
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of followed accounts fetched per replier
    #[serde(rename = "following-page-size", default = "default_following_page_size")]
    pub following_page_size: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Retries for rate-limited (429) and server-error (5xx) responses
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential backoff (milliseconds)
    #[serde(rename = "retry-base-delay", default = "default_retry_base_delay")]
    pub retry_base_delay: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            following_page_size: default_following_page_size(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay: default_retry_base_delay(),
        }
    }
}

fn default_following_page_size() -> u32 {
    20
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay() -> u64 {
    1000
}

/// Where the predicate source text is persisted
#[derive(Debug, Clone, Deserialize)]
pub struct PredicateConfig {
    #[serde(rename = "store-path", default = "default_store_path")]
    pub store_path: String,
}

impl Default for PredicateConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "predicate.txt".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Optional JSON-lines file receiving one record per blocked user
    #[serde(rename = "report-path", default)]
    pub report_path: Option<String>,
}
