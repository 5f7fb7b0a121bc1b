//! Request construction for the platform API
//!
//! GraphQL endpoints take their arguments as JSON documents packed into the
//! `variables`, `features` and `fieldToggles` query parameters.

use crate::config::EndpointConfig;
use crate::ConfigError;
use serde_json::{json, Value};
use url::Url;

/// Parsed endpoint URLs
#[derive(Debug, Clone)]
pub struct Endpoints {
    platform: String,
    tweet_detail: Url,
    following: Url,
    block_user: Url,
}

impl Endpoints {
    /// Parses the configured endpoint URLs
    pub fn from_config(config: &EndpointConfig) -> Result<Self, ConfigError> {
        let parse = |name: &str, value: &str| {
            Url::parse(value)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))
        };

        Ok(Self {
            platform: config.platform_url.trim_end_matches('/').to_string(),
            tweet_detail: parse("tweet_detail", &config.tweet_detail)?,
            following: parse("following", &config.following)?,
            block_user: parse("block_user", &config.block_user)?,
        })
    }

    /// URL of one page of the conversation rooted at `root_id`
    pub fn conversation(&self, root_id: &str, cursor: Option<&str>) -> Url {
        let mut variables = json!({
            "focalTweetId": root_id,
            "with_rux_injections": false,
            "rankingMode": "Relevance",
            "includePromotedContent": true,
            "withCommunity": true,
            "withQuickPromoteEligibilityTweetFields": true,
            "withBirdwatchNotes": true,
            "withVoice": true,
        });
        if let (Some(cursor), Some(map)) = (cursor, variables.as_object_mut()) {
            map.insert("cursor".to_string(), Value::String(cursor.to_string()));
        }

        let mut url = self.tweet_detail.clone();
        url.query_pairs_mut()
            .append_pair("variables", &variables.to_string())
            .append_pair("features", &features().to_string())
            .append_pair("fieldToggles", &field_toggles().to_string());
        url
    }

    /// URL of the first page of accounts `user_id` follows
    pub fn following(&self, user_id: &str, count: u32) -> Url {
        let variables = json!({
            "userId": user_id,
            "count": count,
            "includePromotedContent": false,
        });

        let mut url = self.following.clone();
        url.query_pairs_mut()
            .append_pair("variables", &variables.to_string())
            .append_pair("features", &features().to_string());
        url
    }

    /// URL of the block action
    pub fn block_user(&self) -> Url {
        self.block_user.clone()
    }

    /// Form-encoded body of a block request
    pub fn block_body(user_id: &str) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("user_id", user_id)
            .finish()
    }

    /// Public link to a reply: `<platform>/<handle>/status/<id>`
    pub fn permalink(&self, screen_name: &str, tweet_id: &str) -> String {
        format!("{}/{}/status/{}", self.platform, screen_name, tweet_id)
    }
}

/// Feature switches the GraphQL endpoints expect
fn features() -> Value {
    json!({
        "rweb_video_screen_enabled": false,
        "payments_enabled": false,
        "profile_label_improvements_pcf_label_in_post_enabled": true,
        "rweb_tipjar_consumption_enabled": true,
        "verified_phone_label_enabled": false,
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "premium_content_api_read_enabled": false,
        "communities_web_enable_tweet_community_results_fetch": true,
        "c9s_tweet_anatomy_moderator_badge_enabled": true,
        "responsive_web_grok_analyze_button_fetch_trends_enabled": false,
        "responsive_web_grok_analyze_post_followups_enabled": true,
        "responsive_web_jetfuel_frame": false,
        "responsive_web_grok_share_attachment_enabled": true,
        "articles_preview_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "responsive_web_twitter_article_tweet_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "responsive_web_grok_show_grok_translated_post": false,
        "responsive_web_grok_analysis_button_from_backend": false,
        "creator_subscriptions_quote_tweet_preview_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "responsive_web_grok_image_annotation_enabled": true,
        "responsive_web_enhance_cards_enabled": false,
    })
}

fn field_toggles() -> Value {
    json!({
        "withArticleRichContentState": true,
        "withArticlePlainText": false,
        "withGrokAnalyze": false,
        "withDisallowedReplyControls": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::from_config(&EndpointConfig::default()).unwrap()
    }

    fn variables(url: &Url) -> Value {
        let (_, raw) = url
            .query_pairs()
            .find(|(name, _)| name == "variables")
            .unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_conversation_url_without_cursor() {
        let url = endpoints().conversation("1234", None);
        let vars = variables(&url);

        assert!(url.path().ends_with("/TweetDetail"));
        assert_eq!(vars["focalTweetId"], "1234");
        assert!(vars.get("cursor").is_none());
        assert!(url.query_pairs().any(|(name, _)| name == "fieldToggles"));
    }

    #[test]
    fn test_conversation_url_with_cursor() {
        let url = endpoints().conversation("1234", Some("DAACCgAC&x=1"));
        assert_eq!(variables(&url)["cursor"], "DAACCgAC&x=1");
    }

    #[test]
    fn test_following_url() {
        let url = endpoints().following("99", 20);
        let vars = variables(&url);
        assert_eq!(vars["userId"], "99");
        assert_eq!(vars["count"], 20);
    }

    #[test]
    fn test_block_body_and_permalink() {
        assert_eq!(Endpoints::block_body("42"), "user_id=42");

        let mut config = EndpointConfig::default();
        config.platform_url = "https://x.com/".to_string();
        let endpoints = Endpoints::from_config(&config).unwrap();
        assert_eq!(
            endpoints.permalink("spambot", "777"),
            "https://x.com/spambot/status/777"
        );
    }
}
