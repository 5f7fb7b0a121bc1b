//! Thread reference parsing
//!
//! A conversation is named either by its root tweet id or by the URL of
//! any status page, e.g. `https://x.com/someone/status/1234567890`.

use crate::SweeperError;
use url::Url;

/// Extracts the root tweet id from a status URL or a bare id
///
/// # Arguments
///
/// * `input` - A numeric id, or an absolute URL whose path contains
///   `/status/<id>`
///
/// # Returns
///
/// * `Ok(String)` - The numeric id
/// * `Err(SweeperError::ThreadId)` - No id could be found
///
/// # Example
///
/// ```
/// use reply_sweeper::parse_thread_id;
///
/// assert_eq!(parse_thread_id("1234").unwrap(), "1234");
/// assert_eq!(
///     parse_thread_id("https://x.com/someone/status/1234?s=20").unwrap(),
///     "1234"
/// );
/// ```
pub fn parse_thread_id(input: &str) -> Result<String, SweeperError> {
    let input = input.trim();
    if is_numeric_id(input) {
        return Ok(input.to_string());
    }

    let url = Url::parse(input)
        .map_err(|_| SweeperError::ThreadId(format!("'{}' is neither an id nor a URL", input)))?;

    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    segments
        .windows(2)
        .find(|pair| pair[0] == "status" && is_numeric_id(pair[1]))
        .map(|pair| pair[1].to_string())
        .ok_or_else(|| SweeperError::ThreadId(format!("no status id in '{}'", input)))
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id() {
        assert_eq!(parse_thread_id(" 1790000000000000000 ").unwrap(), "1790000000000000000");
    }

    #[test]
    fn test_status_urls() {
        for url in [
            "https://x.com/someone/status/42",
            "https://twitter.com/someone/status/42/photo/1",
            "https://x.com/i/web/status/42",
            "https://mobile.x.com/someone/status/42?ref=abc#top",
        ] {
            assert_eq!(parse_thread_id(url).unwrap(), "42", "{}", url);
        }
    }

    #[test]
    fn test_rejects_non_status_references() {
        for input in [
            "",
            "12a",
            "https://x.com/someone",
            "https://x.com/someone/status/abc",
            "not a url",
        ] {
            assert!(
                matches!(parse_thread_id(input), Err(SweeperError::ThreadId(_))),
                "{}",
                input
            );
        }
    }
}
