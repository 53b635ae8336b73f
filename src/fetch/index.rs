//! Static directory index scraping
//!
//! Distribution archive mirrors expose flat autogenerated listings.
//! The scrape fetches one page and returns every anchor `href` value
//! verbatim; filtering happens later in the version matcher.

use super::HttpFetch;
use crate::errors::Result;
use once_cell::sync::Lazy;
use regex::Regex;

static HREF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a\s[^>]*?href\s*=\s*["']([^"']*)["']"#).unwrap());

/// Extract anchor href values from an index page.
pub fn parse_href_list(markup: &str) -> Vec<String> {
    HREF_PATTERN
        .captures_iter(markup)
        .map(|c| c[1].to_string())
        .collect()
}

/// Fetch one index page and return its href values.
pub async fn fetch_href_list<C: HttpFetch>(client: &C, base_url: &str) -> Result<Vec<String>> {
    let body = client.get_text(base_url).await?;
    Ok(parse_href_list(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apache_style_index() {
        let markup = r#"
<html><body><pre>
<a href="../">../</a>
<a href="linux-headers-5.4.0-100-generic_5.4.0-100.113_amd64.deb">link</a>
<a href="linux-headers-5.4.0-104-generic_5.4.0-104.118_amd64.deb">link</a>
</pre></body></html>"#;
        let hrefs = parse_href_list(markup);
        assert_eq!(
            hrefs,
            vec![
                "../",
                "linux-headers-5.4.0-100-generic_5.4.0-100.113_amd64.deb",
                "linux-headers-5.4.0-104-generic_5.4.0-104.118_amd64.deb",
            ]
        );
    }

    #[test]
    fn test_parse_single_quoted_and_extra_attributes() {
        let markup = r#"<a class="f" href='kernel-devel-5.14.0-70.el9.x86_64.rpm'>k</a>"#;
        assert_eq!(parse_href_list(markup), vec!["kernel-devel-5.14.0-70.el9.x86_64.rpm"]);
    }

    #[test]
    fn test_parse_no_anchors() {
        assert!(parse_href_list("<html><body>empty</body></html>").is_empty());
    }

    #[test]
    fn test_values_returned_verbatim() {
        // No filtering at this stage, parent links and querystrings stay.
        let markup = r#"<a href="?C=M;O=A">sort</a><a href="/pool/">dir</a>"#;
        assert_eq!(parse_href_list(markup), vec!["?C=M;O=A", "/pool/"]);
    }

    #[tokio::test]
    async fn test_fetch_href_list() {
        use crate::fetch::tests::StubHttp;
        use std::collections::HashMap;

        let mut responses = HashMap::new();
        responses.insert(
            "http://mirror/l/linux".to_string(),
            r#"<a href="linux-5.4.0.tar.gz">x</a>"#.to_string(),
        );
        let client = StubHttp { responses };
        let list = fetch_href_list(&client, "http://mirror/l/linux").await.unwrap();
        assert_eq!(list, vec!["linux-5.4.0.tar.gz"]);
    }
}
