//! Entry links declared by the static `index.html`.

use regex::Regex;
use std::sync::OnceLock;

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<(?:link|script)\b[^>]*?\b(?:href|src)\s*=\s*["']([^"']+)["']"#)
            .expect("html link pattern is valid")
    })
}

/// `href` of every `<link>` and `src` of every `<script>`, in document order.
pub fn parse_html_links(html: &str) -> Vec<String> {
    link_regex()
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_html_links() {
        let html = r#"<!DOCTYPE html>
<html>
  <head>
    <link rel="stylesheet" href="./style/app.css">
    <link rel="icon" href='/favicon.ico' />
    <script type="module" src="/main.tsx"></script>
    <script src="https://cdn.dev/x.js"></script>
  </head>
</html>"#;
        assert_eq!(
            parse_html_links(html),
            vec!["./style/app.css", "/favicon.ico", "/main.tsx", "https://cdn.dev/x.js"]
        );
    }
}
