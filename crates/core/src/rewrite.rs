//! HTML URL rewriting.
//!
//! Every resource- or navigation-bearing attribute in a fetched page is
//! replaced by a proxy-relative URL carrying the current session parameters,
//! so the embedded page keeps routing through the proxy on every hop.
//!
//! The pass is a walk over the parsed document tree driven by the declared
//! [`REWRITABLE_ATTRIBUTES`] table. It never fails: values that cannot be
//! resolved are left as they were.

use kuchikiki::traits::TendrilSink;
use kuchikiki::NodeRef;
use url::form_urlencoded;
use url::Url;

/// Route every rewritten URL points at.
pub const PROXY_ROUTE: &str = "/proxy";

/// A `(tag, attribute)` pair whose value is a URL the browser would fetch
/// or navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewritableAttr {
    pub tag: &'static str,
    pub attr: &'static str,
}

const fn rule(tag: &'static str, attr: &'static str) -> RewritableAttr {
    RewritableAttr { tag, attr }
}

/// Attributes routed back through the proxy.
pub const REWRITABLE_ATTRIBUTES: &[RewritableAttr] = &[
    rule("a", "href"),
    rule("script", "src"),
    rule("link", "href"),
    rule("img", "src"),
    rule("iframe", "src"),
    rule("source", "src"),
    rule("video", "src"),
    rule("audio", "src"),
];

/// Schemes that never trigger a network fetch and are left untouched.
const PASSTHROUGH_SCHEMES: &[&str] = &["data", "javascript", "blob", "about"];

/// Return the URI scheme of `value` if it starts with one (RFC 3986 syntax).
fn scheme_of(value: &str) -> Option<&str> {
    let (scheme, _) = value.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

// ---------------------------------------------------------------------------
// Rewriter
// ---------------------------------------------------------------------------

/// Rewrites URLs found in one fetched page.
#[derive(Debug, Clone)]
pub struct UrlRewriter {
    base: Url,
    forwarded: Vec<(String, String)>,
}

impl UrlRewriter {
    /// `base` is the resolved URL of the page; `forwarded` are the session
    /// parameters appended to every rewritten URL, in order.
    pub fn new(base: Url, forwarded: Vec<(String, String)>) -> Self {
        Self { base, forwarded }
    }

    /// Rewrite one attribute value against the page base.
    ///
    /// Returns `None` when the value must stay as it is: empty values,
    /// fragment-only references, non-fetching schemes, and anything that
    /// fails to parse or resolve.
    pub fn rewrite_url(&self, raw: &str) -> Option<String> {
        self.rewrite_against(&self.base, raw)
    }

    fn rewrite_against(&self, base: &Url, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() || value.starts_with('#') {
            return None;
        }

        match scheme_of(value) {
            Some(scheme)
                if PASSTHROUGH_SCHEMES
                    .iter()
                    .any(|s| scheme.eq_ignore_ascii_case(s)) =>
            {
                None
            }
            // Already absolute (http, https, mailto, ...): wrap verbatim.
            Some(_) => Url::parse(value).ok().map(|_| self.proxy_url(value)),
            None => base.join(value).ok().map(|abs| self.proxy_url(abs.as_str())),
        }
    }

    /// Build `/proxy?url=<absolute>&<forwarded...>`.
    pub fn proxy_url(&self, absolute: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("url", absolute);
        for (key, value) in &self.forwarded {
            query.append_pair(key, value);
        }
        format!("{PROXY_ROUTE}?{}", query.finish())
    }

    /// Parse `html`, rewrite every whitelisted attribute, and serialize the
    /// document back.
    ///
    /// A `<base href>` is honoured for resolution and then removed, since the
    /// browser would otherwise resolve the root-relative proxy URLs against
    /// the origin.
    pub fn rewrite_document(&self, html: &str) -> String {
        let document = kuchikiki::parse_html().one(html);
        let base = self.take_document_base(&document);

        for node in document.descendants() {
            let Some(element) = node.as_element() else {
                continue;
            };
            let tag = &*element.name.local;
            for rule in REWRITABLE_ATTRIBUTES.iter().filter(|r| r.tag == tag) {
                let mut attributes = element.attributes.borrow_mut();
                let Some(rewritten) = attributes
                    .get(rule.attr)
                    .and_then(|value| self.rewrite_against(&base, value))
                else {
                    continue;
                };
                attributes.insert(rule.attr, rewritten);
            }
        }

        document.to_string()
    }

    fn take_document_base(&self, document: &NodeRef) -> Url {
        let base_elements: Vec<NodeRef> = document
            .descendants()
            .filter(|node| {
                node.as_element()
                    .is_some_and(|element| &*element.name.local == "base")
            })
            .collect();

        let declared = base_elements.iter().find_map(|node| {
            let element = node.as_element()?;
            let href = element.attributes.borrow().get("href").map(str::to_string);
            href
        });

        for node in base_elements {
            node.detach();
        }

        declared
            .and_then(|href| self.base.join(href.trim()).ok())
            .unwrap_or_else(|| self.base.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter() -> UrlRewriter {
        UrlRewriter::new(
            Url::parse("http://example.com/page.html").unwrap(),
            vec![
                ("context".to_string(), "c1".to_string()),
                ("reviewerName".to_string(), "Ada".to_string()),
                ("reviewerEmail".to_string(), "ada@example.com".to_string()),
            ],
        )
    }

    const SESSION_QUERY: &str = "context=c1&reviewerName=Ada&reviewerEmail=ada%40example.com";

    fn attr(html: &str, selector: &str, name: &str) -> Option<String> {
        let document = kuchikiki::parse_html().one(html);
        let element = document.select_first(selector).ok()?;
        let value = element.attributes.borrow().get(name).map(str::to_string);
        value
    }

    // -- rewrite_url -----------------------------------------------------------

    #[test]
    fn relative_url_resolves_against_base() {
        assert_eq!(
            rewriter().rewrite_url("img/a.png").unwrap(),
            format!("/proxy?url=http%3A%2F%2Fexample.com%2Fimg%2Fa.png&{SESSION_QUERY}")
        );
    }

    #[test]
    fn absolute_url_is_wrapped_verbatim() {
        assert_eq!(
            rewriter().rewrite_url("https://other.com").unwrap(),
            format!("/proxy?url=https%3A%2F%2Fother.com&{SESSION_QUERY}")
        );
    }

    #[test]
    fn mailto_is_wrapped() {
        let rewritten = rewriter().rewrite_url("mailto:hi@example.com").unwrap();
        assert!(rewritten.starts_with("/proxy?url=mailto%3Ahi%40example.com&"));
    }

    #[test]
    fn protocol_relative_url_takes_page_scheme() {
        let rewritten = rewriter().rewrite_url("//cdn.example.net/app.js").unwrap();
        assert!(rewritten.starts_with("/proxy?url=http%3A%2F%2Fcdn.example.net%2Fapp.js&"));
    }

    #[test]
    fn root_relative_url_resolves_to_origin() {
        let rewritten = rewriter().rewrite_url("/css/site.css").unwrap();
        assert!(rewritten.starts_with("/proxy?url=http%3A%2F%2Fexample.com%2Fcss%2Fsite.css&"));
    }

    #[test]
    fn non_fetching_values_are_untouched() {
        let rw = rewriter();
        assert_eq!(rw.rewrite_url(""), None);
        assert_eq!(rw.rewrite_url("   "), None);
        assert_eq!(rw.rewrite_url("#section"), None);
        assert_eq!(rw.rewrite_url("data:image/png;base64,AAAA"), None);
        assert_eq!(rw.rewrite_url("javascript:void(0)"), None);
        assert_eq!(rw.rewrite_url("JavaScript:alert(1)"), None);
    }

    #[test]
    fn unresolvable_url_is_untouched() {
        assert_eq!(rewriter().rewrite_url("//[bad-host/x.png"), None);
        assert_eq!(rewriter().rewrite_url("http://[::1"), None);
    }

    #[test]
    fn no_forwarded_parameters_yields_bare_route() {
        let rw = UrlRewriter::new(Url::parse("https://example.com/").unwrap(), Vec::new());
        assert_eq!(
            rw.rewrite_url("about.html").unwrap(),
            "/proxy?url=https%3A%2F%2Fexample.com%2Fabout.html"
        );
    }

    // -- rewrite_document ------------------------------------------------------

    #[test]
    fn document_scenario_rewrites_image_and_anchor() {
        let html = r#"<html><body><img src="img/a.png"><a href="https://other.com">x</a></body></html>"#;
        let out = rewriter().rewrite_document(html);
        assert_eq!(
            attr(&out, "img", "src").unwrap(),
            format!("/proxy?url=http%3A%2F%2Fexample.com%2Fimg%2Fa.png&{SESSION_QUERY}")
        );
        assert_eq!(
            attr(&out, "a", "href").unwrap(),
            format!("/proxy?url=https%3A%2F%2Fother.com&{SESSION_QUERY}")
        );
    }

    #[test]
    fn every_whitelisted_attribute_routes_through_proxy() {
        let html = r#"<!doctype html><html><head>
            <link rel="stylesheet" href="style.css">
            <script src="/js/app.js"></script>
            </head><body>
            <a href="next.html">next</a>
            <a href="http://elsewhere.org/a?b=c">away</a>
            <img src="../logo.png">
            <iframe src="embed.html"></iframe>
            <video src="clip.mp4"><source src="clip.webm"></video>
            <audio src="sound.mp3"></audio>
            </body></html>"#;
        let out = rewriter().rewrite_document(html);
        let document = kuchikiki::parse_html().one(out.as_str());

        let mut checked = 0;
        for node in document.descendants() {
            let Some(element) = node.as_element() else { continue };
            for rule in REWRITABLE_ATTRIBUTES.iter().filter(|r| r.tag == &*element.name.local) {
                if let Some(value) = element.attributes.borrow().get(rule.attr) {
                    assert!(value.starts_with("/proxy?url="), "{} {} = {value}", rule.tag, rule.attr);
                    checked += 1;
                }
            }
        }
        assert_eq!(checked, 9);
    }

    #[test]
    fn unrelated_attributes_are_preserved() {
        let html = r#"<div data-src="keep.png" class="hero"><a class="btn" href="">x</a></div>"#;
        let out = rewriter().rewrite_document(html);
        assert_eq!(attr(&out, "div", "data-src").unwrap(), "keep.png");
        assert_eq!(attr(&out, "a", "class").unwrap(), "btn");
        assert_eq!(attr(&out, "a", "href").unwrap(), "");
    }

    #[test]
    fn base_href_is_honoured_and_removed() {
        let html = r#"<html><head><base href="https://cdn.example.com/assets/"></head>
            <body><img src="pic.png"></body></html>"#;
        let out = rewriter().rewrite_document(html);
        assert!(!out.contains("<base"));
        assert!(attr(&out, "img", "src")
            .unwrap()
            .starts_with("/proxy?url=https%3A%2F%2Fcdn.example.com%2Fassets%2Fpic.png&"));
    }

    #[test]
    fn malformed_html_still_produces_a_document() {
        let out = rewriter().rewrite_document("<p><img src=a.png<a href=b.html>unclosed");
        assert!(out.contains("<body>"));
    }
}
