//! Turns a rendered shop page into painting listings.
//!
//! Extraction is a pure function over an HTML snapshot: every anchor on the
//! page is a candidate, and any anchor that doesn't look like a product card
//! contributes nothing. A malformed card never fails the scrape.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

/// One painting offered on the shop page.
///
/// `handle` is the slug from the product URL path and doubles as the storage
/// key, so it must come out identical on every scrape of the same listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub url: String,
    pub title: String,
    pub handle: String,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub out_of_stock: bool,
    #[serde(with = "time::serde::timestamp")]
    pub found_at: OffsetDateTime,
}

/// A bare product link, for the link-scan endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProductLink {
    pub handle: String,
    pub url: String,
}

pub fn extract_listings(html: &str, page_url: &Url) -> Vec<Listing> {
    let document = Html::parse_document(html);
    let anchor_sel = Selector::parse("a[href]").unwrap();
    let img_sel = Selector::parse("img").unwrap();

    let mut listings = Vec::new();
    for anchor in document.select(&anchor_sel) {
        if let Some(listing) = parse_anchor(&anchor, page_url, &img_sel) {
            listings.push(listing);
        }
    }
    listings
}

/// Collect every product anchor as a `(handle, url)` pair, unparsed.
pub fn extract_product_links(html: &str, page_url: &Url) -> Vec<ProductLink> {
    let document = Html::parse_document(html);
    let anchor_sel = Selector::parse("a[href]").unwrap();

    let mut links = Vec::new();
    for anchor in document.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(url) = page_url.join(href) else {
            continue;
        };
        if let Some(handle) = product_handle(&url) {
            links.push(ProductLink {
                handle: handle.to_string(),
                url: url.to_string(),
            });
        }
    }
    links
}

fn parse_anchor(anchor: &ElementRef, page_url: &Url, img_sel: &Selector) -> Option<Listing> {
    let href = anchor.value().attr("href")?;
    let url = page_url.join(href).ok()?;

    // Product links look like:
    // https://.../product/-sullivan-school-/335?cp=true&sa=true
    let handle = product_handle(&url)?.to_string();

    let text = anchor.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // Card text looks like: "Sullivan School"\n  \n$50.00\n  \nOut of Stock
    let normalized = collapse_newlines(text);
    let mut segments = normalized.split('|');
    let title = segments.next().unwrap_or_default();
    let cost_display = segments.next();
    let stock_display = segments.next();

    let cost = cost_display.and_then(first_cost_token)?;
    if title.is_empty() {
        return None;
    }

    Some(Listing {
        url: url.to_string(),
        // Titles usually carry a pair of quotes
        title: strip_outer_quotes(title).to_string(),
        // Handles carry `-` on each end, derived from those quotes
        handle: trim_slug(&handle).to_string(),
        cost,
        image: nearest_image(anchor, page_url, img_sel),
        out_of_stock: stock_display.is_some_and(|s| !s.trim().is_empty()),
        found_at: OffsetDateTime::now_utc(),
    })
}

/// Match a `/product/{handle}/` path: the segment right after a literal
/// `product`, with a path boundary after it. Returns the raw slug.
fn product_handle(url: &Url) -> Option<&str> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    for (i, segment) in segments.iter().enumerate() {
        if *segment != "product" {
            continue;
        }
        let Some(handle) = segments.get(i + 1) else {
            continue;
        };
        // The trailing slash shows up as one more (possibly empty) segment.
        if !handle.is_empty() && segments.len() > i + 2 {
            return Some(handle);
        }
    }
    None
}

/// Collapse each newline plus any following whitespace into a single `|`.
fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\n' {
            out.push('|');
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// First token shaped like `digits` or `digits.dd`, parsed as the cost.
fn first_cost_token(display: &str) -> Option<f64> {
    let bytes = display.as_bytes();
    let start = display.find(|c: char| c.is_ascii_digit())?;
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end + 2 < bytes.len()
        && bytes[end] == b'.'
        && bytes[end + 1].is_ascii_digit()
        && bytes[end + 2].is_ascii_digit()
    {
        end += 3;
    }
    display[start..end].parse().ok()
}

fn strip_outer_quotes(title: &str) -> &str {
    let title = title.strip_prefix('"').unwrap_or(title);
    title.strip_suffix('"').unwrap_or(title)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Strip at most one non-word character from each end of the slug.
fn trim_slug(slug: &str) -> &str {
    let slug = match slug.chars().next() {
        Some(c) if !is_word_char(c) => &slug[c.len_utf8()..],
        _ => slug,
    };
    match slug.chars().next_back() {
        Some(c) if !is_word_char(c) => &slug[..slug.len() - c.len_utf8()],
        _ => slug,
    }
}

/// Largest preview image for a card: the first `<img>` under the nearest
/// ancestor-or-self of the anchor that contains one. A `srcset` is ordered
/// smallest to largest, so the last entry wins; otherwise plain `src`.
fn nearest_image(anchor: &ElementRef, page_url: &Url, img_sel: &Selector) -> Option<String> {
    let img = anchor.select(img_sel).next().or_else(|| {
        anchor.ancestors().find_map(|node| {
            let scope = ElementRef::wrap(node)?;
            scope.select(img_sel).next()
        })
    })?;

    let raw = match img.value().attr("srcset").and_then(largest_srcset_entry) {
        Some(entry) => entry,
        None => img.value().attr("src")?,
    };
    match page_url.join(raw) {
        Ok(resolved) => Some(resolved.to_string()),
        Err(_) => Some(raw.to_string()),
    }
}

fn largest_srcset_entry(srcset: &str) -> Option<&str> {
    srcset.split(',').next_back()?.trim().split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop_url() -> Url {
        Url::parse("https://gallery.example/s/shop").unwrap()
    }

    fn card(href: &str, text: &str) -> String {
        format!(r#"<div><a href="{href}">{text}</a></div>"#)
    }

    #[test]
    fn parses_a_full_card() {
        let html = format!(
            r#"<li>
                 <img src="small.jpg" srcset="img/a.jpg 320w, img/b.jpg 1280w">
                 <a href="/product/-sullivan-school-/335?cp=true&amp;sa=true">{}</a>
               </li>"#,
            "\"Sullivan School\"\n  \n$50.00\n  \nOut of Stock"
        );
        let listings = extract_listings(&html, &shop_url());
        assert_eq!(listings.len(), 1);

        let listing = &listings[0];
        assert_eq!(listing.title, "Sullivan School");
        assert_eq!(listing.handle, "sullivan-school");
        assert_eq!(listing.cost, 50.00);
        assert!(listing.out_of_stock);
        assert_eq!(
            listing.url,
            "https://gallery.example/product/-sullivan-school-/335?cp=true&sa=true"
        );
        assert_eq!(
            listing.image.as_deref(),
            Some("https://gallery.example/s/img/b.jpg")
        );
    }

    #[test]
    fn missing_stock_segment_means_in_stock() {
        let html = card("/product/quiet-bay/7/", "\"Quiet Bay\"\n  \n$75.50");
        let listings = extract_listings(&html, &shop_url());
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Quiet Bay");
        assert_eq!(listings[0].cost, 75.50);
        assert!(!listings[0].out_of_stock);
    }

    #[test]
    fn non_product_anchors_yield_nothing() {
        let html = concat!(
            r#"<a href="/s/about">About\n$10.00</a>"#,
            r#"<a href="/product/dangling">no trailing boundary\n$10.00</a>"#,
            r#"<a href="https://elsewhere.example/contact">Contact</a>"#,
        );
        assert!(extract_listings(html, &shop_url()).is_empty());
    }

    #[test]
    fn anchors_without_title_or_cost_are_skipped() {
        let empty = card("/product/blank/1/", "   ");
        assert!(extract_listings(&empty, &shop_url()).is_empty());

        let no_cost = card("/product/priceless/1/", "\"Priceless\"\n  \nCall us");
        assert!(extract_listings(&no_cost, &shop_url()).is_empty());
    }

    #[test]
    fn handle_strips_one_non_word_char_per_end() {
        let html = card("/product/-two--dashes--/9/", "\"X\"\n$5");
        let listings = extract_listings(&html, &shop_url());
        assert_eq!(listings[0].handle, "two--dashes-");
    }

    #[test]
    fn handle_is_stable_across_runs() {
        let html = card("/product/-sullivan-school-/335/", "\"Sullivan School\"\n$50.00");
        let first = extract_listings(&html, &shop_url());
        let second = extract_listings(&html, &shop_url());
        assert_eq!(first[0].handle, second[0].handle);
    }

    #[test]
    fn cost_takes_the_first_numeric_token() {
        let html = card("/product/p/1/", "\"P\"\nCAD $1,234.56");
        let listings = extract_listings(&html, &shop_url());
        // Two-decimal-or-integer format: the comma ends the first token.
        assert_eq!(listings[0].cost, 1.0);

        let html = card("/product/p/1/", "\"P\"\n$19.5 only");
        let listings = extract_listings(&html, &shop_url());
        assert_eq!(listings[0].cost, 19.0);
    }

    #[test]
    fn image_falls_back_to_src_when_srcset_is_empty() {
        let html = format!(
            r#"<div><img src="/img/plain.jpg" srcset=""><a href="/product/p/1/">{}</a></div>"#,
            "\"P\"\n$5"
        );
        let listings = extract_listings(&html, &shop_url());
        assert_eq!(
            listings[0].image.as_deref(),
            Some("https://gallery.example/img/plain.jpg")
        );
    }

    #[test]
    fn image_is_absent_when_no_ancestor_has_one() {
        let html = card("/product/p/1/", "\"P\"\n$5");
        let listings = extract_listings(&html, &shop_url());
        assert!(listings[0].image.is_none());
    }

    #[test]
    fn image_is_found_on_a_distant_ancestor() {
        let html = format!(
            r#"<section><img srcset="a.jpg 1x, b.jpg 2x"><div><div><a href="/product/p/1/">{}</a></div></div></section>"#,
            "\"P\"\n$5"
        );
        let listings = extract_listings(&html, &shop_url());
        assert_eq!(
            listings[0].image.as_deref(),
            Some("https://gallery.example/s/b.jpg")
        );
    }

    #[test]
    fn trailing_whitespace_does_not_mark_out_of_stock() {
        let html = card("/product/p/1/", "\"P\"\n$5\n   ");
        let listings = extract_listings(&html, &shop_url());
        assert!(!listings[0].out_of_stock);
    }

    #[test]
    fn collapses_newline_runs_into_one_separator() {
        assert_eq!(collapse_newlines("a\n  \n\tb\nc"), "a|b|c");
        assert_eq!(collapse_newlines("plain"), "plain");
    }

    #[test]
    fn product_links_are_collected_without_parsing() {
        let html = concat!(
            r#"<a href="/product/-first-/1/"></a>"#,
            r#"<a href="/s/about">About</a>"#,
            r#"<a href="/product/second/2?x=y"></a>"#,
        );
        let links = extract_product_links(html, &shop_url());
        let handles: Vec<&str> = links.iter().map(|l| l.handle.as_str()).collect();
        assert_eq!(handles, vec!["-first-", "second"]);
    }
}
