// src/discover/listing.rs
//! Listing-page parsing: qualifying links → dated candidates.

use reqwest::Url;
use scraper::{Html, Selector};

use super::date::extract_date;
use super::Candidate;

/// Marker for the monitoring upload path used by the regional DA sites.
pub const DEFAULT_LINK_MARKER: &str = "PriceMonitoring";

/// A link qualifies when it contains the site marker and a `.pdf` suffix marker.
pub fn qualifies(href: &str, marker: &str) -> bool {
    href.contains(marker) && href.to_ascii_lowercase().contains(".pdf")
}

/// Resolve `href` against the origin of the listing page.
pub fn absolutize(listing_url: &Url, href: &str) -> Option<Url> {
    let root = listing_url.join("/").ok()?;
    root.join(href.trim()).ok()
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Enumerate dated candidates in page order. Undated links are dropped.
pub fn collect_candidates(html: &str, listing_url: &Url, marker: &str) -> Vec<Candidate> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a[href]").expect("anchor selector");

    let mut out = Vec::new();
    for a in doc.select(&sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        if !qualifies(href, marker) {
            continue;
        }
        let Some(abs) = absolutize(listing_url, href) else {
            tracing::debug!(target: "discover", href, "unresolvable link skipped");
            continue;
        };
        let label = collapse_ws(&a.text().collect::<Vec<_>>().join(" "));

        match extract_date(abs.path(), &label) {
            Some(found) => {
                tracing::info!(
                    target: "discover",
                    url = %abs,
                    date = %found.date,
                    origin = ?found.origin,
                    "candidate dated"
                );
                out.push(Candidate {
                    document_url: abs.to_string(),
                    resolved_date: found.date,
                    date_origin: found.origin,
                });
            }
            None => {
                tracing::debug!(target: "discover", url = %abs, label = %label, "no date found, link excluded");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Url {
        Url::parse("https://caraga.da.gov.ph/weekly-price-update/").unwrap()
    }

    #[test]
    fn qualifies_needs_marker_and_pdf() {
        assert!(qualifies("/wp-content/uploads/PriceMonitoring/x.pdf", "PriceMonitoring"));
        assert!(qualifies("/PriceMonitoring/x.PDF", "PriceMonitoring"));
        assert!(!qualifies("/wp-content/uploads/Other/x.pdf", "PriceMonitoring"));
        assert!(!qualifies("/PriceMonitoring/x.docx", "PriceMonitoring"));
    }

    #[test]
    fn relative_links_resolve_against_origin() {
        let l = listing();
        assert_eq!(
            absolutize(&l, "/wp-content/a.pdf").unwrap().as_str(),
            "https://caraga.da.gov.ph/wp-content/a.pdf"
        );
        assert_eq!(
            absolutize(&l, "wp-content/a.pdf").unwrap().as_str(),
            "https://caraga.da.gov.ph/wp-content/a.pdf"
        );
        assert_eq!(
            absolutize(&l, "https://cdn.example.org/a.pdf").unwrap().as_str(),
            "https://cdn.example.org/a.pdf"
        );
    }

    #[test]
    fn label_text_is_whitespace_collapsed() {
        let html = r#"<a href="/PriceMonitoring/latest.pdf">
            Price   Update <b>October</b>
            7 2025</a>"#;
        let c = collect_candidates(html, &listing(), DEFAULT_LINK_MARKER);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].resolved_date.to_string(), "2025-10-07");
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn dating_strategy_is_logged_at_info() {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let html = r#"<a href="/PriceMonitoring/September-25-2025.pdf">x</a>
            <a href="/PriceMonitoring/latest.pdf">October 7 2025</a>"#;
        tracing::subscriber::with_default(subscriber, || {
            collect_candidates(html, &listing(), DEFAULT_LINK_MARKER);
        });

        let logged = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logged.matches("candidate dated").count(), 2, "{logged}");
        assert!(logged.contains("FromPath"), "{logged}");
        assert!(logged.contains("FromLabel"), "{logged}");
    }
}
