//! HTML results-table indexer
//!
//! Scrapes search pages that render results as `table#searchResult`, one
//! row per torrent:
//!
//! | # | cell                          |
//! |---|-------------------------------|
//! | 0 | category                      |
//! | 1 | title link                    |
//! | 2 | upload date                   |
//! | 3 | magnet link (`a[href^=magnet:]`) |
//! | 4 | size                          |
//! | 5 | seeders                       |
//! | 6 | leechers                      |
//! | 7 | uploader                      |
//!
//! Rows with fewer than eight cells are headers or pagination and are
//! skipped silently.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{CandidateResult, Indexer, ParameterSet, SearchError};
use crate::services::rate_limiter::RateLimitedClient;

const MIN_CELLS: usize = 8;

/// Indexer that fetches `{base_url}{encoded query}{parameters}`
pub struct HtmlTableIndexer {
    client: RateLimitedClient,
    base_url: String,
    parameters: String,
    retry_parameters: String,
}

impl HtmlTableIndexer {
    pub fn new(
        client: RateLimitedClient,
        base_url: impl Into<String>,
        parameters: impl Into<String>,
        retry_parameters: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            parameters: parameters.into(),
            retry_parameters: retry_parameters.into(),
        }
    }

    /// Build the search URL for a query
    pub fn search_url(&self, query: &str, parameters: ParameterSet) -> String {
        let suffix = match parameters {
            ParameterSet::Primary => &self.parameters,
            ParameterSet::Retry => &self.retry_parameters,
        };
        format!("{}{}{}", self.base_url, urlencoding::encode(query), suffix)
    }
}

#[async_trait]
impl Indexer for HtmlTableIndexer {
    async fn search(
        &self,
        query: &str,
        parameters: ParameterSet,
    ) -> Result<Vec<CandidateResult>, SearchError> {
        let url = self.search_url(query, parameters);
        let response = self.client.get(&url).await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status()));
        }

        let body = response.text().await?;
        let results = parse_results(&body)?;

        debug!(
            query = %query,
            parameters = %parameters,
            results = results.len(),
            "Indexer search complete"
        );

        Ok(results)
    }
}

fn selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("bad selector '{}': {:?}", css, e)))
}

/// Text content of an element, whitespace-trimmed. Entities are already
/// decoded by the HTML parser.
fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Peer count as rendered, e.g. "1,234" or "1.234"; unreadable counts are 0
fn parse_count(text: &str) -> u32 {
    text.chars()
        .filter(|c| !matches!(c, ',' | '.' | '\'' | ' ' | '\u{a0}'))
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// Parse the results table of a search page. A page without the table
/// yields no results.
pub fn parse_results(html: &str) -> Result<Vec<CandidateResult>, SearchError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table#searchResult")?;
    let row_selector = selector("tr")?;
    let link_selector = selector("a")?;
    let magnet_selector = selector(r#"a[href^="magnet:"]"#)?;

    let Some(table) = document.select(&table_selector).next() else {
        return Ok(Vec::new());
    };

    let mut results = Vec::new();
    for row in table.select(&row_selector) {
        // direct children only, nested tables must not shift the columns
        let cells: Vec<ElementRef> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "td")
            .collect();

        if cells.len() < MIN_CELLS {
            continue;
        }

        let title = cells[1]
            .select(&link_selector)
            .next()
            .map(|a| cell_text(&a))
            .unwrap_or_else(|| cell_text(&cells[1]));

        if title.is_empty() {
            continue;
        }

        let magnet = cells[3]
            .select(&magnet_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.to_string());

        results.push(CandidateResult {
            title,
            uploaded: cell_text(&cells[2]),
            magnet,
            size: cell_text(&cells[4]),
            seeders: parse_count(&cell_text(&cells[5])),
            leechers: parse_count(&cell_text(&cells[6])),
            uploader: cell_text(&cells[7]),
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"
        <html><body>
        <table id="searchResult">
          <thead><tr><th>Type</th><th>Name</th></tr></thead>
          <tr>
            <td>Audio</td>
            <td><a href="/t/1">The Beatles - Abbey Road (2019 Remaster) [FLAC]</a></td>
            <td>05-12&nbsp;2019</td>
            <td><a href="magnet:?xt=urn:btih:abc&amp;dn=abbey">M</a></td>
            <td>1.2&nbsp;GiB</td>
            <td>1,042</td>
            <td>3</td>
            <td>uploader &amp; co</td>
          </tr>
          <tr><td colspan="8">1 2 3 next</td></tr>
          <tr>
            <td>Audio</td>
            <td><a href="/t/2">No magnet here</a></td>
            <td>today</td>
            <td></td>
            <td>10 MiB</td>
            <td>n/a</td>
            <td>0</td>
            <td>anon</td>
          </tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_results_rows() {
        let results = parse_results(PAGE).unwrap();
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.title, "The Beatles - Abbey Road (2019 Remaster) [FLAC]");
        assert_eq!(first.uploaded, "05-12\u{a0}2019");
        assert_eq!(first.magnet.as_deref(), Some("magnet:?xt=urn:btih:abc&dn=abbey"));
        assert_eq!(first.seeders, 1042);
        assert_eq!(first.leechers, 3);
        assert_eq!(first.uploader, "uploader & co");

        let second = &results[1];
        assert_eq!(second.magnet, None);
        assert_eq!(second.seeders, 0);
    }

    #[test]
    fn test_parse_count_with_separators() {
        assert_eq!(parse_count("1,234"), 1234);
        assert_eq!(parse_count("12\u{a0}345"), 12345);
        assert_eq!(parse_count("7"), 7);
        assert_eq!(parse_count("n/a"), 0);
    }

    #[test]
    fn test_parse_results_without_table() {
        assert!(parse_results("<html><body>No hits</body></html>").unwrap().is_empty());
    }

    #[test]
    fn test_search_url_encodes_query() {
        let indexer = HtmlTableIndexer::new(
            RateLimitedClient::for_indexer().unwrap(),
            "https://indexer.example/search/",
            "/1/99/100",
            "/1/99/0",
        );
        assert_eq!(
            indexer.search_url("Sigur Rós Takk", ParameterSet::Primary),
            "https://indexer.example/search/Sigur%20R%C3%B3s%20Takk/1/99/100"
        );
        assert_eq!(
            indexer.search_url("a&b", ParameterSet::Retry),
            "https://indexer.example/search/a%26b/1/99/0"
        );
    }
}
