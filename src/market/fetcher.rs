use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::types::{Market, MarketPage};

/// One page of the resolved-market listing.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn resolved_page(&self, cursor: Option<&str>) -> Result<MarketPage>;
}

/// Listing API client. One connection pool, reused for every page.
#[derive(Clone)]
pub struct MarketClient {
    client: reqwest::Client,
    base_url: String,
}

impl MarketClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MarketSource for MarketClient {
    async fn resolved_page(&self, cursor: Option<&str>) -> Result<MarketPage> {
        let url = format!("{}/markets", self.base_url);
        let mut query = vec![("state", "resolved")];
        if let Some(c) = cursor {
            query.push(("cursor", c));
        }

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned an error status"))?;

        resp.json::<MarketPage>()
            .await
            .with_context(|| format!("failed to decode market page from {url}"))
    }
}

/// Collect every resolved market, following cursors until the listing ends.
///
/// No page or total cap: pagination stops only when the server stops
/// returning a cursor.
pub async fn fetch_resolved_markets<S: MarketSource + ?Sized>(source: &S) -> Result<Vec<Market>> {
    let mut markets = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source.resolved_page(cursor.as_deref()).await?;
        pages += 1;
        debug!(
            page = pages,
            markets = page.results.len(),
            more = page.next_cursor().is_some(),
            "fetched market page"
        );

        let next = page.next_cursor().map(str::to_owned);
        markets.extend(page.results);

        match next {
            Some(c) => cursor = Some(c),
            None => break,
        }
    }

    info!("Fetched {} resolved markets over {} pages", markets.len(), pages);
    Ok(markets)
}
