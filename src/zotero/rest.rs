use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::types::{FetchedPage, KeyInfo, LibraryHeaders};
use super::EntrySource;
use crate::atom::{self, Entry};
use crate::config::ZoteroConfig;

/// Zotero Web API v3 client for one group library.
pub struct ZoteroRest {
    client: Client,
    api_base: String,
    group_id: String,
    sort: String,
    direction: String,
    page_limit: u32,
    api_key: Option<String>,
}

impl ZoteroRest {
    pub fn new(config: &ZoteroConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            group_id: config.group_id.clone(),
            sort: config.sort.clone(),
            direction: config.direction.clone(),
            page_limit: config.page_limit,
            api_key,
        })
    }

    fn page_url(&self, start: usize) -> String {
        format!(
            "{}/groups/{}/items/top?format=atom&sort={}&direction={}&limit={}&start={}",
            self.api_base, self.group_id, self.sort, self.direction, self.page_limit, start,
        )
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url).header("Zotero-API-Version", "3");
        if let Some(key) = &self.api_key {
            req = req.header("Zotero-API-Key", key);
        }
        req
    }

    /// Validate the configured API key against `/keys/current`.
    pub async fn verify_key(&self) -> Result<KeyInfo> {
        let url = format!("{}/keys/current", self.api_base);
        let resp = self
            .request(&url)
            .send()
            .await
            .context("key validation request failed")?;
        let status = resp.status();
        if status.as_u16() == 403 {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Zotero rejected the API key (403 Forbidden).\n\
                 Possible causes:\n\
                 - ZOTERO_API_KEY was revoked or mistyped\n\
                 - the key lacks read access to the group library\n\
                 Server response: {}",
                body
            );
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("key validation failed ({}): {}", status, body);
        }
        resp.json().await.context("failed to parse key info")
    }

    async fn fetch_page(&self, start: usize) -> Result<FetchedPage> {
        let url = self.page_url(start);
        let resp = self
            .request(&url)
            .send()
            .await
            .context("zotero items request failed")?;

        let headers = LibraryHeaders::from_headers(resp.headers());
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET items/top failed ({}): {}", status, body);
        }

        let body = resp
            .text()
            .await
            .context("failed to read zotero response body")?;
        Ok(FetchedPage { body, headers })
    }
}

#[async_trait]
impl EntrySource for ZoteroRest {
    /// Fetch every top-level item of the group. Paginates until a page comes
    /// back empty or the reported total is reached.
    async fn fetch_entries(&mut self) -> Result<Vec<Entry>> {
        if self.api_key.is_some() {
            let key = self.verify_key().await?;
            tracing::debug!(
                username = key.username.as_deref().unwrap_or("?"),
                "API key accepted"
            );
        }

        let mut all: Vec<Entry> = Vec::new();
        let mut start: usize = 0;
        let mut total: Option<u64> = None;

        loop {
            let page = self.fetch_page(start).await?;

            if total.is_none() {
                total = page.headers.total_results;
                tracing::info!(
                    group = %self.group_id,
                    total = total.unwrap_or(0),
                    library_version = page.headers.library_version.unwrap_or(0),
                    "starting library fetch"
                );
            }
            if let Some(secs) = page.headers.backoff_secs {
                tracing::warn!(backoff_secs = secs, "zotero asked clients to back off");
            }

            let entries = atom::parse_entries(&page.body)?;
            if entries.is_empty() {
                break;
            }
            tracing::debug!(start, count = entries.len(), "fetched page");

            // Advance by the count actually received, not the requested limit.
            start += entries.len();
            all.extend(entries);

            if total.is_some_and(|t| start as u64 >= t) {
                break;
            }
        }

        tracing::info!(entries = all.len(), "library fetch complete");
        Ok(all)
    }
}
