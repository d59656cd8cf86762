pub mod rest;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

use crate::atom::Entry;

/// A source of feed entries. The pipeline only sees this seam, so tests can
/// drive a run from canned pages instead of the live API.
#[async_trait]
pub trait EntrySource: Send {
    async fn fetch_entries(&mut self) -> Result<Vec<Entry>>;
}
