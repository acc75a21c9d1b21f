use std::sync::Arc;

use nlsub_client_core::newsletter::{NewsletterEntry, entries_from_urls, validate_url};

use crate::backend::JobService;
use crate::error::RegistryError;

/// Local copy of the service-owned newsletter registry.
///
/// Mutations replace the remote list wholesale and then re-read it, so the mirror always
/// reflects whatever the service stored, not what was computed locally.
pub struct RegistryMirror {
    service: Arc<dyn JobService>,
    entries: Vec<NewsletterEntry>,
    loaded: bool,
}

impl RegistryMirror {
    /// Empty mirror; call [`RegistryMirror::refresh`] to populate it. Mutations load it first
    /// when that has not happened yet.
    pub fn new(service: Arc<dyn JobService>) -> Self {
        Self {
            service,
            entries: Vec::new(),
            loaded: false,
        }
    }

    /// Current entries in service order.
    pub fn entries(&self) -> &[NewsletterEntry] {
        &self.entries
    }

    /// Current URLs in service order.
    pub fn urls(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.url.clone()).collect()
    }

    /// Whether `url` is in the mirrored set.
    pub fn contains(&self, url: &str) -> bool {
        let url = url.trim();
        self.entries.iter().any(|e| e.url == url)
    }

    /// Re-read the registry from the service.
    pub async fn refresh(&mut self) -> Result<&[NewsletterEntry], RegistryError> {
        let urls = self.service.registry().await?;
        self.entries = entries_from_urls(urls);
        self.loaded = true;
        log::debug!("registry mirror refreshed: {} entries", self.entries.len());
        Ok(&self.entries)
    }

    /// Add `url` to the registry. Invalid URLs fail before any request is made.
    pub async fn add(&mut self, url: &str) -> Result<(), RegistryError> {
        let url = validate_url(url).map_err(RegistryError::InvalidUrl)?;
        self.ensure_loaded().await?;
        let mut desired = self.urls();
        if !desired.contains(&url) {
            desired.push(url);
        }
        self.replace(desired).await
    }

    /// Remove `url` from the registry.
    pub async fn remove(&mut self, url: &str) -> Result<(), RegistryError> {
        self.ensure_loaded().await?;
        let url = url.trim();
        let desired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.url != url)
            .map(|e| e.url.clone())
            .collect();
        self.replace(desired).await
    }

    // An unloaded mirror is empty, and replacing from it would wipe the remote list.
    async fn ensure_loaded(&mut self) -> Result<(), RegistryError> {
        if !self.loaded {
            self.refresh().await?;
        }
        Ok(())
    }

    async fn replace(&mut self, desired: Vec<String>) -> Result<(), RegistryError> {
        self.service.replace_registry(&desired).await?;
        self.refresh().await?;
        Ok(())
    }
}
