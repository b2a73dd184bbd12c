use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::domain::{EventId, Festival};
use super::repository::{DataService, DataServiceError};
use crate::workflows::badges::BadgeCatalog;

/// Read-through cache in front of the data service, scoped to one session.
///
/// Badge definitions are loaded once. Festivals are cached until invalidated or pushed out
/// by the capacity bound; attendance lists are never cached because eligibility must reflect
/// the current state.
#[derive(Debug)]
pub struct SessionCache {
    badges: RwLock<Option<Arc<BadgeCatalog>>>,
    festivals: RwLock<HashMap<EventId, Festival>>,
    festival_capacity: usize,
}

pub const DEFAULT_FESTIVAL_CAPACITY: usize = 256;

impl Default for SessionCache {
    fn default() -> Self {
        Self::with_festival_capacity(DEFAULT_FESTIVAL_CAPACITY)
    }
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_festival_capacity(capacity: usize) -> Self {
        Self {
            badges: RwLock::new(None),
            festivals: RwLock::new(HashMap::new()),
            festival_capacity: capacity.max(1),
        }
    }

    pub fn cached_festival_count(&self) -> usize {
        self.festivals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Pre-populates the catalog so `load_badges` never reaches the data service.
    pub fn seed_badges(&self, catalog: BadgeCatalog) {
        *self.badges.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(catalog));
    }

    pub fn cached_badges(&self) -> Option<Arc<BadgeCatalog>> {
        self.badges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn load_badges<D>(&self, data: &D) -> Result<Arc<BadgeCatalog>, DataServiceError>
    where
        D: DataService + ?Sized,
    {
        if let Some(catalog) = self.cached_badges() {
            return Ok(catalog);
        }

        let catalog = Arc::new(BadgeCatalog::new(data.fetch_badge_definitions().await?));
        *self.badges.write().unwrap_or_else(PoisonError::into_inner) = Some(catalog.clone());
        Ok(catalog)
    }

    pub async fn load_festival<D>(
        &self,
        data: &D,
        event_id: &EventId,
    ) -> Result<Option<Festival>, DataServiceError>
    where
        D: DataService + ?Sized,
    {
        let cached = self
            .festivals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_id)
            .cloned();
        if cached.is_some() {
            return Ok(cached);
        }

        let festival = data.fetch_festival(event_id).await?;
        if let Some(festival) = &festival {
            let mut festivals = self.festivals.write().unwrap_or_else(PoisonError::into_inner);
            if festivals.len() >= self.festival_capacity && !festivals.contains_key(event_id) {
                let evicted = festivals.keys().next().cloned();
                if let Some(evicted) = evicted {
                    festivals.remove(&evicted);
                }
            }
            festivals.insert(event_id.clone(), festival.clone());
        }
        Ok(festival)
    }

    pub fn invalidate_festival(&self, event_id: &EventId) {
        self.festivals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event_id);
    }
}

