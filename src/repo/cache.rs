use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::domain::{Location, TrainedModel};

type CacheKey = (OrderedFloat<f64>, OrderedFloat<f64>, OrderedFloat<f64>);

fn key(location: &Location, tolerance: f64) -> CacheKey {
    (
        OrderedFloat(location.latitude),
        OrderedFloat(location.longitude),
        OrderedFloat(tolerance),
    )
}

/// Bounded LRU of loaded models keyed by the lookup arguments.
///
/// A capacity of 0 disables caching.
#[derive(Debug)]
pub struct ModelCache {
    capacity: usize,
    entries: Mutex<VecDeque<(CacheKey, Arc<TrainedModel>)>>,
}

impl ModelCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn get(&self, location: &Location, tolerance: f64) -> Option<Arc<TrainedModel>> {
        let wanted = key(location, tolerance);
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|(k, _)| *k == wanted)?;
        let entry = entries.remove(index)?;
        let model = entry.1.clone();
        entries.push_back(entry);
        Some(model)
    }

    pub fn insert(&self, location: &Location, tolerance: f64, model: Arc<TrainedModel>) {
        if self.capacity == 0 {
            return;
        }
        let wanted = key(location, tolerance);
        let mut entries = self.entries.lock();
        entries.retain(|(k, _)| *k != wanted);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back((wanted, model));
    }

    /// Drop every entry whose lookup box contains `location`
    pub fn invalidate_containing(&self, location: &Location) {
        self.entries.lock().retain(|((lat, lon, tol), _)| {
            !Location::new(lat.0, lon.0).bounds(tol.0).contains(location)
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
