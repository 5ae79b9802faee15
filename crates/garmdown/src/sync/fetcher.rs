//! Paginated activity listing
//!
//! The remote service does not reliably signal the end of the activity list,
//! so pages are requested from the start offset up to the configured
//! activity ceiling and collection stops once `limit` activities are built.

use crate::client::ActivitySource;
use crate::error::{GarmdownError, Result};
use crate::models::{Activity, ActivityFactory};

/// Activities built from one fetch, plus records whose type is not configured
#[derive(Debug, Default)]
pub struct FetchedActivities {
    pub activities: Vec<Activity>,
    /// Type keys of records skipped because `[activity_type]` has no entry
    pub unknown_types: Vec<String>,
}

/// Builds activities from pages of an [`ActivitySource`]
pub struct ActivityFetcher<'a> {
    source: &'a dyn ActivitySource,
    factory: &'a ActivityFactory,
    chunk_size: u32,
    activity_num: u32,
}

impl<'a> ActivityFetcher<'a> {
    pub fn new(
        source: &'a dyn ActivitySource,
        factory: &'a ActivityFactory,
        chunk_size: u32,
        activity_num: u32,
    ) -> Self {
        Self {
            source,
            factory,
            chunk_size,
            activity_num,
        }
    }

    /// Fetch up to `limit` activities (default: one chunk) starting at the
    /// 0-based `start` index
    pub fn fetch(&self, limit: Option<u32>, start: u32) -> Result<FetchedActivities> {
        let limit = limit.unwrap_or(self.chunk_size) as usize;
        let mut fetched = FetchedActivities::default();
        if limit == 0 {
            return Ok(fetched);
        }

        let mut offset = start;
        while offset < self.activity_num {
            tracing::debug!(offset, count = self.chunk_size, "fetching activity page");
            let page = self.source.list_activities(offset, self.chunk_size)?;

            for raw in page {
                match self.factory.create(raw) {
                    Ok(activity) => {
                        tracing::debug!(activity = %activity, "fetched activity");
                        fetched.activities.push(activity);
                    }
                    Err(GarmdownError::UnknownActivityType(type_key)) => {
                        tracing::warn!(%type_key, "no activity_type entry, skipping activity");
                        fetched.unknown_types.push(type_key);
                    }
                    Err(e) => return Err(e),
                }
                if fetched.activities.len() >= limit {
                    return Ok(fetched);
                }
            }

            offset = match offset.checked_add(self.chunk_size) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(fetched)
    }
}
