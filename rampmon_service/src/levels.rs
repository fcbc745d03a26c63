//! Fetch-and-normalize pipeline.
//!
//! `LevelFetcher` owns the data source and the fetch cache for one station.
//! Each call is a complete pass: serve from cache if fresh, otherwise
//! request and parse the CSV, and only cache a fully parsed dataset.
//! A failed pass leaves the cache exactly as it was.

use crate::analysis::depth::apply_reference;
use crate::cache::{FetchCache, RequestFingerprint};
use crate::config::AppConfig;
use crate::ingest::hydromet::{HydrometSource, build_daily_url, parse_daily_csv};
use crate::logging::{self, Component};
use crate::model::{Dataset, DateWindow, LevelsError, MAX_WINDOW_DAYS};
use crate::stations::Station;
use chrono::{DateTime, NaiveDate, Utc};

pub struct LevelFetcher<S: HydrometSource> {
    source: S,
    base_url: String,
    station: Station,
    cache: FetchCache,
    network_fetches: usize,
}

impl<S: HydrometSource> LevelFetcher<S> {
    pub fn new(source: S, base_url: impl Into<String>, station: Station, ttl: chrono::Duration) -> Self {
        Self {
            source,
            base_url: base_url.into(),
            station,
            cache: FetchCache::new(ttl),
            network_fetches: 0,
        }
    }

    pub fn from_config(source: S, config: &AppConfig, station: Station) -> Self {
        Self::new(source, config.base_url.clone(), station, config.cache_ttl())
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of requests actually sent to the source (cache misses).
    pub fn network_fetches(&self) -> usize {
        self.network_fetches
    }

    /// Fetches the `window_days` days ending at `end_date`, using the wall clock
    /// for cache expiry.
    pub fn fetch_levels(&mut self, end_date: NaiveDate, window_days: i64) -> Result<Dataset, LevelsError> {
        self.fetch_levels_at(end_date, window_days, Utc::now())
    }

    /// Same as `fetch_levels` with an explicit "now" for cache expiry.
    pub fn fetch_levels_at(
        &mut self,
        end_date: NaiveDate,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Dataset, LevelsError> {
        if !(1..=MAX_WINDOW_DAYS).contains(&window_days) {
            return Err(LevelsError::InvalidWindow(window_days));
        }
        let window = DateWindow::ending_at(end_date, window_days)
            .ok_or(LevelsError::InvalidWindow(window_days))?;
        let pcodes: Vec<&str> = self.station.pcodes.iter().map(String::as_str).collect();
        let key = RequestFingerprint::new(&self.station.code, window, &pcodes);

        if let Some(dataset) = self.cache.get(&key, now) {
            logging::debug(
                Component::Cache,
                Some(&self.station.code),
                &format!("hit for {} to {} ({} rows)", window.start, window.end, dataset.len()),
            );
            return Ok(dataset.clone());
        }

        let purged = self.cache.purge_stale(now);
        if purged > 0 {
            logging::debug(Component::Cache, None, &format!("purged {} stale entries", purged));
        }

        let url = build_daily_url(&self.base_url, &self.station.code, &window, &pcodes);
        logging::debug(Component::Hydromet, Some(&self.station.code), &format!("GET {}", url));

        self.network_fetches += 1;
        let dataset = self
            .source
            .get_text(&url)
            .map_err(LevelsError::from)
            .and_then(|body| parse_daily_csv(&body, &self.station.code).map_err(LevelsError::from))
            .map(|observations| Dataset::new(self.station.code.clone(), observations))
            .inspect_err(|e| logging::log_fetch_failure(&self.station.code, "fetch_levels", e))?;

        logging::info(
            Component::Hydromet,
            Some(&self.station.code),
            &format!("fetched {} rows for {} to {}", dataset.len(), window.start, window.end),
        );

        self.cache.insert(key, dataset.clone(), now);
        Ok(dataset)
    }

    /// One full render pass: fetch (or cache hit), then apply `reference`.
    pub fn depth_at_ramp_at(
        &mut self,
        end_date: NaiveDate,
        window_days: i64,
        reference: f64,
        now: DateTime<Utc>,
    ) -> Result<Dataset, LevelsError> {
        // Reject bad input before spending a request on it.
        if !reference.is_finite() {
            return Err(LevelsError::InvalidReference(reference));
        }
        let dataset = self.fetch_levels_at(end_date, window_days, now)?;
        apply_reference(&dataset, reference)
    }

    pub fn depth_at_ramp(
        &mut self,
        end_date: NaiveDate,
        window_days: i64,
        reference: f64,
    ) -> Result<Dataset, LevelsError> {
        self.depth_at_ramp_at(end_date, window_days, reference, Utc::now())
    }
}
