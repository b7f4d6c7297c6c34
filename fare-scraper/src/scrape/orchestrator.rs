//! The scrape run itself.
//!
//! A run either rebuilds a complete result from cache (the fast path, no
//! browser) or loads the results list and walks every upcoming departure:
//! cached ones are replayed, the rest are visited in the browser, priced and
//! written back. Per-departure failures are collected rather than raised, so
//! a run returns whatever it managed to price.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use super::config::{ScrapeConfig, SessionMode};
use super::events::EventSink;
use super::strategy::{DetailSource, IsolatedSessions, SharedSession};
use crate::abort::AbortChannel;
use crate::cache::ScrapeCache;
use crate::clock::Clock;
use crate::domain::{
    Candidate, ClockTime, Departure, RouteDate, RouteMetadata, ScrapeResult, ScrapeStats,
    TimingRecord,
};
use crate::extract::{extract_candidates, extract_prices};
use crate::session::{RotationPolicy, ScrapeSession, SessionError, SessionLauncher};

/// Run-level failures. Per-departure problems never show up here.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("browser session failed: {0}")]
    Session(#[from] SessionError),
}

/// Per-request knobs.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    /// Ignore cached departures and metadata; everything is re-scraped.
    pub bypass_cache: bool,

    /// Only scrape the departure leaving at this "HH:MM".
    pub single_departure: Option<String>,
}

/// Tallies from the per-departure loop.
#[derive(Debug, Default)]
struct LoopOutcome {
    departures: Vec<Departure>,
    failed: Vec<String>,
    cache_hits: usize,
    scraped: usize,
    aborted: bool,
    detail_ms: Vec<u64>,
}

pub struct Scraper {
    launcher: Arc<dyn SessionLauncher>,
    cache: ScrapeCache,
    abort: AbortChannel,
    clock: Arc<dyn Clock>,
    config: ScrapeConfig,
}

impl Scraper {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        cache: ScrapeCache,
        abort: AbortChannel,
        clock: Arc<dyn Clock>,
        config: ScrapeConfig,
    ) -> Self {
        Self {
            launcher,
            cache,
            abort,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Scrape departures and fares for `target`, pushing progress to
    /// `events` as it goes.
    pub async fn scrape(
        &self,
        target: &RouteDate,
        options: &ScrapeOptions,
        events: &EventSink,
    ) -> Result<ScrapeResult, ScrapeError> {
        // A flag left over from an earlier run must not stop this one.
        self.abort.clear(target).await;

        if !options.bypass_cache {
            if let Some(result) = self.from_cache(target, options, events).await {
                return Ok(result);
            }
        }

        self.scrape_live(target, options, events).await
    }

    /// Rebuild the whole result from cache, if every piece is fresh.
    async fn from_cache(
        &self,
        target: &RouteDate,
        options: &ScrapeOptions,
        events: &EventSink,
    ) -> Option<ScrapeResult> {
        let meta = self.cache.route_metadata(target).await?;
        if meta.incomplete {
            debug!(route = %target.route, "route metadata incomplete, scraping");
            return None;
        }
        if let Some(single) = options.single_departure.as_deref() {
            if !meta.departure_times.iter().any(|t| t == single) {
                return None;
            }
        }

        let mut departures = Vec::with_capacity(meta.departure_times.len());
        for time in &meta.departure_times {
            match self.cache.departure(target, time).await {
                Some(departure) => departures.push(departure),
                None => {
                    debug!(departure = %time, "cached departure missing or stale, scraping");
                    return None;
                }
            }
        }

        let now = self.clock.local_now();
        departures.retain(|d| {
            self.is_wanted(target, &d.departure_time, now, options.single_departure.as_deref())
        });

        info!(
            route = %target.route,
            date = %target.date_str(),
            departures = departures.len(),
            "serving route from cache"
        );

        let total = departures.len();
        events.status("Loaded from cache").await;
        events.progress(0, total).await;
        for (i, departure) in departures.iter().enumerate() {
            events.departure(departure.clone()).await;
            events.progress(i + 1, total).await;
        }

        let scraped_at = DateTime::<Utc>::from_timestamp_millis(meta.timestamp)
            .unwrap_or_else(|| self.clock.now());

        Some(ScrapeResult {
            route: target.route.to_string(),
            date: target.date,
            scraped_at,
            departures,
            stats: ScrapeStats {
                clicks_saved: total,
                pages_visited: 0,
            },
            incomplete: false,
            failed_count: None,
            aborted: false,
        })
    }

    async fn scrape_live(
        &self,
        target: &RouteDate,
        options: &ScrapeOptions,
        events: &EventSink,
    ) -> Result<ScrapeResult, ScrapeError> {
        let started = Instant::now();
        info!(route = %target.route, date = %target.date_str(), "starting scrape");
        events
            .status(format!("Loading departures for {}", target.route))
            .await;

        let mut session = self.launcher.open(target).await?;
        let markup = match session.list_markup().await {
            Ok(markup) => markup,
            Err(e) => {
                session.close().await;
                return Err(e.into());
            }
        };
        let list_load_ms = elapsed_ms(started);

        let candidates = self.select_candidates(
            target,
            extract_candidates(&markup),
            options.single_departure.as_deref(),
        );
        let total = candidates.len();
        info!(route = %target.route, departures = total, "results list parsed");
        events.status(format!("Found {total} departures")).await;
        events.progress(0, total).await;

        let mut source = self.detail_source(target, session).await;
        let outcome = self
            .visit_all(target, &candidates, options, events, source.as_mut())
            .await;
        let rotations = source.rotations();
        source.close().await;
        let outcome = outcome?;

        if !outcome.aborted && options.single_departure.is_none() {
            let meta = RouteMetadata {
                total: outcome.departures.len(),
                departure_times: outcome
                    .departures
                    .iter()
                    .map(|d| d.departure_time.clone())
                    .collect(),
                timestamp: 0,
                incomplete: !outcome.failed.is_empty(),
                failed_departures: outcome.failed.clone(),
            };
            self.cache.put_route_metadata(target, meta).await;
        }

        let timing = TimingRecord {
            route: target.route.to_string(),
            date: target.date,
            list_load_ms,
            total_ms: elapsed_ms(started),
            scraped: outcome.scraped,
            cache_hits: outcome.cache_hits,
            failed: outcome.failed.len(),
            rotations,
            detail_ms: outcome.detail_ms.clone(),
        };
        self.cache.put_timing(target, &timing).await;

        info!(
            route = %target.route,
            date = %target.date_str(),
            total = outcome.departures.len(),
            cached = outcome.cache_hits,
            scraped = outcome.scraped,
            failed = outcome.failed.len(),
            rotations,
            aborted = outcome.aborted,
            elapsed_ms = timing.total_ms,
            "scrape complete"
        );
        if !outcome.failed.is_empty() {
            warn!(failed = ?outcome.failed, "some departures could not be scraped");
        }

        let failed = outcome.failed.len();
        Ok(ScrapeResult {
            route: target.route.to_string(),
            date: target.date,
            scraped_at: self.clock.now(),
            departures: outcome.departures,
            stats: ScrapeStats {
                clicks_saved: outcome.cache_hits,
                pages_visited: 1 + outcome.scraped,
            },
            incomplete: failed > 0,
            failed_count: (failed > 0).then_some(failed),
            aborted: outcome.aborted,
        })
    }

    async fn detail_source(
        &self,
        target: &RouteDate,
        list_session: Box<dyn ScrapeSession>,
    ) -> Box<dyn DetailSource> {
        match self.config.session_mode {
            SessionMode::Shared => Box::new(SharedSession::new(
                Arc::clone(&self.launcher),
                target.clone(),
                list_session,
                RotationPolicy::new(self.config.rotation_threshold),
                self.config.rotation_cooldown,
                self.config.retry_pause,
            )),
            SessionMode::Isolated => {
                list_session.close().await;
                Box::new(IsolatedSessions::new(
                    Arc::clone(&self.launcher),
                    target.clone(),
                    self.config.retry_pause,
                ))
            }
        }
    }

    async fn visit_all(
        &self,
        target: &RouteDate,
        candidates: &[Candidate],
        options: &ScrapeOptions,
        events: &EventSink,
        source: &mut dyn DetailSource,
    ) -> Result<LoopOutcome, ScrapeError> {
        let total = candidates.len();
        let mut out = LoopOutcome::default();

        for (i, candidate) in candidates.iter().enumerate() {
            let time = &candidate.departure_time;
            let more_remaining = i + 1 < total;

            if self.abort.take(target).await {
                info!(route = %target.route, at = %time, "abort requested, stopping");
                out.aborted = true;
                break;
            }

            if !options.bypass_cache {
                if let Some(departure) = self.cache.departure(target, time).await {
                    debug!(departure = %time, "cache hit");
                    out.cache_hits += 1;
                    events.departure(departure.clone()).await;
                    out.departures.push(departure);
                    events.progress(i + 1, total).await;
                    continue;
                }
            }

            debug!(departure = %time, current = i + 1, total, "scraping detail page");
            let visit_started = Instant::now();
            match source.visit(candidate).await {
                Ok(page) => {
                    let departure =
                        Departure::from_candidate(candidate, extract_prices(&page.markup), page.url);
                    self.cache.put_departure(target, &departure).await;
                    out.detail_ms.push(elapsed_ms(visit_started));
                    out.scraped += 1;

                    events.departure(departure.clone()).await;
                    out.departures.push(departure);
                    events.progress(i + 1, total).await;

                    source.after_visit(more_remaining).await?;
                    if more_remaining {
                        tokio::time::sleep(self.pacing_delay()).await;
                    }
                }
                Err(e) if e.is_recoverable() => {
                    warn!(departure = %time, error = %e, "departure failed");
                    out.failed.push(time.clone());
                    events.progress(i + 1, total).await;

                    if self.config.stop_on_first_error {
                        info!("stopping at first error");
                        break;
                    }
                    source.after_visit(more_remaining).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(out)
    }

    /// Drop departures without a time, those already gone, and, in
    /// single-departure mode, every other one.
    fn select_candidates(
        &self,
        target: &RouteDate,
        candidates: Vec<Candidate>,
        single: Option<&str>,
    ) -> Vec<Candidate> {
        let now = self.clock.local_now();
        let listed = candidates.len();
        let kept: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| {
                if c.departure_time.is_empty() {
                    warn!(card = c.card_index, "departure card without a time, skipping");
                    return false;
                }
                self.is_wanted(target, &c.departure_time, now, single)
            })
            .collect();
        if kept.len() < listed {
            debug!(listed, kept = kept.len(), "filtered departures");
        }
        kept
    }

    fn is_wanted(
        &self,
        target: &RouteDate,
        departure_time: &str,
        now: NaiveDateTime,
        single: Option<&str>,
    ) -> bool {
        if single.is_some_and(|s| s != departure_time) {
            return false;
        }
        match ClockTime::parse_hhmm(departure_time) {
            Ok(time) => {
                let departs = target.date.and_time(time.to_naive_time());
                now.checked_sub_signed(self.config.grace_period())
                    .is_none_or(|cutoff| departs >= cutoff)
            }
            Err(e) => {
                warn!(departure = %departure_time, error = %e, "unreadable departure time, skipping");
                false
            }
        }
    }

    fn pacing_delay(&self) -> Duration {
        let (min, max) = (self.config.pacing_min, self.config.pacing_max);
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
