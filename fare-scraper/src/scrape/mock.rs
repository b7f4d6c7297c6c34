//! Scripted booking site for tests.
//!
//! [`FakeSite`] serves a results list with one card per departure time and
//! a priced detail page per card. Individual departures can be made to fail
//! navigation or to take the whole browser down, and every session action is
//! logged so tests can assert on the exact sequence.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::abort::AbortChannel;
use crate::domain::RouteDate;
use crate::session::{DetailPage, ScrapeSession, SessionError, SessionLauncher};

/// One observable action against the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteEvent {
    Open,
    Navigate(String),
    ReturnToList,
    Close,
}

#[derive(Default)]
struct SiteState {
    times: Vec<String>,
    failing: HashSet<String>,
    crashing: HashSet<String>,
    fail_open: bool,
    opens: usize,
    log: Vec<SiteEvent>,
    abort_on: Option<(String, AbortChannel, RouteDate)>,
}

#[derive(Clone, Default)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub fn new(times: &[&str]) -> Self {
        let site = Self::default();
        site.lock().times = times.iter().map(|t| t.to_string()).collect();
        site
    }

    /// Navigation to `time` always fails, recoverably.
    pub fn failing(self, time: &str) -> Self {
        self.lock().failing.insert(time.to_string());
        self
    }

    /// Navigation to `time` kills the browser.
    pub fn crashing(self, time: &str) -> Self {
        self.lock().crashing.insert(time.to_string());
        self
    }

    /// Every launch fails.
    pub fn failing_open(self) -> Self {
        self.lock().fail_open = true;
        self
    }

    /// Raise the abort flag for `target` while `time` is being visited.
    pub fn abort_during(self, time: &str, abort: AbortChannel, target: RouteDate) -> Self {
        self.lock().abort_on = Some((time.to_string(), abort, target));
        self
    }

    pub fn launcher(&self) -> Arc<dyn SessionLauncher> {
        Arc::new(FakeLauncher { site: self.clone() })
    }

    /// Launch attempts, including failed ones.
    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    pub fn log(&self) -> Vec<SiteEvent> {
        self.lock().log.clone()
    }

    /// Departure times navigated to, in order, retries included.
    pub fn navigations(&self) -> Vec<String> {
        self.lock()
            .log
            .iter()
            .filter_map(|e| match e {
                SiteEvent::Navigate(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|e| **e == SiteEvent::Close)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: SiteEvent) {
        self.lock().log.push(event);
    }

    fn list_markup(&self) -> String {
        let cards: String = self
            .lock()
            .times
            .iter()
            .enumerate()
            .map(|(i, t)| list_card(i, t))
            .collect();
        format!("<html><body><main>{cards}</main></body></html>")
    }
}

fn list_card(index: usize, departure: &str) -> String {
    let arrival = departure
        .split_once(':')
        .and_then(|(h, m)| Some(format!("{:02}:{m}", (h.parse::<u32>().ok()? + 3) % 24)))
        .unwrap_or_default();
    format!(
        r#"<div data-testid="{id}"><span>{departure}</span><span>{arrival}</span><span>SJ Regional</span><span>0 changes</span><button>Select</button></div>"#,
        id = format!("{index:08x}-0000-4000-8000-{index:012x}"),
    )
}

/// Detail markup with the three standard fares.
pub fn detail_markup() -> String {
    r#"<html><body>
        <div><span data-testid="SECOND-price">Fr. 695 SEK</span></div>
        <div><span data-testid="SECOND_CALM-price">Fr. 745 SEK</span></div>
        <div><span data-testid="FIRST-price">Fr. 1,295 SEK</span></div>
    </body></html>"#
        .to_string()
}

pub fn booking_url(departure: &str) -> String {
    format!("https://www.sj.se/en/booking/{}", departure.replace(':', ""))
}

struct FakeLauncher {
    site: FakeSite,
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn open(&self, _target: &RouteDate) -> Result<Box<dyn ScrapeSession>, SessionError> {
        {
            let mut state = self.site.lock();
            state.opens += 1;
            if state.fail_open {
                return Err(SessionError::Launch("no browser available".into()));
            }
            state.log.push(SiteEvent::Open);
        }
        Ok(Box::new(FakeSession {
            site: self.site.clone(),
            showing: None,
        }))
    }
}

struct FakeSession {
    site: FakeSite,
    showing: Option<String>,
}

#[async_trait]
impl ScrapeSession for FakeSession {
    async fn list_markup(&mut self) -> Result<String, SessionError> {
        Ok(self.site.list_markup())
    }

    async fn navigate_to_detail(&mut self, departure_time: &str) -> Result<(), SessionError> {
        let abort = {
            let mut state = self.site.lock();
            state
                .log
                .push(SiteEvent::Navigate(departure_time.to_string()));
            if state.crashing.contains(departure_time) {
                return Err(SessionError::Closed);
            }
            if state.failing.contains(departure_time)
                || !state.times.iter().any(|t| t == departure_time)
            {
                return Err(SessionError::ElementNotFound(format!(
                    "card for {departure_time}"
                )));
            }
            state
                .abort_on
                .as_ref()
                .filter(|(t, _, _)| t == departure_time)
                .map(|(_, channel, target)| (channel.clone(), target.clone()))
        };

        if let Some((channel, target)) = abort {
            channel
                .signal(&target)
                .await
                .map_err(|e| SessionError::Script(e.to_string()))?;
        }

        self.showing = Some(departure_time.to_string());
        Ok(())
    }

    async fn detail_page(&mut self) -> Result<DetailPage, SessionError> {
        let departure = self
            .showing
            .as_deref()
            .ok_or_else(|| SessionError::Navigation("no detail page open".into()))?;
        Ok(DetailPage {
            markup: detail_markup(),
            url: booking_url(departure),
        })
    }

    async fn return_to_list(&mut self) -> Result<(), SessionError> {
        self.site.record(SiteEvent::ReturnToList);
        self.showing = None;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.site.record(SiteEvent::Close);
    }
}
