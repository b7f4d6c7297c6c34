//! Chromium-backed sessions over the DevTools protocol.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Handler, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::fingerprint::{Fingerprint, STEALTH_SCRIPT};
use super::scroll::{ScrollTarget, exhaust_lazy_load};
use super::{DetailPage, ScrapeSession, SessionConfig, SessionError, SessionLauncher};
use crate::domain::RouteDate;
use crate::extract::click_card_script;

const COOKIE_BUTTON_PRESENT: &str = "Array.from(document.querySelectorAll('button'))\
    .some((b) => (b.textContent || '').includes('Accept all cookies'))";

const COOKIE_BUTTON_CLICK: &str = "(() => {\
    const b = Array.from(document.querySelectorAll('button'))\
        .find((b) => (b.textContent || '').includes('Accept all cookies'));\
    if (!b) return false;\
    b.click();\
    return true;\
})()";

const ANY_TEST_ID_PRESENT: &str = "!!document.querySelector('[data-testid]')";

const PRICE_PRESENT: &str = "!!document.querySelector('[data-testid$=\"-price\"]')";

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";

const PAGE_HEIGHT: &str = "document.body ? document.body.scrollHeight : 0";

/// Pause after dismissing the cookie prompt so its overlay can close.
const COOKIE_SETTLE: Duration = Duration::from_secs(1);

/// Why the results list is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListLoad {
    /// First load in a new browser; the consent prompt may show.
    Initial,
    /// Back from a detail page. Consent was already given in this browser.
    Reload,
}

impl ListLoad {
    fn dismisses_cookie_prompt(self) -> bool {
        self == ListLoad::Initial
    }
}

/// Launches a fresh Chromium, with its own fingerprint, per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    config: SessionConfig,
}

impl ChromiumLauncher {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn open(&self, target: &RouteDate) -> Result<Box<dyn ScrapeSession>, SessionError> {
        let fingerprint = Fingerprint::randomized();
        let session = ChromiumSession::launch(self.config.clone(), target, fingerprint).await?;
        Ok(Box::new(session))
    }
}

/// A browser process with one tab parked on a results list.
pub struct ChromiumSession {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    interceptor: JoinHandle<()>,
    closed: Arc<AtomicBool>,
    config: SessionConfig,
    list_url: Url,
}

impl ChromiumSession {
    /// Start a browser, apply `fingerprint`, and load the list for `target`.
    ///
    /// The browser is shut down again if any step fails.
    pub async fn launch(
        config: SessionConfig,
        target: &RouteDate,
        fingerprint: Fingerprint,
    ) -> Result<Self, SessionError> {
        let list_url = config.list_url(target)?;
        let browser_config = browser_config(&config, &fingerprint)?;

        info!(
            route = %target.route,
            date = %target.date_str(),
            viewport = %format!("{}x{}", fingerprint.viewport_width, fingerprint.viewport_height),
            "launching browser"
        );

        let (mut browser, handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let closed = Arc::new(AtomicBool::new(false));
        let handler = spawn_handler(handler, Arc::clone(&closed));

        let (page, interceptor) = match prepare_page(&browser, &fingerprint).await {
            Ok(prepared) => prepared,
            Err(e) => {
                shutdown_browser(&mut browser).await;
                handler.abort();
                return Err(SessionError::Launch(e.to_string()));
            }
        };

        let session = Self {
            browser: Mutex::new(browser),
            page,
            handler,
            interceptor,
            closed,
            config,
            list_url,
        };

        if let Err(e) = session.load_list(ListLoad::Initial).await {
            session.shutdown().await;
            return Err(e);
        }
        Ok(session)
    }

    /// Navigate to the list URL and scroll until every departure has
    /// rendered, clearing the cookie prompt first on an initial load.
    async fn load_list(&self, load: ListLoad) -> Result<(), SessionError> {
        let started = Instant::now();
        debug!(url = %self.list_url, ?load, "loading results list");

        let navigation = self.page.goto(self.list_url.to_string());
        match tokio::time::timeout(self.config.list_timeout, navigation).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.page_error(e)),
            Err(_) => {
                return Err(SessionError::timeout("results list", self.config.list_timeout));
            }
        }

        if load.dismisses_cookie_prompt() {
            self.accept_cookies().await;
        }

        if !self
            .wait_for_script(ANY_TEST_ID_PRESENT, self.config.selector_wait)
            .await
        {
            warn!(url = %self.list_url, "no departure markup appeared before scrolling");
        }

        let scroll = self.config.scroll.clone();
        let outcome = exhaust_lazy_load(self, &scroll).await?;
        debug!(
            stop = ?outcome.stop,
            attempts = outcome.attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "results list ready"
        );
        Ok(())
    }

    /// Dismiss the consent prompt if it shows up. Its absence is fine.
    async fn accept_cookies(&self) {
        if !self
            .wait_for_script(COOKIE_BUTTON_PRESENT, self.config.cookie_wait)
            .await
        {
            debug!("no cookie dialog found or already accepted");
            return;
        }
        match self.evaluate::<bool>(COOKIE_BUTTON_CLICK).await {
            Ok(true) => {
                tokio::time::sleep(COOKIE_SETTLE).await;
                debug!("cookies accepted");
            }
            Ok(false) => debug!("cookie button vanished before click"),
            Err(e) => debug!(error = %e, "cookie button click failed"),
        }
    }

    /// Poll a boolean expression until it holds or `within` elapses.
    ///
    /// Evaluation errors count as "not yet"; the page may be mid-navigation.
    async fn wait_for_script(&self, expression: &str, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        loop {
            match self.evaluate::<bool>(expression).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => trace!(error = %e, "condition not evaluable yet"),
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn evaluate<T: DeserializeOwned>(&self, expression: &str) -> Result<T, SessionError> {
        let result = self
            .page
            .evaluate(expression.to_string())
            .await
            .map_err(|e| self.page_error(e))?;
        result
            .into_value::<T>()
            .map_err(|e| SessionError::Script(format!("unexpected script result: {e}")))
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        let url = self.page.url().await.map_err(|e| self.page_error(e))?;
        Ok(url.unwrap_or_default())
    }

    /// Classify a protocol failure on a live page.
    ///
    /// Once the handler has stopped the browser is gone; otherwise the
    /// failure is treated as a navigation problem with this page only.
    fn page_error(&self, e: CdpError) -> SessionError {
        if self.closed.load(Ordering::SeqCst) {
            SessionError::Closed
        } else {
            SessionError::Navigation(e.to_string())
        }
    }

    async fn shutdown(mut self) {
        self.interceptor.abort();
        shutdown_browser(self.browser.get_mut()).await;
        self.handler.abort();
    }
}

#[async_trait]
impl ScrollTarget for ChromiumSession {
    async fn scroll_to_bottom(&self) -> Result<(), SessionError> {
        self.page
            .evaluate(SCROLL_TO_BOTTOM.to_string())
            .await
            .map(|_| ())
            .map_err(|e| self.page_error(e))
    }

    async fn page_height(&self) -> Result<u64, SessionError> {
        self.evaluate::<u64>(PAGE_HEIGHT).await
    }
}

#[async_trait]
impl ScrapeSession for ChromiumSession {
    async fn list_markup(&mut self) -> Result<String, SessionError> {
        self.page.content().await.map_err(|e| self.page_error(e))
    }

    async fn navigate_to_detail(&mut self, departure_time: &str) -> Result<(), SessionError> {
        let before = self.current_url().await?;

        let clicked: bool = self.evaluate(&click_card_script(departure_time)).await?;
        if !clicked {
            return Err(SessionError::ElementNotFound(departure_time.to_string()));
        }

        let started = Instant::now();
        while self.current_url().await? == before {
            if started.elapsed() >= self.config.detail_timeout {
                return Err(SessionError::timeout(
                    format!("detail page for {departure_time}"),
                    started.elapsed(),
                ));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        if !self
            .wait_for_script(PRICE_PRESENT, self.config.price_wait)
            .await
        {
            warn!(departure = %departure_time, "no fares rendered on detail page");
        }
        Ok(())
    }

    async fn detail_page(&mut self) -> Result<DetailPage, SessionError> {
        let markup = self.page.content().await.map_err(|e| self.page_error(e))?;
        let url = self.current_url().await?;
        Ok(DetailPage { markup, url })
    }

    async fn return_to_list(&mut self) -> Result<(), SessionError> {
        self.load_list(ListLoad::Reload).await
    }

    async fn close(self: Box<Self>) {
        (*self).shutdown().await;
    }
}

fn browser_config(
    config: &SessionConfig,
    fingerprint: &Fingerprint,
) -> Result<BrowserConfig, SessionError> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
        .viewport(Viewport {
            width: fingerprint.viewport_width,
            height: fingerprint.viewport_height,
            ..Viewport::default()
        })
        .request_timeout(config.list_timeout)
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-gpu")
        .arg("--lang=en-US");

    if !config.headless {
        builder = builder.with_head();
    }
    if let Some(ref path) = config.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(SessionError::Launch)
}

/// Drive the protocol handler until the connection drops, then flag the
/// session as closed.
fn spawn_handler(mut handler: Handler, closed: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                trace!(error = %e, "browser handler event error");
            }
        }
        closed.store(true, Ordering::SeqCst);
        debug!("browser connection closed");
    })
}

/// Open the working tab with the fingerprint and resource filter applied.
async fn prepare_page(
    browser: &Browser,
    fingerprint: &Fingerprint,
) -> Result<(Page, JoinHandle<()>), CdpError> {
    let page = browser.new_page("about:blank").await?;

    page.execute(SetUserAgentOverrideParams::new(fingerprint.user_agent.clone()))
        .await?;
    page.execute(SetTimezoneOverrideParams::new(fingerprint.timezone.clone()))
        .await?;
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
        STEALTH_SCRIPT.to_string(),
    ))
    .await?;

    let interceptor = block_heavy_resources(&page).await?;
    Ok((page, interceptor))
}

fn is_heavy(resource: &ResourceType) -> bool {
    matches!(
        resource,
        ResourceType::Image | ResourceType::Font | ResourceType::Media
    )
}

/// Fail image, font and media requests; let everything else through.
async fn block_heavy_resources(page: &Page) -> Result<JoinHandle<()>, CdpError> {
    let mut paused = page.event_listener::<EventRequestPaused>().await?;
    let intercept_page = page.clone();

    let task = tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let reply = if is_heavy(&event.resource_type) {
                intercept_page
                    .execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
            } else {
                intercept_page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ())
            };
            if let Err(e) = reply {
                trace!(error = %e, "request interception reply failed");
            }
        }
    });

    page.execute(
        EnableParams::builder()
            .pattern(RequestPattern::builder().url_pattern("*").build())
            .build(),
    )
    .await?;

    Ok(task)
}

async fn shutdown_browser(browser: &mut Browser) {
    if let Err(e) = browser.close().await {
        warn!(error = %e, "failed to close browser");
    }
    if let Err(e) = browser.wait().await {
        warn!(error = %e, "failed to reap browser process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Route;

    #[test]
    fn heavy_resources() {
        assert!(is_heavy(&ResourceType::Image));
        assert!(is_heavy(&ResourceType::Font));
        assert!(is_heavy(&ResourceType::Media));
        assert!(!is_heavy(&ResourceType::Document));
        assert!(!is_heavy(&ResourceType::Script));
        assert!(!is_heavy(&ResourceType::Xhr));
    }

    #[test]
    fn only_the_first_list_load_waits_for_cookies() {
        assert!(ListLoad::Initial.dismisses_cookie_prompt());
        assert!(!ListLoad::Reload.dismisses_cookie_prompt());
    }

    #[tokio::test]
    #[ignore] // Requires Chrome/Chromium installed and network access
    async fn loads_live_results_list() {
        let target = RouteDate::new(
            Route::new("Stockholm C", "Göteborg C"),
            chrono::Local::now().date_naive() + chrono::Days::new(7),
        );
        let launcher = ChromiumLauncher::new(SessionConfig::default());
        let mut session = launcher.open(&target).await.unwrap();
        let markup = session.list_markup().await.unwrap();
        session.close().await;

        let candidates = crate::extract::extract_candidates(&markup);
        assert!(!candidates.is_empty(), "expected departures on the live list");
    }
}
