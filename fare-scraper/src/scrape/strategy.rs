//! Where detail pages come from.
//!
//! The orchestrator asks a [`DetailSource`] for one detail page per uncached
//! departure. [`SharedSession`] walks every departure in the session that
//! loaded the list and rotates it under the rate limit, just before the
//! first visit past the threshold; [`IsolatedSessions`] opens and discards a
//! fresh session per departure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::{Candidate, RouteDate};
use crate::session::{DetailPage, RotationPolicy, ScrapeSession, SessionError, SessionLauncher};

#[async_trait]
pub trait DetailSource: Send {
    /// Reach the detail page for `candidate` and read it.
    async fn visit(&mut self, candidate: &Candidate) -> Result<DetailPage, SessionError>;

    /// Prepare for the next visit after one finished, successfully or not.
    async fn after_visit(&mut self, more_remaining: bool) -> Result<(), SessionError>;

    /// Sessions replaced so far.
    fn rotations(&self) -> usize;

    async fn close(self: Box<Self>);
}

/// Click into a detail page, reloading the list and retrying once if the
/// first attempt fails in a way the session survives.
async fn navigate_with_retry(
    session: &mut dyn ScrapeSession,
    departure_time: &str,
    retry_pause: Duration,
) -> Result<(), SessionError> {
    match session.navigate_to_detail(departure_time).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_recoverable() => {
            warn!(departure = %departure_time, error = %e, "detail navigation failed, retrying");
            tokio::time::sleep(retry_pause).await;
            session.return_to_list().await?;
            session.navigate_to_detail(departure_time).await
        }
        Err(e) => Err(e),
    }
}

/// One session for the whole list, replaced every few visits.
pub struct SharedSession {
    launcher: Arc<dyn SessionLauncher>,
    target: RouteDate,
    session: Option<Box<dyn ScrapeSession>>,
    rotation: RotationPolicy,
    cooldown: Duration,
    retry_pause: Duration,
    rotations: usize,
    /// Replace the session before it is next used.
    rotation_due: bool,
}

impl SharedSession {
    /// Take over `session`, which already has the list loaded.
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        target: RouteDate,
        session: Box<dyn ScrapeSession>,
        rotation: RotationPolicy,
        cooldown: Duration,
        retry_pause: Duration,
    ) -> Self {
        Self {
            launcher,
            target,
            session: Some(session),
            rotation,
            cooldown,
            retry_pause,
            rotations: 0,
            rotation_due: false,
        }
    }

    async fn rotate(&mut self) -> Result<(), SessionError> {
        info!(
            route = %self.target.route,
            visits = self.rotation.visits(),
            "rotating browser session"
        );
        if let Some(old) = self.session.take() {
            old.close().await;
        }
        tokio::time::sleep(self.cooldown).await;

        self.session = Some(self.launcher.open(&self.target).await?);
        self.rotation.reset();
        self.rotations += 1;
        self.rotation_due = false;
        Ok(())
    }
}

#[async_trait]
impl DetailSource for SharedSession {
    async fn visit(&mut self, candidate: &Candidate) -> Result<DetailPage, SessionError> {
        if self.rotation_due {
            self.rotate().await?;
        }
        let session = self.session.as_deref_mut().ok_or(SessionError::Closed)?;
        navigate_with_retry(session, &candidate.departure_time, self.retry_pause).await?;
        let page = session.detail_page().await?;
        self.rotation.record_visit();
        Ok(page)
    }

    async fn after_visit(&mut self, more_remaining: bool) -> Result<(), SessionError> {
        if !more_remaining {
            return Ok(());
        }
        // Deferred until a departure actually needs the browser; the rest
        // of the list may be cached, or the run aborted.
        if self.rotation.should_rotate(more_remaining) {
            self.rotation_due = true;
            return Ok(());
        }

        let session = self.session.as_deref_mut().ok_or(SessionError::Closed)?;
        match session.return_to_list().await {
            Ok(()) => Ok(()),
            // The next navigation reloads the list on its retry path.
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "failed to return to results list");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn rotations(&self) -> usize {
        self.rotations
    }

    async fn close(self: Box<Self>) {
        if let Some(session) = self.session {
            session.close().await;
        }
    }
}

/// A new, independently fingerprinted session for every visit.
pub struct IsolatedSessions {
    launcher: Arc<dyn SessionLauncher>,
    target: RouteDate,
    retry_pause: Duration,
}

impl IsolatedSessions {
    pub fn new(launcher: Arc<dyn SessionLauncher>, target: RouteDate, retry_pause: Duration) -> Self {
        Self {
            launcher,
            target,
            retry_pause,
        }
    }
}

#[async_trait]
impl DetailSource for IsolatedSessions {
    async fn visit(&mut self, candidate: &Candidate) -> Result<DetailPage, SessionError> {
        let mut session = self.launcher.open(&self.target).await?;
        debug!(departure = %candidate.departure_time, "opened isolated session");

        let result = match navigate_with_retry(
            session.as_mut(),
            &candidate.departure_time,
            self.retry_pause,
        )
        .await
        {
            Ok(()) => session.detail_page().await,
            Err(e) => Err(e),
        };

        session.close().await;
        result
    }

    async fn after_visit(&mut self, _more_remaining: bool) -> Result<(), SessionError> {
        Ok(())
    }

    fn rotations(&self) -> usize {
        0
    }

    async fn close(self: Box<Self>) {}
}
