//! HTTP route handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::domain::{ScrapeResult, ValidationError};
use crate::scrape::{EventSink, ScrapeEvent};

use super::dto::*;
use super::state::AppState;

/// Events buffered between a running scrape and a slow stream consumer.
const EVENT_BUFFER: usize = 64;

const SCRAPE_FAILED: &str = "Failed to scrape train data";

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/scrape", get(scrape))
        .route("/api/scrape-stream", get(scrape_stream))
        .route("/api/abort-scrape", post(abort_scrape))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Scrape a route and date, answering once the run is done.
async fn scrape(
    State(state): State<AppState>,
    Query(query): Query<ScrapeQuery>,
) -> Result<Json<ScrapeResult>, AppError> {
    let target = query.route_date()?;
    let options = query.options(state.environment.is_local());

    let result = state
        .scraper
        .scrape(&target, &options, &EventSink::discard())
        .await
        .map_err(|e| {
            error!(%target, error = %e, "scrape failed");
            AppError::Internal {
                message: SCRAPE_FAILED.to_string(),
            }
        })?;

    Ok(Json(result))
}

/// Scrape a route and date, streaming progress as server-sent events.
///
/// Each event is one JSON [`ScrapeEvent`]; the stream ends after the
/// `complete` or `error` event.
async fn scrape_stream(
    State(state): State<AppState>,
    Query(query): Query<ScrapeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let target = query.route_date()?;
    let options = query.options(state.environment.is_local());
    let (sink, mut rx) = EventSink::channel(EVENT_BUFFER);
    let scraper = Arc::clone(&state.scraper);

    // Runs to completion even if the client goes away, so the cache still
    // gets warmed.
    tokio::spawn(async move {
        let last = match scraper.scrape(&target, &options, &sink).await {
            Ok(data) => ScrapeEvent::Complete { data },
            Err(e) => {
                error!(%target, error = %e, "streaming scrape failed");
                ScrapeEvent::Error {
                    message: e.to_string(),
                }
            }
        };
        sink.emit(last).await;
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            match Event::default().json_data(&event) {
                Ok(sse) => yield Ok(sse),
                Err(e) => warn!(error = %e, "failed to encode scrape event"),
            }
            if terminal {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Ask a running scrape for this route and date to stop.
async fn abort_scrape(
    State(state): State<AppState>,
    Query(query): Query<ScrapeQuery>,
) -> Result<Json<AbortResponse>, AppError> {
    if !state.environment.is_local() {
        return Err(AppError::Forbidden {
            message: "Abort functionality is only available in local environment".to_string(),
        });
    }
    let target = query.route_date()?;

    state.abort.signal(&target).await.map_err(|e| {
        error!(%target, error = %e, "failed to set abort signal");
        AppError::Internal {
            message: "Failed to set abort signal".to_string(),
        }
    })?;
    info!(%target, "abort signal set");

    Ok(Json(AbortResponse {
        success: true,
        message: "Abort signal sent. Scraper will stop after current departure.".to_string(),
    }))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Forbidden { message: String },
    Internal { message: String },
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::BadRequest {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Forbidden { message } => (StatusCode::FORBIDDEN, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            warn!(%status, %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
