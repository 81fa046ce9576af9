use crate::config::Config;
use crate::domain::{is_direct_link, Review, Suggestion};
use crate::error::ScraperError;
use crate::infrastructure::{
    export_bytes, export_filename, BrowserSession, BrowserSettings, ExportFormat, HeaderSet,
};
use crate::services::{
    LoadOutcome, Progress, ReviewAnalytics, ScrapeRequest, ScrapingService, SearchOutcome,
};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

const SESSION_COOKIE: &str = "mrs_session";
const INDEX_HTML: &str = include_str!("../../static/index.html");
const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct WebSession {
    suggestions: Vec<Suggestion>,
    reviews: Vec<Review>,
    last_seen: Instant,
}

impl WebSession {
    fn new(now: Instant) -> Self {
        Self {
            suggestions: Vec::new(),
            reviews: Vec::new(),
            last_seen: now,
        }
    }
}

/// Drops sessions idle for longer than `ttl`.
fn prune_sessions(sessions: &mut HashMap<Uuid, WebSession>, now: Instant, ttl: Duration) {
    let before = sessions.len();
    sessions.retain(|_, s| now.saturating_duration_since(s.last_seen) <= ttl);
    if sessions.len() < before {
        debug!("Dropped {} idle sessions", before - sessions.len());
    }
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<ScrapingService>,
    browser: BrowserSettings,
    sessions: Arc<Mutex<HashMap<Uuid, WebSession>>>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            service: Arc::new(ScrapingService::new(config.locators.clone(), config.scrape)),
            browser: config.browser.clone(),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs `f` on the session for `id`, creating it if needed. Idle
    /// sessions are pruned on every access.
    async fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&mut WebSession) -> R) -> R {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        prune_sessions(&mut sessions, now, SESSION_TTL);
        let session = sessions.entry(id).or_insert_with(|| WebSession::new(now));
        session.last_seen = now;
        f(session)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/search", post(search))
        .route("/api/scrape", post(scrape))
        .route("/api/reviews", get(reviews))
        .route("/api/export/{format}", get(export))
        .with_state(state)
}

pub async fn serve(config: &Config, bind: SocketAddr) -> crate::error::Result<()> {
    let app = router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonError {
    error: String,
}

pub struct ApiError(ScraperError);

impl ApiError {
    fn as_status_code(&self) -> StatusCode {
        match &self.0 {
            ScraperError::Config(_) => StatusCode::BAD_REQUEST,
            ScraperError::NoMatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScraperError::Launch(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ScraperError> for ApiError {
    fn from(e: ScraperError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("error {}", self.0);
        let status = self.as_status_code();
        (status, Json(JsonError { error: self.0.to_string() })).into_response()
    }
}

/// Reads the session id from the cookie, issuing a new one if absent.
fn session_id(jar: CookieJar) -> (CookieJar, Uuid) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    {
        return (jar, id);
    }

    let id = Uuid::new_v4();
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), id)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Name,
    Url,
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    mode: SearchMode,
    query: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    suggestions: Vec<Suggestion>,
}

async fn search(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SearchBody>,
) -> Result<(CookieJar, Json<SearchResponse>), ApiError> {
    let (jar, id) = session_id(jar);
    let query = body.query.trim().to_string();
    if query.is_empty() {
        return Err(ScraperError::Config("enter a place name or Google Maps link".to_string()).into());
    }

    let outcome = match body.mode {
        SearchMode::Url if !is_direct_link(&query) => {
            return Err(ScraperError::Config("enter a valid Google Maps link".to_string()).into());
        }
        _ if is_direct_link(&query) => SearchOutcome::DirectLink(query.clone()),
        SearchMode::Name | SearchMode::Url => {
            let session = BrowserSession::open(&state.browser).await?;
            let result = state.service.places().search(session.page(), &query).await;
            session.close().await;
            result?
        }
    };

    let suggestions = outcome.suggestions(&query);
    info!("Session {}: {} suggestions for '{}'", id, suggestions.len(), query);
    let stored = suggestions.clone();
    state.with_session(id, |s| s.suggestions = stored).await;

    Ok((jar, Json(SearchResponse { suggestions })))
}

#[derive(Debug, Deserialize)]
pub struct ScrapeBody {
    suggestion_id: usize,
    count: usize,
}

#[derive(Debug, Serialize)]
struct ScrapeResponse {
    reviews: Vec<Review>,
    analytics: ReviewAnalytics,
    load: LoadOutcome,
}

async fn scrape(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<ScrapeBody>,
) -> Result<(CookieJar, Json<ScrapeResponse>), ApiError> {
    let (jar, id) = session_id(jar);
    if body.count < 1 {
        return Err(ScraperError::Config("number of reviews must be positive".to_string()).into());
    }

    let suggestion = state
        .with_session(id, |s| {
            s.suggestions
                .iter()
                .find(|x| x.id == body.suggestion_id)
                .cloned()
        })
        .await
        .ok_or_else(|| ScraperError::Config("search for a place first".to_string()))?;

    let request = ScrapeRequest {
        target: suggestion.target,
        count: body.count,
    };
    let session = BrowserSession::open(&state.browser).await?;
    let result = state
        .service
        .scrape(session.page(), &request, &Progress::silent())
        .await;
    session.close().await;
    let report = result?;

    let reviews = report.reviews.into_vec();
    let analytics = ReviewAnalytics::from_reviews(&reviews);
    let stored = reviews.clone();
    state.with_session(id, |s| s.reviews = stored).await;

    Ok((
        jar,
        Json(ScrapeResponse {
            reviews,
            analytics,
            load: report.load,
        }),
    ))
}

#[derive(Debug, Serialize)]
struct ReviewsResponse {
    reviews: Vec<Review>,
    analytics: ReviewAnalytics,
}

async fn reviews(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ReviewsResponse>) {
    let (jar, id) = session_id(jar);
    let reviews = state.with_session(id, |s| s.reviews.clone()).await;
    let analytics = ReviewAnalytics::from_reviews(&reviews);

    (jar, Json(ReviewsResponse { reviews, analytics }))
}

async fn export(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(format): Path<ExportFormat>,
) -> Result<Response, ApiError> {
    let (jar, id) = session_id(jar);
    let reviews = state.with_session(id, |s| s.reviews.clone()).await;

    if reviews.is_empty() {
        return Err(ScraperError::Config("no reviews to export".to_string()).into());
    }

    let bytes = export_bytes(&reviews, format, HeaderSet::Titled)?;
    let disposition = format!("attachment; filename=\"{}\"", export_filename(format));

    Ok((
        jar,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LocatorConfig, PlaceTarget};
    use crate::services::ScrapeSettings;
    use axum::http::HeaderValue;

    fn state() -> AppState {
        let locators = LocatorConfig::default().compile().unwrap();
        AppState {
            service: Arc::new(ScrapingService::new(
                Arc::new(locators),
                ScrapeSettings::default(),
            )),
            browser: BrowserSettings {
                chrome_path: Some("/nonexistent/chrome".into()),
                ..BrowserSettings::default()
            },
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[test]
    fn reuses_a_valid_session_cookie() {
        let id = Uuid::new_v4();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, id.to_string()));
        let (_, got) = session_id(jar);
        assert_eq!(got, id);
    }

    #[test]
    fn issues_a_cookie_when_missing_or_garbled() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "nope"));
        let (jar, id) = session_id(jar);
        assert_eq!(jar.get(SESSION_COOKIE).unwrap().value(), id.to_string());
    }

    #[test]
    fn errors_map_to_status_codes() {
        let bad = ApiError(ScraperError::Config("x".into())).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            bad.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );

        let launch = ApiError(ScraperError::Launch("no chrome".into())).into_response();
        assert_eq!(launch.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn search_body_modes() {
        let body: SearchBody =
            serde_json::from_str(r#"{"mode":"url","query":"https://maps.app.goo.gl/x"}"#).unwrap();
        assert!(matches!(body.mode, SearchMode::Url));
    }

    #[test]
    fn idle_sessions_are_dropped() {
        let start = Instant::now();
        let mut sessions = HashMap::new();
        let idle = Uuid::new_v4();
        let active = Uuid::new_v4();
        sessions.insert(idle, WebSession::new(start));
        sessions.insert(active, WebSession::new(start + Duration::from_secs(50 * 60)));

        prune_sessions(&mut sessions, start + Duration::from_secs(90 * 60), SESSION_TTL);

        assert!(!sessions.contains_key(&idle));
        assert!(sessions.contains_key(&active));
    }

    #[tokio::test]
    async fn sessions_are_created_and_refreshed_on_access() {
        let state = state();
        let id = Uuid::new_v4();
        state
            .with_session(id, |s| {
                s.reviews.push(Review {
                    id: "r1".into(),
                    name: "Ana".into(),
                    rating: "5".into(),
                    date: "a week ago".into(),
                    text: "Great pour-over".into(),
                })
            })
            .await;
        let first = state.sessions.lock().await[&id].last_seen;

        let count = state.with_session(id, |s| s.reviews.len()).await;
        assert_eq!(count, 1);
        assert!(state.sessions.lock().await[&id].last_seen >= first);
    }

    #[tokio::test]
    async fn zero_count_is_rejected_before_launching_a_browser() {
        let state = state();
        let id = Uuid::new_v4();
        state
            .with_session(id, |s| {
                s.suggestions = vec![Suggestion {
                    id: 0,
                    label: "Blue Bottle".into(),
                    target: PlaceTarget::Link {
                        url: "https://www.google.com/maps/place/Blue+Bottle".into(),
                    },
                }]
            })
            .await;
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, id.to_string()));
        let body = ScrapeBody {
            suggestion_id: 0,
            count: 0,
        };

        let Err(err) = scrape(State(state), jar, Json(body)).await else {
            panic!("expected a rejected request");
        };
        assert!(matches!(err.0, ScraperError::Config(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
