//! HTTP surface: one HTML page plus form posts that drive the session.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use shared::Services;

use crate::page::PageRenderer;
use crate::sessions::{Flash, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
            sessions: SessionStore::default(),
        }
    }

    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SelectForm {
    source: Option<String>,
    voice: Option<String>,
}

#[derive(Serialize)]
struct SourceStatus {
    name: String,
    slug: String,
    feed_url: String,
}

#[derive(Serialize)]
struct VoiceStatus {
    name: String,
    available: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    sources: Vec<SourceStatus>,
    voices: Vec<VoiceStatus>,
    voice_dir: String,
    tts_samples: bool,
    sessions: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/select", post(handle_select))
        .route("/fetch", post(handle_fetch))
        .route("/headlines/{index}/expand", post(handle_expand))
        .route("/headlines/{index}/play", post(handle_play))
        .route("/audio/{index}", get(handle_audio))
        .route("/status", get(handle_status))
        .with_state(state)
}

async fn handle_index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let handle = state.sessions.resolve(&headers, &state.services);
    let html = {
        let mut user = handle.session.lock().await;
        let html = PageRenderer::render(&state.services, &user);
        // Flash and autoplay only apply to the render right after an action
        user.flash = None;
        user.focus = None;
        html
    };
    handle.respond(Html(html))
}

async fn handle_select(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SelectForm>,
) -> Response {
    let handle = state.sessions.resolve(&headers, &state.services);
    {
        let mut user = handle.session.lock().await;
        let mut problems = Vec::new();

        if let Some(source) = form.source.as_deref().filter(|s| !s.is_empty()) {
            if let Err(e) = user.session.select_source(&state.services, source) {
                problems.push(e.to_string());
            }
        }
        if let Some(voice) = form.voice.as_deref().filter(|v| !v.is_empty()) {
            if let Err(e) = user.session.select_voice(&state.services, voice) {
                problems.push(e.to_string());
            }
        }

        user.focus = None;
        user.flash = Some(if problems.is_empty() {
            let source = state
                .services
                .catalog
                .find(user.session.selected_source())
                .map(|s| s.name.clone())
                .unwrap_or_default();
            Flash::info(format!(
                "Reading {} with {}'s voice",
                source,
                user.session.selected_voice()
            ))
        } else {
            Flash::error(problems.join("; "))
        });
    }
    handle.respond(Redirect::to("/"))
}

async fn handle_fetch(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let handle = state.sessions.resolve(&headers, &state.services);
    {
        let mut user = handle.session.lock().await;
        let result = user.session.fetch(&state.services).await;
        user.focus = None;
        user.flash = Some(match result {
            Ok(count) => Flash::success(format!("Successfully fetched {} news items!", count)),
            Err(e) => Flash::error(format!("Error fetching news: {}", e)),
        });
    }
    handle.respond(Redirect::to("/"))
}

async fn handle_expand(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    headers: HeaderMap,
) -> Response {
    let handle = state.sessions.resolve(&headers, &state.services);
    {
        let mut user = handle.session.lock().await;
        let result = user.session.expand(&state.services, index).await.map(|_| ());
        match result {
            Ok(()) => user.focus = Some(index),
            Err(e) => user.flash = Some(Flash::error(e.to_string())),
        }
    }
    handle.respond(Redirect::to(&format!("/#item-{}", index)))
}

async fn handle_play(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    headers: HeaderMap,
) -> Response {
    let handle = state.sessions.resolve(&headers, &state.services);
    {
        let mut user = handle.session.lock().await;
        let result = user.session.play(&state.services, index).await.map(|_| ());
        match result {
            Ok(()) => user.focus = Some(index),
            Err(e @ shared::NewsError::UnknownHeadline(_)) => {
                user.flash = Some(Flash::error(e.to_string()))
            }
            // The session already put the failure on the item itself
            Err(_) => user.focus = Some(index),
        }
    }
    handle.respond(Redirect::to(&format!("/#item-{}", index)))
}

async fn handle_audio(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    headers: HeaderMap,
) -> Response {
    let handle = state.sessions.resolve(&headers, &state.services);
    let wav = {
        let user = handle.session.lock().await;
        user.session
            .entry(index)
            .and_then(|entry| entry.clip.as_ref())
            .map(|clip| clip.wav.clone())
    };

    match wav {
        Some(wav) => handle.respond(([(CONTENT_TYPE, "audio/wav")], wav)),
        None => handle.respond((StatusCode::NOT_FOUND, "No audio for that headline")),
    }
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let services = &state.services;
    Json(StatusResponse {
        sources: services
            .catalog
            .sources()
            .iter()
            .map(|s| SourceStatus {
                name: s.name.clone(),
                slug: s.slug.clone(),
                feed_url: s.feed_url.clone(),
            })
            .collect(),
        voices: services
            .voices
            .profiles()
            .iter()
            .map(|v| VoiceStatus {
                name: v.name.clone(),
                available: v.is_available(),
            })
            .collect(),
        voice_dir: services.voices.dir().display().to_string(),
        tts_samples: services.voices.has_samples(),
        sessions: state.sessions.len(),
    })
}
