use actix_web::{web, App, HttpServer, HttpResponse, Result, middleware};
use actix_files::Files;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info};

use crate::config::Config;
use crate::display::preview_text;
use crate::error::ImportError;
use crate::export::export_payload;
use crate::import::ImportSession;
use crate::parser::{PayloadOrigin, RawPayload};
use crate::schedule::{Course, EntryRejection, TimeSlot};
use crate::store::{ScheduleDocument, ScheduleStore};

/// Shared server state. The session mutex serializes imports, so only one
/// preview can wait for confirmation at a time.
pub struct AppState {
    pub store: Box<dyn ScheduleStore>,
    pub session: Mutex<ImportSession>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Box<dyn ScheduleStore>, config: Config) -> Self {
        AppState {
            store,
            session: Mutex::new(ImportSession::new(config.display_slot_count)),
            config,
        }
    }

    fn session(&self) -> Result<MutexGuard<'_, ImportSession>> {
        self.session
            .lock()
            .map_err(|_| actix_web::error::ErrorInternalServerError("import session lock poisoned"))
    }
}

#[derive(Deserialize)]
pub struct PreviewQuery {
    origin: Option<PayloadOrigin>,
}

/// A preview still waiting for confirmation, so a reloaded page can offer it again
#[derive(Serialize)]
pub struct PendingPreview {
    preview: String,
    commit_allowed: bool,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    days: Vec<&'static str>,
    time_slots: Vec<TimeSlot>,
    entries: BTreeMap<String, Vec<Course>>,
    placements: usize,
    pending: Option<PendingPreview>,
}

#[derive(Serialize)]
pub struct PreviewResponse {
    success: bool,
    placed: usize,
    ignored: usize,
    max_slot_seen: Option<u32>,
    truncated: bool,
    commit_allowed: bool,
    preview: String,
    rejections: Vec<EntryRejection>,
    entries: BTreeMap<String, Vec<Course>>,
}

/// Maps an import failure onto a JSON error response
fn import_error_response(e: &ImportError) -> HttpResponse {
    let body = json!({"success": false, "error": e.to_string()});
    match e {
        ImportError::PayloadNotParseable | ImportError::SchemaInvalid(_) => HttpResponse::BadRequest().json(body),
        ImportError::ImportPending | ImportError::NothingToCommit | ImportError::CommitNotAllowed => {
            HttpResponse::Conflict().json(body)
        }
        ImportError::Store(_) => {
            error!("Storage failure: {}", e);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

// Current schedule endpoint
async fn get_schedule(state: web::Data<AppState>) -> Result<HttpResponse> {
    let schedule = state.store.load();
    let slot_count = state.config.display_slot_count;
    let pending = state.session()?.pending().map(|reconciliation| PendingPreview {
        preview: preview_text(reconciliation, slot_count),
        commit_allowed: reconciliation.commit_allowed(),
    });

    Ok(HttpResponse::Ok().json(ScheduleResponse {
        days: vec!["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
        time_slots: state.config.time_slots(),
        placements: schedule.placements(),
        entries: ScheduleDocument::from_schedule(&schedule).entries,
        pending,
    }))
}

// First phase of an import: reconcile without touching the store
async fn import_preview(
    query: web::Query<PreviewQuery>,
    body: String,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let payload = RawPayload {
        text: body,
        origin: query.origin.unwrap_or(PayloadOrigin::Pasted),
    };
    let slot_count = state.config.display_slot_count;

    let mut session = state.session()?;
    let reconciliation = match session.preview(&payload) {
        Ok(reconciliation) => reconciliation,
        Err(e) => return Ok(import_error_response(&e)),
    };

    Ok(HttpResponse::Ok().json(PreviewResponse {
        success: true,
        placed: reconciliation.placed,
        ignored: reconciliation.ignored,
        max_slot_seen: reconciliation.max_slot_seen,
        truncated: reconciliation.truncated(slot_count),
        commit_allowed: reconciliation.commit_allowed(),
        preview: preview_text(reconciliation, slot_count),
        rejections: reconciliation.rejections.clone(),
        entries: ScheduleDocument::from_schedule(&reconciliation.schedule).entries,
    }))
}

// Second phase: replace the stored schedule with the pending one
async fn import_commit(state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut session = state.session()?;
    match session.commit(state.store.as_ref()) {
        Ok(schedule) => {
            info!("Committed import with {} placements", schedule.placements());
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "placements": schedule.placements()
            })))
        }
        Err(e) => {
            // A preview that may never be committed would block every later one
            if matches!(e, ImportError::CommitNotAllowed) {
                session.cancel().ok();
            }
            Ok(import_error_response(&e))
        }
    }
}

async fn import_cancel(state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut session = state.session()?;
    match session.cancel() {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({"success": true}))),
        Err(e) => Ok(import_error_response(&e)),
    }
}

async fn clear_schedule(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.store.clear() {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({"success": true}))),
        Err(e) => Ok(import_error_response(&ImportError::Store(e))),
    }
}

// Importable payload of the current schedule
async fn export_schedule(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(export_payload(&state.store.load())))
}

// HTML page handler
async fn index() -> Result<HttpResponse> {
    let html = include_str!("../templates/index.html");
    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

/// Registers the page and API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/api/schedule", web::get().to(get_schedule))
        .route("/api/import/preview", web::post().to(import_preview))
        .route("/api/import/commit", web::post().to(import_commit))
        .route("/api/import/cancel", web::post().to(import_cancel))
        .route("/api/clear", web::post().to(clear_schedule))
        .route("/api/export", web::get().to(export_schedule));
}

pub async fn start_server(port: u16, store: Box<dyn ScheduleStore>, config: Config) -> std::io::Result<()> {
    let app_state = web::Data::new(AppState::new(store, config));

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", "static"))
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
