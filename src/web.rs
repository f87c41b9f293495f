use actix_files::Files;
use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, Result};
use rand::Rng;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::ScheduleError;
use crate::export::{generate_ics, ics_filename};
use crate::schedule::types::{LogEntry, ScheduleDoc, SelectedUser, ShiftEntry, ShiftOverride};
use crate::schedule::ParserConfig;
use crate::state::AppModel;
use crate::storage::LocalStore;
use crate::store::{JsonFileStore, ScheduleStore};

pub struct AppState {
    pub model: Mutex<AppModel>,
    pub store: Arc<dyn ScheduleStore + Send + Sync>,
    pub local: LocalStore,
    pub parser: ParserConfig,
    pub admin_password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Deserialize)]
pub struct UploadQuery {
    name: String,
}

#[derive(Deserialize)]
pub struct SelectUserRequest {
    id: String,
}

#[derive(Deserialize)]
pub struct OverrideRequest {
    student_id: String,
    date: String,
    code: Option<String>,
    hospital: Option<String>,
    color: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkEditRequest {
    start_date: String,
    end_date: String,
    hospital: String,
    student_ids: Option<Vec<String>>,
}

// Older clients posted the document list bare; newer ones wrap it with an
// audit entry
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SaveScheduleRequest {
    Tagged {
        schedule_data: Vec<ScheduleDoc>,
        #[serde(default)]
        log_entry: Option<LogEntry>,
    },
    Legacy(Vec<ScheduleDoc>),
}

fn is_admin(session: &Session) -> bool {
    session.get::<bool>("admin").ok().flatten().unwrap_or(false)
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized()
        .json(serde_json::json!({"success": false, "error": "Unauthorized"}))
}

fn internal_error(e: ScheduleError) -> actix_web::Error {
    actix_web::error::ErrorInternalServerError(e.to_string())
}

// Admin login endpoint
async fn admin_login(
    req: web::Json<LoginRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if req.password == state.admin_password {
        session.insert("admin", true)?;
        Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
    } else {
        Ok(HttpResponse::Unauthorized()
            .json(serde_json::json!({"success": false, "error": "Invalid password"})))
    }
}

// Schedule upload endpoint; body is the raw file, name comes as a query
// parameter so the extension can pick the decoder
async fn admin_upload(
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    // Accept the session flag or a password header for scripted uploads
    let header_password = req
        .headers()
        .get("X-Admin-Password")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !is_admin(&session) && header_password != state.admin_password {
        return Ok(unauthorized());
    }

    let mut model = state.model.lock().unwrap();
    match model.ingest_upload(&query.name, &body, &state.parser) {
        Ok(count) => {
            if let Err(e) = state.local.set_cached_roster(model.roster()) {
                log::warn!("failed to cache parsed roster: {}", e);
            }
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "students": count
            })))
        }
        Err(e) => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": format!("Failed to process schedule: {}", e)
        }))),
    }
}

// Merged roster
async fn get_students(state: web::Data<AppState>) -> Result<HttpResponse> {
    let model = state.model.lock().unwrap();
    let roster = model.roster();
    if roster.total_students == 0 {
        return Ok(
            HttpResponse::NotFound().json(serde_json::json!({"error": "No schedule loaded"}))
        );
    }
    Ok(HttpResponse::Ok().json(roster))
}

// One student's merged schedule
async fn get_schedule(
    id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let model = state.model.lock().unwrap();
    match model.roster().students.iter().find(|s| s.id == *id) {
        Some(student) => Ok(HttpResponse::Ok().json(student)),
        None => {
            Ok(HttpResponse::NotFound().json(serde_json::json!({"error": "Student not found"})))
        }
    }
}

async fn get_user(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.local.selected_user().map_err(internal_error)? {
        Some(user) => Ok(HttpResponse::Ok().json(user)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({"error": "No user selected"}))),
    }
}

async fn select_user(
    req: web::Json<SelectUserRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let model = state.model.lock().unwrap();
    let user = match model.roster().students.iter().find(|s| s.id == req.id) {
        Some(student) => SelectedUser {
            id: student.id.clone(),
            name: student.full_name.clone(),
            display_name: student.display_name.clone(),
        },
        None => {
            return Ok(
                HttpResponse::NotFound().json(serde_json::json!({"error": "Student not found"}))
            )
        }
    };
    state.local.set_selected_user(&user).map_err(internal_error)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "user": user})))
}

async fn clear_user(state: web::Data<AppState>) -> Result<HttpResponse> {
    state.local.clear_selected_user().map_err(internal_error)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

// Single-cell override: applied locally first, then pushed to the store.
// A failed store write keeps the local edit and reports the failure.
async fn post_override(
    req: web::Json<OverrideRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&session) {
        return Ok(unauthorized());
    }

    let mut model = state.model.lock().unwrap();
    model.apply_override(
        &req.student_id,
        &req.date,
        ShiftOverride {
            code: req.code.clone(),
            hospital: req.hospital.clone(),
            color: req.color.clone(),
        },
    );
    if let Err(e) = state.local.set_overrides(model.overrides()) {
        log::warn!("failed to persist overrides: {}", e);
    }

    // Push the merged cell to the store; absent dates have nothing to push
    let merged = model
        .roster()
        .students
        .iter()
        .find(|s| s.id == req.student_id)
        .and_then(|s| s.schedule.get(&req.date))
        .map(|record| ShiftEntry::new(record.code.clone(), record.hospital.clone()));
    let remote_saved = match merged {
        Some(entry) => match state.store.set_shift(&req.student_id, &req.date, entry) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("{}", ScheduleError::RemoteWrite(e.to_string()));
                false
            }
        },
        None => false,
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "remote_saved": remote_saved
    })))
}

async fn bulk_edit(
    req: web::Json<BulkEditRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&session) {
        return Ok(unauthorized());
    }

    let mut model = state.model.lock().unwrap();
    match model.apply_bulk(
        &req.start_date,
        &req.end_date,
        &req.hospital,
        req.student_ids.as_deref(),
    ) {
        Ok((students, days)) => {
            if let Err(e) = state.local.set_overrides(model.overrides()) {
                log::warn!("failed to persist overrides: {}", e);
            }
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "students": students,
                "days": days
            })))
        }
        Err(e) => Ok(HttpResponse::BadRequest()
            .json(serde_json::json!({"success": false, "error": e.to_string()}))),
    }
}

// Full roster replace with an audit entry
async fn save_schedule(
    req: web::Json<SaveScheduleRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&session) {
        return Ok(unauthorized());
    }

    let (docs, log_entry) = match req.into_inner() {
        SaveScheduleRequest::Tagged { schedule_data, log_entry } => (schedule_data, log_entry),
        SaveScheduleRequest::Legacy(docs) => (docs, None),
    };
    let log_entry = log_entry.map(|mut entry| {
        if entry.timestamp.is_empty() {
            entry.timestamp = chrono::Utc::now().to_rfc3339();
        }
        entry
    });

    match state.store.replace_all(&docs, log_entry) {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Schedule and log saved successfully"
        }))),
        Err(e) => Ok(HttpResponse::InternalServerError()
            .json(serde_json::json!({"success": false, "error": e.to_string()}))),
    }
}

async fn get_changelog(state: web::Data<AppState>) -> Result<HttpResponse> {
    let entries = state.store.changelog().map_err(internal_error)?;
    Ok(HttpResponse::Ok().json(entries))
}

// Calendar download for one student
async fn export_ics(id: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let model = state.model.lock().unwrap();
    match model.roster().students.iter().find(|s| s.id == *id) {
        Some(student) => {
            let ics = generate_ics(&student.full_name, &student.schedule);
            Ok(HttpResponse::Ok()
                .content_type("text/calendar; charset=utf-8")
                .insert_header((
                    "Content-Disposition",
                    format!("attachment; filename=\"{}\"", ics_filename(&student.full_name)),
                ))
                .body(ics))
        }
        None => {
            Ok(HttpResponse::NotFound().json(serde_json::json!({"error": "Student not found"})))
        }
    }
}

// Clears local keys and overrides, then reloads the base from the store
async fn reset(session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !is_admin(&session) {
        return Ok(unauthorized());
    }

    state.local.clear_all().map_err(internal_error)?;
    let mut model = state.model.lock().unwrap();
    model.clear_overrides();
    match state.store.load_all() {
        Ok(docs) => model.apply_base_docs(&docs),
        Err(e) => log::warn!("failed to reload schedule after reset: {}", e),
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

// HTML shell
async fn index() -> Result<HttpResponse> {
    let html = include_str!("../templates/index.html");
    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

// Reloads the model whenever another writer bumps the store revision
fn spawn_store_refresh(state: web::Data<AppState>) {
    let mut rx = state.store.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            match state.store.load_all() {
                Ok(docs) => {
                    let mut model = state.model.lock().unwrap();
                    model.apply_base_docs(&docs);
                    log::info!("reloaded {} schedule documents from the store", docs.len());
                }
                Err(e) => log::warn!("store refresh failed: {}", e),
            }
        }
    });
}

pub async fn start_server(
    port: u16,
    admin_password: String,
    data_dir: &str,
) -> std::io::Result<()> {
    let to_io = |e: ScheduleError| std::io::Error::new(std::io::ErrorKind::Other, e.to_string());

    let store: Arc<dyn ScheduleStore + Send + Sync> =
        Arc::new(JsonFileStore::new(data_dir).map_err(to_io)?);
    let local = LocalStore::new(Path::new(data_dir).join("local")).map_err(to_io)?;

    // Hydrate from the store, falling back to the last parsed roster
    let mut model = AppModel::new();
    match store.load_all() {
        Ok(docs) if !docs.is_empty() => model.apply_base_docs(&docs),
        Ok(_) => {
            if let Ok(Some(roster)) = local.cached_roster() {
                model.apply_base_roster(roster.students);
            }
        }
        Err(e) => log::warn!("failed to load schedule store: {}", e),
    }
    match local.overrides() {
        Ok(overrides) => model.set_overrides(overrides),
        Err(e) => log::warn!("failed to load saved overrides: {}", e),
    }

    let mut key_bytes = [0u8; 64];
    rand::thread_rng().fill(&mut key_bytes[..]);
    let session_key = Key::from(&key_bytes);

    let app_state = web::Data::new(AppState {
        model: Mutex::new(model),
        store,
        local,
        parser: ParserConfig::default(),
        admin_password,
    });

    spawn_store_refresh(app_state.clone());

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
                    .cookie_secure(false)
                    .build(),
            )
            .service(Files::new("/static", "static"))
            .route("/", web::get().to(index))
            .route("/api/login", web::post().to(admin_login))
            .route("/api/upload", web::post().to(admin_upload))
            .route("/api/students", web::get().to(get_students))
            .service(
                web::resource("/api/user")
                    .route(web::get().to(get_user))
                    .route(web::post().to(select_user))
                    .route(web::delete().to(clear_user)),
            )
            .route("/api/override", web::post().to(post_override))
            .route("/api/bulk-edit", web::post().to(bulk_edit))
            .route("/api/save-schedule", web::post().to(save_schedule))
            .route("/api/changelog", web::get().to(get_changelog))
            .route("/api/reset", web::post().to(reset))
            .service(web::resource("/api/schedule/{id}").route(web::get().to(get_schedule)))
            .service(web::resource("/api/export/{id}").route(web::get().to(export_ics)))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
