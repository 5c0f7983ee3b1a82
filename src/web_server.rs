use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Form, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::constants::{COMPLETED_TASKS_FILE, ROADMAP_FILE, SESSION_COOKIE};
use crate::error::RoadmapError;
use crate::llm_interaction::RoadmapService;
use crate::progress::{export_roadmap_bytes, ProgressStore, ROADMAP_MIME};
use crate::roadmap::{Progress, RoadmapModel};
use crate::session::{Notice, Session, SessionHandle, SessionStore};

// Shared application state. Per-client data lives in `sessions`.
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    sessions: SessionStore,
    service: Arc<RoadmapService>,
    store: ProgressStore,
    static_dir: PathBuf,
}

impl AppState {
    pub fn new(
        templates_dir: impl Into<PathBuf>,
        static_dir: impl Into<PathBuf>,
        service: RoadmapService,
        store: ProgressStore,
    ) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir.into())),
            sessions: SessionStore::new(),
            service: Arc::new(service),
            store,
            static_dir: static_dir.into(),
        }
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: PathBuf) -> AutoReloader {
    // Use AutoReloader for development convenience
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

#[derive(Deserialize)]
struct ApiKeyForm {
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateForm {
    idea: String,
    #[serde(default)]
    tools_choice: Option<String>,
    #[serde(default)]
    tools: Option<String>,
}

#[derive(Deserialize)]
struct ToggleForm {
    task_id: String,
    done: bool,
}

#[derive(Serialize)]
struct TaskView {
    id: String,
    text: String,
    done: bool,
}

#[derive(Serialize)]
struct SubmoduleView {
    name: String,
    tools: Vec<String>,
    dependencies: Vec<String>,
    tasks: Vec<TaskView>,
}

#[derive(Serialize)]
struct ModuleView {
    name: String,
    dependencies: Vec<String>,
    submodules: Vec<SubmoduleView>,
}

#[derive(Serialize)]
struct RoadmapSnapshot<'a> {
    roadmap: Option<&'a serde_json::Value>,
    completed: std::collections::BTreeMap<String, bool>,
    progress: Progress,
}

fn roadmap_view(model: &RoadmapModel) -> Vec<ModuleView> {
    let Some(roadmap) = model.roadmap() else {
        return Vec::new();
    };

    let mut modules: Vec<ModuleView> = roadmap
        .modules
        .iter()
        .map(|m| ModuleView {
            name: m.module.clone(),
            dependencies: m.dependencies.clone(),
            submodules: m
                .submodules
                .iter()
                .map(|s| SubmoduleView {
                    name: s.submodule_name.clone(),
                    tools: s.tools.clone(),
                    dependencies: s.dependencies.clone(),
                    tasks: Vec::new(),
                })
                .collect(),
        })
        .collect();

    for task in roadmap.tasks() {
        modules[task.module].submodules[task.submodule]
            .tasks
            .push(TaskView {
                done: model.completion().is_done(task.id.as_str()),
                id: task.id.to_string(),
                text: task.text.to_string(),
            });
    }
    modules
}

fn session_id_from(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

fn session_cookie(id: Uuid) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

async fn session_for(state: &AppState, headers: &HeaderMap) -> (Uuid, SessionHandle) {
    state.sessions.get_or_create(session_id_from(headers)).await
}

fn with_cookie(id: Uuid, response: impl IntoResponse) -> Response {
    ([(header::SET_COOKIE, session_cookie(id))], response).into_response()
}

fn redirect_home(id: Uuid) -> Response {
    with_cookie(id, Redirect::to("/"))
}

fn report(session: &mut Session, err: &RoadmapError) {
    warn!(error = %err, "Action failed");
    let detail = match err {
        RoadmapError::MalformedRoadmap { candidate, .. } => Some(candidate.clone()),
        _ => None,
    };
    session.error_with_detail(err.to_string(), detail);
}

async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, handle) = session_for(&state, &headers).await;
    let mut session = handle.lock().await;

    session.model.ensure_flags();
    let notice: Option<Notice> = session.take_notice();
    let roadmap_json = session
        .model
        .document()
        .map(|doc| String::from_utf8_lossy(&export_roadmap_bytes(doc)).into_owned());
    let has_api_key = session.api_key.is_some() || state.service.has_env_api_key();

    let rendered = state.templates.acquire_env().and_then(|env| {
        env.get_template("index.html").and_then(|tmpl| {
            let context = minijinja::context! {
                title => "AI Project Task Manager",
                notice => notice,
                has_api_key => has_api_key,
                idea => &session.last_idea,
                tools => &session.last_tools,
                modules => roadmap_view(&session.model),
                progress => session.model.progress(),
                roadmap_json => roadmap_json,
                progress_file => COMPLETED_TASKS_FILE,
            };
            tmpl.render(context)
        })
    });

    match rendered {
        Ok(html) => with_cookie(id, Html(html)),
        Err(e) => {
            error!("Failed to get or render template: {}", e);
            with_cookie(
                id,
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(format!("Internal Server Error: {}", e)),
                ),
            )
        }
    }
}

async fn api_key_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ApiKeyForm>,
) -> Response {
    let (id, handle) = session_for(&state, &headers).await;
    let mut session = handle.lock().await;

    let key = form.api_key.trim();
    if key.is_empty() {
        session.error("Please enter a valid API key!");
    } else {
        session.api_key = Some(key.to_string());
        session.success("API key submitted successfully!");
        info!(session = %id, "API key stored for session");
    }
    redirect_home(id)
}

async fn generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<GenerateForm>,
) -> Response {
    let (id, handle) = session_for(&state, &headers).await;
    // Held across the completion call: one action at a time per session.
    let mut session = handle.lock().await;

    let tools = match form.tools_choice.as_deref() {
        Some("yes") => form.tools.filter(|t| !t.trim().is_empty()),
        _ => None,
    };
    session.last_idea = form.idea.clone();
    session.last_tools = tools.clone();

    info!(session = %id, "Generating roadmap");
    let result = state
        .service
        .generate(session.api_key.as_deref(), &form.idea, tools.as_deref())
        .await;

    match result {
        Ok(parsed) => {
            let saved = state.store.save_roadmap(&parsed.document);
            let collisions = parsed.roadmap.collisions().len();
            session.model.load(parsed);
            match saved {
                Ok(_) if collisions > 0 => session.success(format!(
                    "Roadmap generated successfully! {collisions} task id(s) repeat because of \
                     duplicate module/submodule names; the repeats were given #N suffixes."
                )),
                Ok(_) => session.success("Roadmap generated successfully!"),
                Err(e) => report(&mut session, &e),
            }
        }
        Err(e) => report(&mut session, &e),
    }
    redirect_home(id)
}

async fn toggle_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ToggleForm>,
) -> Response {
    let (id, handle) = session_for(&state, &headers).await;
    handle.lock().await.model.toggle(form.task_id, form.done);
    redirect_home(id)
}

async fn save_progress_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, handle) = session_for(&state, &headers).await;
    let mut session = handle.lock().await;

    match state.store.save_progress(&session.model.completed_subset()) {
        Ok(_) => session.success(format!("Progress saved to '{}'", COMPLETED_TASKS_FILE)),
        Err(e) => report(&mut session, &e),
    }
    redirect_home(id)
}

async fn download_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, handle) = session_for(&state, &headers).await;
    let session = handle.lock().await;

    let Some(document) = session.model.document() else {
        return with_cookie(id, (StatusCode::NOT_FOUND, "No roadmap generated yet"));
    };
    with_cookie(
        id,
        (
            [
                (header::CONTENT_TYPE, ROADMAP_MIME.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", ROADMAP_FILE),
                ),
            ],
            export_roadmap_bytes(document),
        ),
    )
}

async fn roadmap_api_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, handle) = session_for(&state, &headers).await;
    let session = handle.lock().await;

    let snapshot = RoadmapSnapshot {
        roadmap: session.model.document(),
        completed: session.model.completed_subset(),
        progress: session.model.progress(),
    };
    with_cookie(id, Json(snapshot))
}

pub fn create_router(state: AppState) -> Router {
    // Serve static files from the configured directory
    let static_files_service = ServeDir::new(&state.static_dir).not_found_service(
        tower::service_fn(|_req: axum::extract::Request| async {
            Ok::<_, std::convert::Infallible>((StatusCode::NOT_FOUND, Body::from("Not Found")).into_response())
        }),
    );

    Router::new()
        .route("/", get(index_handler))
        .route("/api-key", post(api_key_handler))
        .route("/generate", post(generate_handler))
        .route("/tasks/toggle", post(toggle_handler))
        .route("/progress/save", post(save_progress_handler))
        .route("/roadmap.json", get(download_handler))
        .route("/api/roadmap", get(roadmap_api_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(port: u16, state: AppState) -> Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    // Bind using tokio::net::TcpListener
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
