// SPDX-License-Identifier: MIT

//! Web UI: gallery, metadata editor, and JSON API

use axum::{
    extract::{Path as UrlPath, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect},
    routing::get,
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::{Catalog, Record};
use crate::gallery::{list_images, GalleryCursor};
use crate::history::History;
use crate::naming::commit_rename;
use crate::search::{prepare_image, suggest_or_empty, Suggestion, SuggestionProvider};
use crate::VisorError;

/// Shared application state
pub struct AppState {
    pub db: Catalog,
    pub config: AppConfig,
    pub provider: Box<dyn SuggestionProvider>,
    pub history: History,
}

impl AppState {
    fn images_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.images_dir)
    }
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let media_dir = state.images_dir();
    Router::new()
        // Pages
        .route("/", get(gallery_page))
        .route("/edit/:filename", get(edit_page).post(save_metadata))
        // API endpoints
        .route("/api/records", get(api_get_records))
        .route("/api/records/:filename", get(api_get_record))
        .route("/api/stats", get(api_get_stats))
        .route("/api/tags", get(api_get_tags))
        // Image files
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// === Page Handlers ===

#[derive(Deserialize)]
struct GalleryQuery {
    #[serde(default)]
    missing: Option<u8>,
}

async fn gallery_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GalleryQuery>,
) -> Result<Html<String>, AppError> {
    let files = list_images(&state.images_dir(), &state.config.extensions)?;
    let catalogued = state.db.filenames()?;

    let mut cursor = GalleryCursor::new(files);
    cursor.set_missing_only(query.missing == Some(1));

    Ok(Html(render_gallery(&cursor, &catalogued)))
}

#[derive(Deserialize)]
struct EditQuery {
    #[serde(default)]
    suggest: Option<u8>,
    #[serde(default)]
    saved: Option<u8>,
}

async fn edit_page(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
    Query(query): Query<EditQuery>,
) -> Result<Html<String>, AppError> {
    // A record is created empty the first time an image is opened for editing
    let mut record = match state.db.get(&filename)? {
        Some(record) => record,
        None => {
            let record = Record::empty(&filename);
            state.db.upsert(&record)?;
            record
        }
    };

    let mut suggestion_note = None;
    if query.suggest == Some(1) {
        let suggestion = fetch_suggestion(&state, &filename).await;
        if suggestion.is_empty() {
            suggestion_note = Some("No suggestion available".to_string());
        } else {
            merge_suggestion(&mut record, &suggestion);
            suggestion_note = Some("Suggested fields filled in, review and save".to_string());
        }
    }

    // Prev/next navigation over the session's file list
    let files = list_images(&state.images_dir(), &state.config.extensions)?;
    let catalogued = state.db.filenames()?;
    let mut cursor = GalleryCursor::new(files);
    cursor.select(&filename, &catalogued);
    let mut next_cursor = cursor.clone();
    next_cursor.next(&catalogued);
    let mut prev_cursor = cursor.clone();
    prev_cursor.prev(&catalogued);

    let nav = Neighbours {
        prev: prev_cursor.current(&catalogued).map(String::from),
        next: next_cursor.current(&catalogued).map(String::from),
    };

    Ok(Html(render_edit(
        &record,
        &nav,
        suggestion_note.as_deref(),
        query.saved == Some(1),
    )))
}

/// Form body of the metadata editor
#[derive(Debug, Deserialize)]
struct MetadataForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    year: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    museum: String,
    #[serde(default)]
    material: String,
    #[serde(default)]
    style: String,
    #[serde(default)]
    dimensions: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    tags: String,
}

async fn save_metadata(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
    Form(form): Form<MetadataForm>,
) -> Result<Redirect, AppError> {
    let record = Record {
        filename: filename.clone(),
        title: form.title,
        author: form.author,
        year: form.year,
        description: form.description,
        museum: form.museum,
        material: form.material,
        style: form.style,
        dimensions: form.dimensions,
        source: form.source,
        tags: split_tags(&form.tags),
    };

    let (outcome, saved) = commit_rename(&state.db, &state.images_dir(), record)?;
    if let Err(e) = state
        .history
        .record(&state.images_dir(), &outcome, &saved.title, &saved.author)
    {
        warn!("Failed to write history entry: {}", e);
    }

    info!("Saved metadata for {:?}", saved.filename);
    Ok(Redirect::to(&format!(
        "/edit/{}?saved=1",
        encode_component(&saved.filename)
    )))
}

/// Split a comma-separated tag field, dropping empties
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

async fn fetch_suggestion(state: &AppState, filename: &str) -> Suggestion {
    let path = state.images_dir().join(filename);
    let image = match prepare_image(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Could not read {:?} for suggestion: {}", path, e);
            return Suggestion::default();
        }
    };

    suggest_or_empty(state.provider.as_ref(), &image).await
}

/// Fill only the empty fields of a record from a suggestion
fn merge_suggestion(record: &mut Record, suggestion: &Suggestion) {
    if record.title.is_empty() {
        record.title = suggestion.title.clone();
    }
    if record.author.is_empty() {
        record.author = suggestion.author.clone();
    }
    if record.description.is_empty() {
        record.description = suggestion.description.clone();
    }
    if record.source.is_empty() {
        record.source = suggestion.source.clone();
    }
    if record.tags.is_empty() {
        record.tags = suggestion.tags.clone();
    }
}

// === API Handlers ===

async fn api_get_records(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Record>>, AppError> {
    Ok(Json(state.db.list()?))
}

async fn api_get_record(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Json<Record>, AppError> {
    match state.db.get(&filename)? {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::NotFound),
    }
}

#[derive(Serialize)]
struct StatsResponse {
    total_images: usize,
    catalogued: i64,
    complete: i64,
    tags: i64,
}

async fn api_get_stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, AppError> {
    let files = list_images(&state.images_dir(), &state.config.extensions)?;
    let stats = state.db.stats()?;
    Ok(Json(StatsResponse {
        total_images: files.len(),
        catalogued: stats.record_count,
        complete: stats.complete_count,
        tags: stats.tag_count,
    }))
}

async fn api_get_tags(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.db.all_tags()?))
}

// === Error mapping ===

enum AppError {
    NotFound,
    Internal(VisorError),
}

impl From<VisorError> for AppError {
    fn from(e: VisorError) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            Self::Internal(VisorError::MissingSourceFile(path)) => (
                StatusCode::CONFLICT,
                Html(render_error(&format!(
                    "File missing on disk: {} — the record keeps its old filename",
                    path.display()
                ))),
            )
                .into_response(),
            Self::Internal(e) => {
                warn!("Request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, Html(render_error(&e.to_string())))
                    .into_response()
            }
        }
    }
}

// === Template Rendering ===

struct Neighbours {
    prev: Option<String>,
    next: Option<String>,
}

/// Minimal HTML escaping for attribute and text positions
fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Percent-encode a filename for use in a URL path or query
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn base_template(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} - Visor</title>
    <style>
        :root {{
            --bg-primary: #1a1a2e;
            --bg-secondary: #16213e;
            --bg-card: #0f3460;
            --text-primary: #e8e8e8;
            --text-secondary: #a0a0a0;
            --accent: #e94560;
            --success: #00d9a5;
            --border: #2a2a4a;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
        }}
        .container {{ max-width: 1400px; margin: 0 auto; padding: 20px; }}
        nav {{
            background: var(--bg-secondary);
            padding: 15px 20px;
            display: flex;
            align-items: center;
            gap: 30px;
            border-bottom: 1px solid var(--border);
        }}
        nav .logo {{
            font-size: 1.5em;
            font-weight: bold;
            color: var(--accent);
            text-decoration: none;
        }}
        nav a {{
            color: var(--text-secondary);
            text-decoration: none;
        }}
        nav a:hover {{ color: var(--text-primary); }}
        .card {{
            background: var(--bg-card);
            border-radius: 12px;
            padding: 20px;
            margin-bottom: 20px;
        }}
        .grid {{
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(180px, 1fr));
            gap: 15px;
        }}
        .thumb {{
            display: block;
            border-radius: 8px;
            overflow: hidden;
            border: 2px solid var(--border);
        }}
        .thumb.done {{ border-color: var(--success); }}
        .thumb img {{ width: 100%; height: 160px; object-fit: cover; display: block; }}
        .thumb .name {{
            font-size: 0.75em;
            color: var(--text-secondary);
            padding: 4px 6px;
            white-space: nowrap;
            overflow: hidden;
            text-overflow: ellipsis;
        }}
        .progress {{
            height: 8px;
            background: var(--bg-secondary);
            border-radius: 4px;
            overflow: hidden;
            margin: 10px 0;
        }}
        .progress-fill {{ height: 100%; background: var(--success); }}
        form label {{
            display: block;
            color: var(--text-secondary);
            font-size: 0.85em;
            margin-top: 12px;
        }}
        form input, form textarea {{
            width: 100%;
            padding: 8px;
            border-radius: 6px;
            border: 1px solid var(--border);
            background: var(--bg-secondary);
            color: var(--text-primary);
        }}
        .button {{
            display: inline-block;
            margin-top: 16px;
            padding: 8px 20px;
            border-radius: 6px;
            border: none;
            background: var(--accent);
            color: white;
            cursor: pointer;
            text-decoration: none;
        }}
        .note {{ color: var(--success); margin: 10px 0; }}
        .editor {{ display: grid; grid-template-columns: 1fr 1fr; gap: 20px; }}
        .editor img {{ width: 100%; border-radius: 8px; }}
    </style>
</head>
<body>
    <nav>
        <a href="/" class="logo">Visor</a>
        <a href="/">Gallery</a>
        <a href="/?missing=1">Missing metadata</a>
    </nav>
    <main class="container">
        {}
    </main>
</body>
</html>"#,
        escape_html(title),
        content
    )
}

fn render_gallery(cursor: &GalleryCursor, catalogued: &HashSet<String>) -> String {
    let visible = cursor.visible(catalogued);
    let total = cursor.len();
    let completed = catalogued.len();
    let pct = if total > 0 { completed * 100 / total } else { 0 };

    let thumbs: String = visible
        .iter()
        .map(|f| {
            let class = if catalogued.contains(*f) { "thumb done" } else { "thumb" };
            format!(
                r#"<a class="{}" href="/edit/{}">
                    <img src="/media/{}" alt="{}">
                    <div class="name">{}</div>
                </a>"#,
                class,
                encode_component(f),
                encode_component(f),
                escape_html(f),
                escape_html(f),
            )
        })
        .collect();

    let body = if visible.is_empty() {
        "<p>No images to display.</p>".to_string()
    } else {
        format!(r#"<div class="grid">{}</div>"#, thumbs)
    };

    let content = format!(
        r#"
        <h1>Gallery</h1>
        <div class="card">
            <div class="progress"><div class="progress-fill" style="width: {}%"></div></div>
            <p>{} / {} images have metadata.</p>
        </div>
        {}
    "#,
        pct, completed, total, body
    );

    base_template("Gallery", &content)
}

fn render_edit(record: &Record, nav: &Neighbours, note: Option<&str>, saved: bool) -> String {
    let field = |label: &str, name: &str, value: &str| {
        format!(
            r#"<label>{}</label><input type="text" name="{}" value="{}">"#,
            label,
            name,
            escape_html(value)
        )
    };

    let mut notes = String::new();
    if saved {
        notes.push_str(r#"<p class="note">Metadata saved.</p>"#);
    }
    if let Some(note) = note {
        notes.push_str(&format!(r#"<p class="note">{}</p>"#, escape_html(note)));
    }

    let nav_links = format!(
        r#"{} {}"#,
        nav.prev
            .as_deref()
            .map(|p| format!(r#"<a class="button" href="/edit/{}">&larr; Prev</a>"#, encode_component(p)))
            .unwrap_or_default(),
        nav.next
            .as_deref()
            .map(|n| format!(r#"<a class="button" href="/edit/{}">Next &rarr;</a>"#, encode_component(n)))
            .unwrap_or_default(),
    );

    let encoded = encode_component(&record.filename);
    let content = format!(
        r#"
        <h1>{}</h1>
        {}
        <div class="editor">
            <div class="card">
                <img src="/media/{}" alt="{}">
                <p style="margin-top: 10px;">{}</p>
            </div>
            <div class="card">
                <a class="button" href="/edit/{}?suggest=1">Search suggestion</a>
                <form method="post" action="/edit/{}">
                    {}
                    {}
                    {}
                    <label>Description</label><textarea name="description" rows="4">{}</textarea>
                    {}
                    {}
                    {}
                    {}
                    {}
                    {}
                    <button class="button" type="submit">Save changes</button>
                </form>
            </div>
        </div>
    "#,
        escape_html(&record.filename),
        notes,
        encoded,
        escape_html(&record.filename),
        nav_links,
        encoded,
        encoded,
        field("Title", "title", &record.title),
        field("Author", "author", &record.author),
        field("Year", "year", &record.year),
        escape_html(&record.description),
        field("Tags (separated by commas)", "tags", &record.tags.join(", ")),
        field("Museum", "museum", &record.museum),
        field("Material", "material", &record.material),
        field("Style", "style", &record.style),
        field("Dimensions", "dimensions", &record.dimensions),
        field("Source", "source", &record.source),
    );

    base_template(&record.filename, &content)
}

fn render_error(message: &str) -> String {
    let content = format!(
        r#"
        <h1>Something went wrong</h1>
        <div class="card"><p>{}</p></div>
        <a class="button" href="/">Back to gallery</a>
    "#,
        escape_html(message)
    );
    base_template("Error", &content)
}

/// Start the web server with config, database, and suggestion provider
pub async fn start_server(state: Arc<AppState>) -> crate::Result<()> {
    let addr = format!("{}:{}", state.config.web.host, state.config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Web UI available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .await
        .map_err(|e| VisorError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_tags_trims_and_drops_empties() {
        assert_eq!(
            split_tags("oil, canvas , , impressionism"),
            vec!["oil", "canvas", "impressionism"]
        );
        assert!(split_tags("").is_empty());
        assert!(split_tags(" , ,").is_empty());
    }

    #[test]
    fn merge_suggestion_only_fills_empty_fields() {
        let mut record = Record::empty("a.jpg");
        record.title = "Kept title".to_string();

        let suggestion = Suggestion {
            title: "New title".to_string(),
            author: "New author".to_string(),
            tags: vec!["t".to_string()],
            ..Suggestion::default()
        };
        merge_suggestion(&mut record, &suggestion);

        assert_eq!(record.title, "Kept title");
        assert_eq!(record.author, "New author");
        assert_eq!(record.tags, vec!["t"]);
    }

    #[test]
    fn encode_component_escapes_reserved_bytes() {
        assert_eq!(
            encode_component("Doe, Jane - Portrait (1).jpg"),
            "Doe%2C%20Jane%20-%20Portrait%20%281%29.jpg"
        );
        assert_eq!(encode_component("plain.jpg"), "plain.jpg");
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(escape_html(r#"<b name="x">&"#), "&lt;b name=&quot;x&quot;&gt;&amp;");
    }
}
