//! Responder for the prebuilt web bundle

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    handler::Handler,
    http::{StatusCode, Uri},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    Router,
};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::{
    config::StaticConfig,
    error::{Result, ServiceError},
};

/// Build hint shown when the bundle has not been produced yet
pub const BUILD_HINT: &str = "Run: cd apps/web && npx next build";

/// Fail fast when there is nothing to serve
pub fn ensure_root(config: &StaticConfig) -> Result<()> {
    if config.root.is_dir() {
        Ok(())
    } else {
        Err(ServiceError::StaticRootMissing {
            path: config.root.clone(),
        })
    }
}

/// Serve files under `root`. A directory resolves to its `index.html`, or to
/// an HTML listing when it has none.
pub fn static_router(root: impl AsRef<Path>) -> Router {
    let root = root.as_ref().to_path_buf();
    let listing = list_directory.with_state(Arc::new(root.clone()));

    Router::new()
        .fallback_service(
            ServeDir::new(root)
                .append_index_html_on_directories(true)
                .fallback(listing),
        )
        .layer(middleware::from_fn(log_request))
}

async fn list_directory(State(root): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let request_path = uri.path();
    let Some(dir) = resolve_under_root(&root, request_path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let is_dir = tokio::fs::metadata(&dir)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir || !request_path.ends_with('/') {
        return StatusCode::NOT_FOUND.into_response();
    }

    match render_listing(&dir, request_path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!("[VERA] cannot list {}: {}", dir.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Map a request path onto `root`, refusing anything that could leave it.
/// Percent-encoded segments are refused too; `ServeDir` has already had its
/// chance at decoding them.
fn resolve_under_root(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in request_path.split('/').filter(|s| !s.is_empty()) {
        if segment.contains(['%', '\\']) {
            return None;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return None,
        }
    }
    Some(path)
}

async fn render_listing(dir: &Path, request_path: &str) -> std::io::Result<String> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort_by_key(|name| name.to_lowercase());

    let title = format!("Directory listing for {}", escape_html(request_path));
    let mut html = format!(
        "<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );
    for name in names {
        let name = escape_html(&name);
        html.push_str(&format!("<li><a href=\"{name}\">{name}</a></li>\n"));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    Ok(html)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn log_request(request: Request, next: Next) -> Response {
    let line = format!(
        "\"{} {} {:?}\"",
        request.method(),
        request.uri(),
        request.version()
    );
    let response = next.run(request).await;
    info!("[VERA] {} {}", line, response.status().as_u16());
    response
}

/// Bind the fixed port and serve until `shutdown` resolves
pub async fn serve<F>(config: &StaticConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    ensure_root(config)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    axum::serve(listener, static_router(&config.root))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
