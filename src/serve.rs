//! Blog HTTP server.
//!
//! Built on `tiny_http`; every request is answered from the current cache
//! snapshot, so readers never wait on a reload in progress.
//!
//! | Route                     | Response                                  |
//! |---------------------------|-------------------------------------------|
//! | `/`                       | 303 → `/blog`                             |
//! | `/blog`                   | front page entry                          |
//! | `/blog/entry/<slug>`      | entry, 404 if unknown                     |
//! | `/blog/page/<name>`       | page by name or friendly title            |
//! | `/blog/entry`, `/blog/page` | 303 → `/blog`                           |
//! | `/blog/reload/<secret>`   | full reload; 404 on a wrong secret        |
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    cache.snapshot()        cache.apply(change)
//! └─────────────────────────────────────────────┘
//!                    │
//!                    ▼
//!              ContentCache
//! ```

use crate::{
    cache::{CacheError, ContentCache, LatestEntry, PageIndex},
    config::ServeSettings,
    document::ParsedDocument,
    log,
    watch::ChangeWatcher,
};
use anyhow::{Context, Result};
use std::{io::Cursor, net::SocketAddr, sync::Arc};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

const RELOADED: &str = "Configuration reloaded successfully!";
const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve the blog until Ctrl+C, optionally watching the blog root.
pub fn serve_blog(cache: Arc<ContentCache>, settings: &ServeSettings) -> Result<()> {
    let interface: std::net::IpAddr = settings
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", settings.interface))?;

    let (server, addr) = try_bind_port(interface, settings.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}/blog", addr);

    // Kept alive for the lifetime of the server loop.
    let _watcher = if settings.watch {
        Some(ChangeWatcher::spawn(Arc::clone(&cache))?)
    } else {
        None
    };

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &cache) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: std::net::IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Routing
// ============================================================================

/// What to send back for a request path.
#[derive(Debug, PartialEq, Eq)]
enum Reply {
    Html(String),
    Text(&'static str),
    Redirect(&'static str),
    NotFound(String),
}

fn handle_request(request: Request, cache: &ContentCache) -> Result<()> {
    let url_path = urlencoding::decode(request.url())
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    let path = url_path.split('?').next().unwrap_or(&url_path);

    let reply = route(cache, path);
    respond(request, reply)
}

/// Resolve a decoded request path against the cache.
fn route(cache: &ContentCache, path: &str) -> Reply {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let document = match segments.as_slice() {
        [] => return Reply::Redirect("/blog"),
        ["blog"] => cache.front_page_document().map(|e| e.document.clone()),
        ["blog", "entry" | "page"] => return Reply::Redirect("/blog"),
        ["blog", "entry", slug] => cache.get_entry(slug).map(|e| e.document.clone()),
        ["blog", "page", name] => cache.get_page(name).map(|p| p.document.clone()),
        ["blog", "reload", secret] => {
            return match cache.reload(secret) {
                Ok(()) => Reply::Text(RELOADED),
                Err(err) => failure(cache, &err),
            };
        }
        _ => Err(CacheError::NotFound(path.to_owned())),
    };

    match document {
        Ok(document) => Reply::Html(render(
            &document,
            &cache.get_latest(),
            &cache.get_page_index(),
        )),
        Err(err) => failure(cache, &err),
    }
}

fn failure(cache: &ContentCache, err: &CacheError) -> Reply {
    if !err.is_not_found() {
        log!("serve"; "{err}");
    }
    Reply::NotFound(render_not_found(&cache.get_latest(), &cache.get_page_index()))
}

// ============================================================================
// Response Helpers
// ============================================================================

fn respond(request: Request, reply: Reply) -> Result<()> {
    match reply {
        Reply::Html(body) => {
            request.respond(Response::from_string(body).with_header(header("Content-Type", HTML)?))?;
        }
        Reply::Text(body) => {
            request.respond(Response::from_string(body).with_header(header("Content-Type", TEXT)?))?;
        }
        Reply::NotFound(body) => request.respond(
            Response::from_string(body)
                .with_status_code(StatusCode(404))
                .with_header(header("Content-Type", HTML)?),
        )?,
        Reply::Redirect(location) => request.respond(Response::new(
            StatusCode(303),
            vec![header("Location", location)?],
            Cursor::new(Vec::new()),
            Some(0),
            None,
        ))?,
    }
    Ok(())
}

fn header(field: &str, value: &str) -> Result<Header> {
    Header::from_bytes(field, value).map_err(|()| anyhow::anyhow!("invalid header `{field}: {value}`"))
}

// ============================================================================
// HTML
// ============================================================================

fn render(document: &ParsedDocument, latest: &[LatestEntry], pages: &PageIndex) -> String {
    let title = document.title().unwrap_or("Blog");
    layout(title, document.html(), latest, pages)
}

fn render_not_found(latest: &[LatestEntry], pages: &PageIndex) -> String {
    layout("Not found", "<h1>Not found</h1>", latest, pages)
}

/// Minimal page: latest entries and page menu beside the body.
fn layout(title: &str, body: &str, latest: &[LatestEntry], pages: &PageIndex) -> String {
    let latest: String = latest
        .iter()
        .map(|l| format!(r#"<li><a href="{}">{}</a></li>"#, escape(&l.url), escape(&l.title)))
        .collect();
    let pages: String = pages
        .iter()
        .map(|(title, url)| format!(r#"<li><a href="{}">{}</a></li>"#, escape(url), escape(title)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<nav>
<h2>Latest</h2><ul>{latest}</ul>
<h2>Pages</h2><ul>{pages}</ul>
</nav>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
