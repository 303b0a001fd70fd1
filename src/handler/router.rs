//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, the health
//! probe, the digest gate, session binding and dispatch to the console.

use crate::auth::ACCESS_DENIED;
use crate::config::AppState;
use crate::console::render::escape_html;
use crate::handler::page;
use crate::http::{self, cookie, params};
use crate::logger::{self, AccessLogEntry};
use crate::session::SessionManager;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, AUTHORIZATION, SERVER, SET_COOKIE, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Addresses of the connection a request arrived on
#[derive(Debug, Clone, Copy)]
pub struct ConnInfo {
    pub peer_addr: SocketAddr,
    pub local_addr: Option<SocketAddr>,
}

/// JSON reply to a command line
#[derive(Debug, Serialize)]
struct CommandReply {
    /// Echoed prompt and command
    command: String,
    result: String,
    pwd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Session bound to the current request
struct SessionBinding {
    id: String,
    is_new: bool,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    conn: ConnInfo,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = AccessLogEntry::new(
        conn.peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.http_version = version_label(req.version()).to_string();
    entry.user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let mut response = route_request(req, &state, conn, &mut entry).await;

    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, value);
    }

    if state.cached_access_log.load(Ordering::Relaxed) {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Validate, authenticate and dispatch a request
async fn route_request<B>(
    req: Request<B>,
    state: &AppState,
    conn: ConnInfo,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    // 1. Check HTTP method
    if let Some(resp) = check_http_method(req.method()) {
        return resp;
    }

    // 2. Health probe, served without authentication
    let path = req.uri().path();
    if path == state.config.http.health_path {
        return http::build_health_response("ok");
    }
    if path != "/" {
        return http::build_404_response();
    }

    // 3. Check declared body size
    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return resp;
    }

    // 4. Digest gate
    if let Some(ref auth) = state.auth {
        let authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let target = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
        match auth.verify(req.method().as_str(), target, authorization) {
            Ok(user) => entry.remote_user = Some(user),
            Err(e) => {
                logger::log_auth_failure(&conn.peer_addr, &e);
                return http::build_401_response(&auth.challenge(e.is_stale()), ACCESS_DENIED);
            }
        }
    }

    // 5. Bind the session
    let cookie_name = &state.config.session.cookie_name;
    let session = bind_session(state, cookie::find_cookie(req.headers(), cookie_name));
    entry.session = Some(session.id.chars().take(8).collect());

    // 6. Extract the command line
    let method = req.method().clone();
    let query = req.uri().query().map(ToString::to_string);
    let body = if method == Method::POST {
        match read_body(req.into_body(), state.config.http.max_body_size).await {
            Ok(body) => Some(body),
            Err(resp) => return resp,
        }
    } else {
        None
    };
    let command = if method == Method::HEAD {
        None
    } else {
        params::request_param(body.as_deref(), query.as_deref(), "command")
    };

    // 7. Serve
    let local_host = conn.local_addr.map(|addr| addr.ip().to_string());
    let mut response = serve_console(
        state,
        &session.id,
        command,
        method == Method::HEAD,
        local_host.as_deref(),
    )
    .await;

    if session.is_new {
        let cookie = cookie::session_cookie(cookie_name, &session.id);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().insert(SET_COOKIE, value);
            }
            Err(e) => logger::log_error(&format!("Invalid session cookie: {e}")),
        }
    }

    response
}

/// Check HTTP method and return appropriate response for unsupported ones
fn check_http_method(method: &Method) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD | Method::POST => None,
        Method::OPTIONS => Some(http::build_options_response()),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Collect a request body of at most `max_body_size` bytes
async fn read_body<B>(body: B, max_body_size: u64) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_error(&format!("Request body exceeds {max_body_size} bytes"));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(http::build_400_response("Failed to read request body"))
        }
    }
}

/// Reuse the cookie's session id, or issue a new one
fn bind_session(state: &AppState, cookie: Option<String>) -> SessionBinding {
    match cookie {
        Some(id) if SessionManager::is_valid_id(&id) => {
            if !state.sessions.exists(&id) {
                logger::log_debug(&format!("[Session] {id} unknown or expired, starting fresh"));
            }
            SessionBinding { id, is_new: false }
        }
        _ => {
            let id = SessionManager::new_id();
            logger::log_session_created(&id);
            SessionBinding { id, is_new: true }
        }
    }
}

/// Run a command line for the session, or render the console page
///
/// The session lock is held across load, execution and store so requests
/// of one session never interleave.
async fn serve_console(
    state: &AppState,
    session_id: &str,
    command: Option<String>,
    is_head: bool,
    local_host: Option<&str>,
) -> Response<Full<Bytes>> {
    let _guard = state.sessions.lock(session_id).await;
    let mut session = state.sessions.load(session_id);
    let console = &state.console;

    let response = match command {
        Some(line) => {
            let outcome = console.execute_line(session_id, &line, &mut session).await;
            let reply = CommandReply {
                command: format!(
                    "<div class=\"clear\">{}{}</div>",
                    console.prompt(&session, local_host),
                    escape_html(&line)
                ),
                result: outcome.html,
                pwd: console.display_pwd(&session),
                error: outcome.error.map(|e| e.to_string()),
            };
            http::build_json_response(200, &reply)
        }
        None => {
            console.ensure_initialized(&mut session);
            let html = page::render_page(
                &console.display_pwd(&session),
                &console.prompt(&session, local_host),
            );
            http::build_html_response(html, is_head)
        }
    };

    session.current_working_pwd = None;
    if let Err(e) = state.sessions.store(session_id, session) {
        logger::log_error(&format!("Failed to store session: {e}"));
    }

    response
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE, WWW_AUTHENTICATE};

    struct Fixture {
        _dir: tempfile::TempDir,
        state: Arc<AppState>,
    }

    fn fixture_with(configure: impl FnOnce(&mut Config)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().canonicalize().unwrap();
        std::fs::create_dir(home.join("sub")).unwrap();

        let mut config = Config::load_from("does-not-exist/webconsole").unwrap();
        config.console.home = home.to_string_lossy().into_owned();
        config.logging.access_log = false;
        configure(&mut config);

        Fixture {
            _dir: dir,
            state: Arc::new(AppState::new(&config).unwrap()),
        }
    }

    fn fixture() -> Fixture {
        fixture_with(|_| {})
    }

    fn conn() -> ConnInfo {
        ConnInfo {
            peer_addr: "127.0.0.1:50000".parse().unwrap(),
            local_addr: Some("127.0.0.1:8080".parse().unwrap()),
        }
    }

    fn post(command: &str, cookie: Option<&str>) -> Request<Full<Bytes>> {
        let body: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("command", command)
            .finish();
        let mut builder = Request::post("/")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CONTENT_LENGTH, body.len());
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Full::new(Bytes::from(body))).unwrap()
    }

    fn get(uri: &str) -> Request<Full<Bytes>> {
        Request::get(uri).body(Full::new(Bytes::new())).unwrap()
    }

    async fn send(fx: &Fixture, req: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
        handle_request(req, Arc::clone(&fx.state), conn())
            .await
            .unwrap()
    }

    async fn json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn cookie_pair(response: &Response<Full<Bytes>>) -> String {
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_page_issues_session_cookie() {
        let fx = fixture();
        let response = send(&fx, get("/")).await;

        assert_eq!(response.status(), 200);
        assert!(cookie_pair(&response).starts_with("WEBCONSOLESESSID="));
        assert_eq!(response.headers()[SERVER], "webconsole/0.1");

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("<title>~/</title>"));
        assert!(page.contains(r#"console@127.0.0.1 <span class="pwd">~/</span> $ "#));
    }

    #[tokio::test]
    async fn test_command_reply_shape() {
        let fx = fixture();
        let response = send(&fx, post("echo '<hi>'", None)).await;
        assert_eq!(response.status(), 200);

        let reply = json(response).await;
        assert_eq!(
            reply["command"],
            r#"<div class="clear">console@127.0.0.1 <span class="pwd">~/</span> $ echo &#039;&lt;hi&gt;&#039;</div>"#
        );
        assert_eq!(reply["result"], "&lt;hi&gt;<br />\n");
        assert_eq!(reply["pwd"], "~/");
        assert!(reply.get("error").is_none());
    }

    #[tokio::test]
    async fn test_directory_persists_across_requests() {
        let fx = fixture();
        let first = send(&fx, post("cd sub", None)).await;
        let cookie = cookie_pair(&first);
        let sub = fx.state.console.home().join("sub");
        assert_eq!(json(first).await["pwd"], sub.to_string_lossy().as_ref());

        let second = send(&fx, post("cd -", Some(&cookie))).await;
        assert!(second.headers().get(SET_COOKIE).is_none());
        let reply = json(second).await;
        // Echoed prompt shows the directory the line was typed in
        assert!(reply["command"]
            .as_str()
            .unwrap()
            .contains(sub.to_string_lossy().as_ref()));
        assert_eq!(reply["pwd"], "~/");
    }

    #[tokio::test]
    async fn test_failed_cd_reports_error() {
        let fx = fixture();
        let reply = json(send(&fx, post("cd missing; echo after", None)).await).await;

        assert_eq!(reply["error"], "cd: missing: No such file or directory");
        assert!(!reply["result"].as_str().unwrap().contains("after"));
        assert_eq!(reply["pwd"], "~/");
    }

    #[tokio::test]
    async fn test_get_command_fallback() {
        let fx = fixture();
        let reply = json(send(&fx, get("/?command=echo+from+query")).await).await;
        assert_eq!(reply["result"], "from&nbsp;query<br />\n");
    }

    #[tokio::test]
    async fn test_invalid_cookie_replaced() {
        let fx = fixture();
        let response = send(&fx, post("echo x", Some("WEBCONSOLESESSID=../../etc"))).await;
        let pair = cookie_pair(&response);
        let id = pair.trim_start_matches("WEBCONSOLESESSID=");
        assert!(SessionManager::is_valid_id(id));
    }

    #[tokio::test]
    async fn test_method_and_path_checks() {
        let fx = fixture();

        let put = Request::put("/").body(Full::new(Bytes::new())).unwrap();
        assert_eq!(send(&fx, put).await.status(), 405);

        let options = Request::options("/").body(Full::new(Bytes::new())).unwrap();
        assert_eq!(send(&fx, options).await.status(), 204);

        assert_eq!(send(&fx, get("/index.php")).await.status(), 404);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let fx = fixture_with(|config| config.http.max_body_size = 16);
        let response = send(&fx, post("echo this line is too long", None)).await;
        assert_eq!(response.status(), 413);
    }

    #[tokio::test]
    async fn test_auth_gate() {
        let fx = fixture_with(|config| {
            config.auth.enabled = true;
            config.auth.users.insert("admin".to_string(), "secret".to_string());
        });

        let denied = send(&fx, post("echo x", None)).await;
        assert_eq!(denied.status(), 401);
        let challenge = denied.headers()[WWW_AUTHENTICATE].to_str().unwrap();
        assert!(challenge.starts_with("Digest realm=\"Restricted area\""));
        assert!(denied.headers().get(SET_COOKIE).is_none());

        // Health probe stays open
        let health = send(&fx, get("/healthz")).await;
        assert_eq!(health.status(), 200);
    }

    /// `Authorization` header for a GET of `uri`, answering `challenge`
    fn digest_header(challenge: &str, uri: &str, user: &str, password: &str) -> String {
        use crate::auth::digest::{Algorithm, DigestParams};

        let nonce = challenge
            .split("nonce=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap();
        let params = DigestParams {
            username: user.to_string(),
            realm: Some("Restricted area".to_string()),
            nonce: nonce.to_string(),
            uri: uri.to_string(),
            response: String::new(),
            qop: "auth".to_string(),
            nc: "00000001".to_string(),
            cnonce: "9c1e2f70".to_string(),
            algorithm: Algorithm::Md5,
        };
        let response = params.expected_response("GET", "Restricted area", password);
        format!(
            r#"Digest username="{user}", realm="Restricted area", nonce="{nonce}", uri="{uri}", qop=auth, nc=00000001, cnonce="9c1e2f70", response="{response}""#
        )
    }

    #[tokio::test]
    async fn test_auth_header_not_replayable_on_other_command() {
        let fx = fixture_with(|config| {
            config.auth.enabled = true;
            config.auth.users.insert("admin".to_string(), "secret".to_string());
        });

        let denied = send(&fx, get("/")).await;
        let challenge = denied.headers()[WWW_AUTHENTICATE].to_str().unwrap().to_string();
        let header = digest_header(&challenge, "/?command=echo+harmless", "admin", "secret");

        let mut allowed = get("/?command=echo+harmless");
        allowed.headers_mut().insert(AUTHORIZATION, header.parse().unwrap());
        assert_eq!(send(&fx, allowed).await.status(), 200);

        let mut replayed = get("/?command=echo+INJECTED");
        replayed.headers_mut().insert(AUTHORIZATION, header.parse().unwrap());
        let response = send(&fx, replayed).await;
        assert_eq!(response.status(), 401);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_some());
    }
}
