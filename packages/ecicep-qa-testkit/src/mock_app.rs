//! Hyper-based stand-in for the registry application.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use matchit::Router as MatchitRouter;
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

const SESSION_COOKIE: &str = "session=mock-session";

/// One recorded post to `/usuario/nuevo`, fields in wire order.
pub type Submission = Vec<(String, String)>;

#[derive(Default)]
struct MockState {
    username: String,
    password: String,
    login_attempts: usize,
    registered: HashSet<String>,
    submissions: Vec<Submission>,
    submit_failure: Option<u16>,
    lookup_failure: Option<u16>,
    api_redirects_to_login: bool,
    reports: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Login,
    Submit,
    Category,
    Report,
}

/// Running mock application bound to an ephemeral local port.
///
/// The server task is aborted when the value is dropped.
pub struct MockApp {
    addr: SocketAddr,
    state: Arc<Mutex<MockState>>,
    task: JoinHandle<()>,
}

impl MockApp {
    /// Starts a mock that accepts `qa` / `secret`.
    pub async fn start() -> std::io::Result<Self> {
        Self::with_credentials("qa", "secret").await
    }

    pub async fn with_credentials(username: &str, password: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(Mutex::new(MockState {
            username: username.to_string(),
            password: password.to_string(),
            ..Default::default()
        }));
        let router = Arc::new(build_router());

        let server_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        debug!("mock accept failed: {}", e);
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let router = Arc::clone(&router);
                let state = Arc::clone(&server_state);

                tokio::spawn(async move {
                    let service =
                        service_fn(move |req| handle(req, Arc::clone(&router), Arc::clone(&state)));
                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("mock connection error: {}", err);
                    }
                });
            }
        });

        Ok(Self { addr, state, task })
    }

    /// `http://127.0.0.1:<port>`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Marks a RUN as already registered.
    pub fn register(&self, run: &str) {
        self.lock().registered.insert(normalize_run(run));
    }

    pub fn is_registered(&self, run: &str) -> bool {
        self.lock().registered.contains(&normalize_run(run))
    }

    /// Makes every following form post answer `status`.
    pub fn fail_submissions_with(&self, status: u16) {
        self.lock().submit_failure = Some(status);
    }

    /// Makes every following category lookup answer `status`.
    pub fn fail_lookups_with(&self, status: u16) {
        self.lock().lookup_failure = Some(status);
    }

    /// Makes every following `/api` call answer `302` to the login page,
    /// the way the application treats an expired session.
    pub fn redirect_api_to_login(&self) {
        self.lock().api_redirects_to_login = true;
    }

    /// Replaces the body served for `seccion-{section}`.
    pub fn set_report(&self, section: &str, body: Value) {
        self.lock().reports.insert(section.to_string(), body);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    pub fn login_attempts(&self) -> usize {
        self.lock().login_attempts
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }
}

impl Drop for MockApp {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Digits and `K` of a RUN, the way the application compares identities.
pub fn normalize_run(run: &str) -> String {
    run.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'k' || *c == 'K')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    // A panicking test thread must not wedge the server.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn build_router() -> MatchitRouter<Route> {
    let mut router = MatchitRouter::new();
    router
        .insert("/login", Route::Login)
        .expect("Failed to insert /login route");
    router
        .insert("/usuario/nuevo", Route::Submit)
        .expect("Failed to insert /usuario/nuevo route");
    router
        .insert("/api/usuarios/{run}/categoria", Route::Category)
        .expect("Failed to insert /api/usuarios/{run}/categoria route");
    router
        .insert("/api/rem-p-2025/{section}", Route::Report)
        .expect("Failed to insert /api/rem-p-2025/{section} route");
    router
}

async fn handle(
    req: Request<Incoming>,
    router: Arc<MatchitRouter<Route>>,
    state: Arc<Mutex<MockState>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let (route, param) = match router.at(&path) {
        Ok(matched) => {
            let param = matched
                .params
                .get("run")
                .or_else(|| matched.params.get("section"))
                .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned());
            (*matched.value, param)
        }
        Err(_) => return Ok(respond(404, "text/plain", "Not Found")),
    };

    let method = req.method().clone();
    let authenticated = req
        .headers()
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains(SESSION_COOKIE))
        .unwrap_or(false);
    let body = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    debug!("mock {} {}", method, path);

    let response = match (route, method) {
        (Route::Login, Method::GET) => respond(200, "text/html", "<form>login</form>"),
        (Route::Login, Method::POST) => login(&state, &body),
        (_, _) if !authenticated => respond(401, "text/plain", "Unauthorized"),
        (Route::Category | Route::Report, _) if lock(&state).api_redirects_to_login => {
            login_redirect()
        }
        (Route::Submit, Method::POST) => submit(&state, &body),
        (Route::Category, Method::GET) => category(&state, param.as_deref().unwrap_or_default()),
        (Route::Report, Method::GET) => report(&state, param.as_deref().unwrap_or_default()),
        _ => respond(405, "text/plain", "Method Not Allowed"),
    };
    Ok(response)
}

fn login(state: &Mutex<MockState>, body: &[u8]) -> Response<Full<Bytes>> {
    let fields: HashMap<String, String> = url::form_urlencoded::parse(body).into_owned().collect();
    let mut state = lock(state);
    state.login_attempts += 1;

    let accepted = fields.get("username") == Some(&state.username)
        && fields.get("password") == Some(&state.password);
    if !accepted {
        return respond(401, "text/html", "Credenciales inválidas");
    }
    let mut resp = respond(302, "text/html", "");
    resp.headers_mut()
        .insert(LOCATION, HeaderValue::from_static("/"));
    resp.headers_mut().insert(
        SET_COOKIE,
        HeaderValue::from_static("session=mock-session; Path=/; HttpOnly"),
    );
    resp
}

fn login_redirect() -> Response<Full<Bytes>> {
    let mut resp = respond(302, "text/html", "");
    resp.headers_mut()
        .insert(LOCATION, HeaderValue::from_static("/login?next=/api"));
    resp
}

fn submit(state: &Mutex<MockState>, body: &[u8]) -> Response<Full<Bytes>> {
    let fields: Submission = url::form_urlencoded::parse(body).into_owned().collect();
    let mut state = lock(state);
    state.submissions.push(fields.clone());

    if let Some(status) = state.submit_failure {
        let trace = format!("Internal Server Error\n{}", "Traceback line\n".repeat(40));
        return respond(status, "text/plain", &trace);
    }

    match fields.iter().find(|(k, _)| k == "run") {
        Some((_, run)) => {
            let normalized = normalize_run(run);
            state.registered.insert(normalized);
            let mut resp = respond(302, "text/html", "");
            resp.headers_mut()
                .insert(LOCATION, HeaderValue::from_static("/usuarios"));
            resp
        }
        None => respond(400, "text/plain", "RUN requerido"),
    }
}

fn category(state: &Mutex<MockState>, run: &str) -> Response<Full<Bytes>> {
    let state = lock(state);
    if let Some(status) = state.lookup_failure {
        return respond(status, "text/plain", "lookup unavailable");
    }
    if state.registered.contains(&normalize_run(run)) {
        let body = json!({"run": run, "categoria": "G1"}).to_string();
        respond(200, "application/json", &body)
    } else {
        respond(404, "application/json", r#"{"error":"usuario no encontrado"}"#)
    }
}

fn report(state: &Mutex<MockState>, section: &str) -> Response<Full<Bytes>> {
    let key = match section {
        "seccion-a" => "a",
        "seccion-b" => "b",
        _ => return respond(404, "text/plain", "Not Found"),
    };
    let state = lock(state);
    let body = state
        .reports
        .get(key)
        .cloned()
        .unwrap_or_else(|| default_report(key));
    respond(200, "application/json", &body.to_string())
}

fn default_report(section: &str) -> Value {
    if section == "a" {
        json!({
            "seccion": "A",
            "datos": {
                "total_pscv": {"totales": {"total": 1520, "hombres": 700, "mujeres": 820}},
                "hipertension": {"totales": {"total": 1210}},
                "diabetes_tipo2": {"totales": {"total": 480}}
            }
        })
    } else {
        json!({
            "seccion": "B",
            "datos": {"hta": {"total": 1210, "controlados": 830}}
        })
    }
}

fn respond(status: u16, content_type: &'static str, body: &str) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body.to_string())));
    *resp.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}
