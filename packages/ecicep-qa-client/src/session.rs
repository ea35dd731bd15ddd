//! Authenticated session and endpoint calls.

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use ecicep_qa_core::error::body_excerpt;
use ecicep_qa_core::{FormPayload, HarnessConfig, QaError, Result, Run};

/// Login page and credential endpoint.
pub const LOGIN_PATH: &str = "/login";

/// Registration form endpoint.
pub const SUBMIT_PATH: &str = "/usuario/nuevo";

/// Prefix of the per-RUN status endpoint (`/api/usuarios/{run}/categoria`).
pub const CATEGORY_PATH_PREFIX: &str = "/api/usuarios";

/// Characters escaped when a RUN is placed in a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Cookie-carrying session against one application instance.
///
/// Both clients share the cookie jar. `browse` follows redirects like a
/// browser and only loads the login page. `form` does not, so a `302`
/// after a post, or an API call bounced to the login page, is seen as a
/// status.
pub struct AppSession {
    base_url: Url,
    browse: Client,
    form: Client,
    read_timeout: Duration,
    submit_timeout: Duration,
}

impl AppSession {
    /// Builds an unauthenticated session from the harness configuration.
    ///
    /// # Arguments
    /// * `config` - Base URL and per-request timeouts
    ///
    /// # Returns
    /// A session with an empty cookie jar, or [`QaError::Transport`] if an
    /// HTTP client cannot be built.
    pub fn new(config: &HarnessConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let browse = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| QaError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        let form = Client::builder()
            .cookie_provider(jar)
            .redirect(Policy::none())
            .build()
            .map_err(|e| QaError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            browse,
            form,
            read_timeout: config.read_timeout,
            submit_timeout: config.submit_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Loads the login page to prime cookies, then posts the credentials.
    ///
    /// The post succeeds on `200` or `302`; any other status is
    /// [`QaError::Auth`].
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = self.url(LOGIN_PATH)?;

        debug!("GET {}", url);
        let resp = self
            .browse
            .get(url.clone())
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| transport("GET", LOGIN_PATH, e))?;
        if !resp.status().is_success() {
            warn!("Login page answered {}", resp.status());
            return Err(QaError::Auth {
                status: resp.status().as_u16(),
            });
        }

        debug!("POST {} as {}", url, username);
        let resp = self
            .form
            .post(url)
            .form(&[("username", username), ("password", password)])
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| transport("POST", LOGIN_PATH, e))?;
        match resp.status() {
            StatusCode::OK | StatusCode::FOUND => Ok(()),
            status => {
                warn!("Login post answered {}", status);
                Err(QaError::Auth {
                    status: status.as_u16(),
                })
            }
        }
    }

    /// Posts a registration form with its fields in order.
    ///
    /// `200` and `302` succeed. Any other status is
    /// [`QaError::Submission`] carrying the first 200 characters of the
    /// body. Never retried.
    pub async fn submit_form(&self, payload: &FormPayload) -> Result<()> {
        let url = self.url(SUBMIT_PATH)?;
        debug!(
            "POST {} ({:?}, {} fields)",
            url,
            payload.mode(),
            payload.fields().len()
        );
        let resp = self
            .form
            .post(url)
            .form(payload.fields())
            .timeout(self.submit_timeout)
            .send()
            .await
            .map_err(|e| transport("POST", SUBMIT_PATH, e))?;

        match resp.status() {
            StatusCode::OK | StatusCode::FOUND => Ok(()),
            status => {
                let body = read_excerpt(resp).await;
                warn!("{} answered {}", SUBMIT_PATH, status);
                Err(QaError::Submission {
                    path: SUBMIT_PATH.to_string(),
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Asks the category endpoint whether `run` is registered.
    ///
    /// # Arguments
    /// * `run` - RUN to look up, sent dotted
    ///
    /// # Returns
    /// `true` on `200`, `false` on `404`. Any other status, including a
    /// redirect to the login page, is [`QaError::Lookup`].
    pub async fn record_exists(&self, run: &Run) -> Result<bool> {
        let path = category_path(run);
        let url = self.url(&path)?;
        debug!("GET {}", url);
        let resp = self
            .form
            .get(url)
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| transport("GET", &path, e))?;

        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = read_excerpt(resp).await;
                Err(QaError::Lookup {
                    run: run.dotted(),
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// GETs a JSON document. Non-200 answers and unparsable bodies are
    /// [`QaError::Report`].
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        let resp = self
            .form
            .get(url)
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| transport("GET", path, e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = read_excerpt(resp).await;
            return Err(QaError::Report(format!(
                "{} answered {}: {}",
                path,
                status.as_u16(),
                body
            )));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| QaError::Report(format!("{} did not return JSON: {}", path, e)))
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            QaError::Config(format!(
                "Cannot join '{}' onto {}: {}",
                path, self.base_url, e
            ))
        })
    }
}

/// Status endpoint path for `run`, with the dotted RUN as one segment.
pub fn category_path(run: &Run) -> String {
    format!(
        "{}/{}/categoria",
        CATEGORY_PATH_PREFIX,
        utf8_percent_encode(&run.dotted(), PATH_SEGMENT)
    )
}

fn transport(method: &str, path: &str, e: reqwest::Error) -> QaError {
    if e.is_timeout() {
        QaError::Transport(format!("{} {} timed out: {}", method, path, e))
    } else {
        QaError::Transport(format!("{} {} failed: {}", method, path, e))
    }
}

async fn read_excerpt(resp: Response) -> String {
    match resp.text().await {
        Ok(text) => body_excerpt(&text),
        Err(e) => format!("<unreadable body: {}>", e),
    }
}
