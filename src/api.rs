// API client module: a small blocking HTTP client for the helpdesk
// platform's app endpoints. Every request carries the Basic auth header
// built by `connection`.

use crate::connection::Connection;
use crate::error::ZatError;
use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Blocking client bound to one account's base URL and credentials.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// An app as returned by the app listing.
#[derive(Deserialize, Debug, Clone)]
pub struct AppSummary {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize, Debug)]
struct AppList {
    #[serde(default)]
    apps: Vec<AppSummary>,
}

/// State of a background job started by create or update.
#[derive(Deserialize, Debug, Clone)]
pub struct JobStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub app_id: Option<u64>,
}

impl JobStatus {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "failed" | "killed")
    }
}

/// Body of an installation request.
#[derive(Serialize, Debug, Clone)]
pub struct InstallationRequest {
    pub app_id: u64,
    pub settings: serde_json::Map<String, Value>,
}

// The platform takes upload ids as strings.
#[derive(Serialize)]
struct CreateAppRequest<'a> {
    name: &'a str,
    upload_id: String,
}

#[derive(Serialize)]
struct UpdateAppRequest {
    upload_id: String,
}

impl ApiClient {
    pub fn new(connection: &Connection) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&connection.credentials.authorization_header())
            .context("Credentials cannot be sent as a header")?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .user_agent(concat!("zat/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: connection.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Upload a packaged app and return the upload id.
    pub fn upload_package(&self, zip_path: &Path) -> Result<u64> {
        let url = self.url("/api/v2/apps/uploads.json");
        let bytes = std::fs::read(zip_path)
            .with_context(|| format!("Failed to read package {}", zip_path.display()))?;
        let file_name = zip_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("app.zip")
            .to_string();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/zip")?;
        let form = multipart::Form::new().part("uploaded_data", part);

        log::debug!("POST {}", url);
        let res = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .context("Failed to send upload request")?;
        let body: Value = check(res)?.json().context("Parsing upload response json")?;
        id_from(&body, "id")
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("Upload response has no id: {}", body))
    }

    /// Start building a new app from an upload. Returns the job id.
    pub fn create_app(&self, name: &str, upload_id: u64) -> Result<String> {
        let url = self.url("/api/apps.json");
        log::debug!("POST {}", url);
        let res = self
            .client
            .post(&url)
            .json(&CreateAppRequest {
                name,
                upload_id: upload_id.to_string(),
            })
            .send()
            .context("Failed to send create request")?;
        job_id_from(check(res)?)
    }

    /// Replace an existing app's code with an upload. Returns the job id.
    pub fn update_app(&self, app_id: u64, upload_id: u64) -> Result<String> {
        let url = self.url(&format!("/api/v2/apps/{}.json", app_id));
        log::debug!("PUT {}", url);
        let res = self
            .client
            .put(&url)
            .json(&UpdateAppRequest {
                upload_id: upload_id.to_string(),
            })
            .send()
            .context("Failed to send update request")?;
        job_id_from(check(res)?)
    }

    pub fn app_exists(&self, app_id: u64) -> Result<bool> {
        let url = self.url(&format!("/api/v2/apps/{}.json", app_id));
        log::debug!("GET {}", url);
        let res = self
            .client
            .get(&url)
            .send()
            .context("Failed to send app lookup request")?;
        Ok(res.status().is_success())
    }

    pub fn list_apps(&self) -> Result<Vec<AppSummary>> {
        let url = self.url("/api/apps.json");
        log::debug!("GET {}", url);
        let res = self
            .client
            .get(&url)
            .send()
            .context("Failed to send app list request")?;
        let list: AppList = check(res)?.json().context("Parsing app list json")?;
        Ok(list.apps)
    }

    pub fn job_status(&self, job_id: &str) -> Result<JobStatus> {
        let url = self.url(&format!("/api/v2/apps/job_statuses/{}.json", job_id));
        log::debug!("GET {}", url);
        let res = self
            .client
            .get(&url)
            .send()
            .context("Failed to send job status request")?;
        check(res)?.json().context("Parsing job status json")
    }

    /// Install an app into `product`. Returns the installation id when the
    /// platform reports one.
    pub fn install_app(&self, product: &str, request: &InstallationRequest) -> Result<Option<u64>> {
        let url = self.url(&format!("/api/{}/apps/installations.json", product));
        log::debug!("POST {}", url);
        let res = self
            .client
            .post(&url)
            .json(request)
            .send()
            .context("Failed to send installation request")?;
        let text = check(res)?
            .text()
            .context("Failed to read installation response")?;
        let body: Value = serde_json::from_str(&text).unwrap_or_else(|e| {
            log::debug!("installation response is not json: {}", e);
            Value::Null
        });
        Ok(id_from(&body, "id").and_then(|id| id.parse().ok()))
    }
}

/// Turn a non-2xx response into `ZatError::Api`, preferring the platform's
/// own description of the problem.
fn check(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            ["description", "error", "message"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or(text);
    Err(ZatError::Api {
        status: status.as_u16(),
        message,
    }
    .into())
}

/// Ids arrive as numbers or strings depending on the endpoint.
fn id_from(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid app id {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid app id {:?}", s))),
        Some(other) => Err(serde::de::Error::custom(format!("invalid app id {}", other))),
    }
}

fn job_id_from(res: Response) -> Result<String> {
    let body: Value = res.json().context("Parsing job response json")?;
    id_from(&body, "job_id").ok_or_else(|| anyhow::anyhow!("Response has no job_id: {}", body))
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::connection::{Connection, Credentials};

    pub const AUTHORIZATION_HEADER: &str = "Basic dXNlcm5hbWVAc29tZXRoaW5nLmNvbTpwYXNzd29yZA==";

    pub fn connection(base_url: &str) -> Connection {
        Connection {
            subdomain: "subdomain".into(),
            base_url: format!("{}/", base_url),
            credentials: Credentials {
                username: "username@something.com".into(),
                password: "password".into(),
            },
        }
    }
}
