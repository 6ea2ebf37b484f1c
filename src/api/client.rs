use async_trait::async_trait;
use color_eyre::eyre::eyre;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::api::types::{Lead, NewLead, Pitch, PitchRequestBody};
use crate::config::Config;
use crate::error::{Error, Result};

const LEADS_PATH: &str = "api/v1/leads/";

/// Operations the lead-analysis backend offers.
#[async_trait]
pub trait LeadsBackend: Send + Sync {
  async fn list_leads(&self) -> Result<Vec<Lead>>;

  async fn get_lead(&self, id: i64) -> Result<Lead>;

  async fn create_lead(&self, lead: &NewLead) -> Result<Lead>;

  async fn delete_lead(&self, id: i64) -> Result<()>;

  /// Backend rejects this with a 400 unless the lead is completed.
  async fn generate_pitch(&self, lead_id: i64, user_product_description: &str) -> Result<Pitch>;
}

/// HTTP client for the leads REST API
#[derive(Clone)]
pub struct LeadsApi {
  client: reqwest::Client,
  base_url: Url,
}

impl LeadsApi {
  pub fn new(config: &Config) -> color_eyre::Result<Self> {
    let base_url = parse_base_url(&config.api.base_url)
      .map_err(|e| eyre!("Invalid API base URL '{}': {}", config.api.base_url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base_url
      .join(path)
      .map_err(|e| Error::Validation(format!("Invalid endpoint {}: {}", path, e)))
  }

  async fn send<B: Serialize + ?Sized>(
    &self,
    method: Method,
    path: &str,
    body: Option<&B>,
  ) -> Result<Response> {
    let url = self.endpoint(path)?;
    debug!(%method, %url, "request");

    let mut request = self.client.request(method, url);
    if let Some(body) = body {
      request = request.json(body);
    }
    let response = request.send().await?;
    check(response).await
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    let response = self.send::<()>(Method::GET, path, None).await?;
    Ok(response.json().await?)
  }

  async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
    let response = self.send(Method::POST, path, Some(body)).await?;
    Ok(response.json().await?)
  }
}

#[async_trait]
impl LeadsBackend for LeadsApi {
  async fn list_leads(&self) -> Result<Vec<Lead>> {
    self.get(LEADS_PATH).await
  }

  async fn get_lead(&self, id: i64) -> Result<Lead> {
    self.get(&lead_path(id)).await
  }

  async fn create_lead(&self, lead: &NewLead) -> Result<Lead> {
    self.post(LEADS_PATH, lead).await
  }

  async fn delete_lead(&self, id: i64) -> Result<()> {
    // 204, no body
    self.send::<()>(Method::DELETE, &lead_path(id), None).await?;
    Ok(())
  }

  async fn generate_pitch(&self, lead_id: i64, user_product_description: &str) -> Result<Pitch> {
    let body = PitchRequestBody {
      user_product_description,
    };
    self
      .post(&format!("{}/generate-pitch", lead_path(lead_id)), &body)
      .await
  }
}

fn lead_path(id: i64) -> String {
  format!("{}{}", LEADS_PATH, id)
}

/// Base URL with a trailing slash so relative joins keep any path prefix.
fn parse_base_url(raw: &str) -> std::result::Result<Url, url::ParseError> {
  let mut base = raw.trim().to_string();
  if !base.ends_with('/') {
    base.push('/');
  }
  Url::parse(&base)
}

async fn check(response: Response) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  // A body we can't read still leaves us the status
  let body = response.text().await.unwrap_or_default();
  Err(server_error(status.as_u16(), &body))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  detail: Option<serde_json::Value>,
}

/// Map a non-success response to an error, preferring the body's `detail`.
fn server_error(status: u16, body: &str) -> Error {
  let detail = serde_json::from_str::<ErrorBody>(body)
    .ok()
    .and_then(|b| b.detail)
    .and_then(|detail| match detail {
      serde_json::Value::Null => None,
      serde_json::Value::String(s) => Some(s),
      other => Some(other.to_string()),
    });
  Error::server(status, detail)
}
