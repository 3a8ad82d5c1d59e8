use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::object::Object;

/// Kinds of object that can be retrieved by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ObjectType {
  File,
  Url,
  Domain,
  #[value(name = "ip")]
  IpAddress,
  Analysis,
}

impl ObjectType {
  /// API collection holding objects of this type.
  #[must_use]
  pub const fn collection(self) -> &'static str {
    match self {
      Self::File => "files",
      Self::Url => "urls",
      Self::Domain => "domains",
      Self::IpAddress => "ip_addresses",
      Self::Analysis => "analyses",
    }
  }

  /// Converts a user-supplied identifier into the API's object id.
  ///
  /// URLs are addressed by their unpadded URL-safe base64 encoding; every
  /// other type uses the identifier as given.
  #[must_use]
  pub fn object_id(self, ident: &str) -> String {
    match self {
      Self::Url => URL_SAFE_NO_PAD.encode(ident),
      _ => ident.to_string(),
    }
  }

  /// Relative endpoint path for the object named by `ident`.
  #[must_use]
  pub fn path(self, ident: &str) -> String {
    format!("{}/{}", self.collection(), self.object_id(ident))
  }
}

/// Anything that can return a single object given its endpoint path.
#[async_trait]
pub trait ObjectSource: Send + Sync {
  async fn get_object(&self, path: &str) -> Result<Object>;
}

/// One page of a cursor-paginated collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
  pub objects: Vec<Object>,
  /// Token for the next page; empty when the collection is exhausted.
  pub cursor: String,
}

/// Parameters for a single page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
  pub collection: &'a Url,
  pub cursor: &'a str,
  pub limit: usize,
  pub filter: &'a str,
}

/// Anything that can serve pages of a collection.
#[async_trait]
pub trait PageSource: Send + Sync {
  async fn get_page(&self, req: PageRequest<'_>) -> Result<Page>;
}

#[derive(Deserialize)]
struct ObjectResponse {
  data: Object,
}

#[derive(Deserialize)]
struct CollectionResponse {
  #[serde(default)]
  data: Vec<Object>,
  #[serde(default)]
  meta: Option<Meta>,
}

#[derive(Deserialize)]
struct Meta {
  #[serde(default)]
  cursor: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
  error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
  code: String,
  #[serde(default)]
  message: String,
}

/// Decodes an `{"data": {...}}` object response.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the body isn't a valid object envelope.
pub fn decode_object(body: &[u8]) -> Result<Object> {
  serde_json::from_slice::<ObjectResponse>(body)
    .map(|r| r.data)
    .map_err(|e| Error::Decode(e.to_string()))
}

/// Decodes a `{"data": [...], "meta": {"cursor": ...}}` collection page.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the body isn't a valid collection envelope.
pub fn decode_page(body: &[u8]) -> Result<Page> {
  let resp = serde_json::from_slice::<CollectionResponse>(body)
    .map_err(|e| Error::Decode(e.to_string()))?;
  Ok(Page {
    objects: resp.data,
    cursor: resp.meta.and_then(|m| m.cursor).unwrap_or_default(),
  })
}

/// Builds the error for a non-success response.
#[must_use]
pub fn decode_error(status: StatusCode, body: &[u8]) -> Error {
  match serde_json::from_slice::<ErrorResponse>(body) {
    Ok(r) => Error::Api {
      code: r.error.code,
      message: r.error.message,
    },
    Err(_) => Error::Api {
      code: status.to_string(),
      message: String::from_utf8_lossy(body).trim().to_string(),
    },
  }
}

/// HTTP client for the v3 REST API.
#[derive(Clone)]
pub struct ApiClient {
  http: Client,
  base: Url,
  api_key: String,
}

impl ApiClient {
  /// Builds a client for `host` authenticating with `api_key`.
  ///
  /// `host` may be a bare host name (HTTPS is assumed) or a full
  /// `http(s)://` origin.
  ///
  /// # Errors
  ///
  /// Returns an error if the API key is empty, the host is not a valid URL
  /// origin, or the HTTP client cannot be built.
  pub fn new(api_key: &str, host: &str) -> Result<Self> {
    if api_key.is_empty() {
      return Err(Error::config(
        "An API key is needed. Either use the --apikey flag or run \"vt init\" to set up your API key",
      ));
    }
    let origin = if host.starts_with("http://") || host.starts_with("https://")
    {
      host.trim_end_matches('/').to_string()
    } else {
      format!("https://{host}")
    };
    let base = Url::parse(&format!("{origin}/api/v3/"))
      .map_err(|e| Error::config(format!("invalid host {host:?}: {e}")))?;
    let http = Client::builder()
      .user_agent(format!("vt-cli/{}", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self {
      http,
      base,
      api_key: api_key.to_string(),
    })
  }

  /// Resolves an endpoint path (optionally with query parameters) against
  /// the API base URL.
  ///
  /// # Errors
  ///
  /// Returns [`Error::Config`] if `path` cannot be joined to the base URL.
  pub fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let mut url = self
      .base
      .join(path)
      .map_err(|e| Error::config(format!("invalid endpoint {path:?}: {e}")))?;
    if !params.is_empty() {
      url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
  }

  async fn get(&self, url: Url, query: &[(&str, &str)]) -> Result<Vec<u8>> {
    debug!(%url, "GET");
    let resp = self
      .http
      .get(url)
      .query(query)
      .header(header::ACCEPT, "application/json")
      .header("x-apikey", &self.api_key)
      .send()
      .await?;
    let status = resp.status();
    let body = resp.bytes().await?;
    if status.is_success() {
      Ok(body.to_vec())
    } else {
      Err(decode_error(status, &body))
    }
  }
}

#[async_trait]
impl ObjectSource for ApiClient {
  async fn get_object(&self, path: &str) -> Result<Object> {
    let url = self.url(path, &[])?;
    decode_object(&self.get(url, &[]).await?)
  }
}

#[async_trait]
impl PageSource for ApiClient {
  async fn get_page(&self, req: PageRequest<'_>) -> Result<Page> {
    let limit = req.limit.to_string();
    let mut query = vec![("limit", limit.as_str())];
    if !req.cursor.is_empty() {
      query.push(("cursor", req.cursor));
    }
    if !req.filter.is_empty() {
      query.push(("filter", req.filter));
    }
    decode_page(&self.get(req.collection.clone(), &query).await?)
  }
}
