use crate::config::{ApiConfig, Config};
use crate::vk::api_types::{ApiEnvelope, ApiGroupsById};
use crate::vk::directory::RemoteDirectory;
use crate::vk::group_ref::GroupRef;
use crate::vk::types::{Album, Counters, Group, Page};
use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use url::Url;

/// Most ids `groups.getById` accepts in a single call
const MAX_IDS_PER_CALL: usize = 500;

/// Fields requested for every resolved group
const GROUP_FIELDS: &str = "is_member,members_count,activity,photo_max_orig,ban_info";

/// VK API client wrapper
#[derive(Clone)]
pub struct VkClient {
  http: reqwest::Client,
  base_url: Url,
  version: String,
  token: String,
}

impl VkClient {
  pub fn new(api: &ApiConfig) -> Result<Self> {
    let token = Config::get_access_token()?;
    Self::with_token(api, token)
  }

  pub fn with_token(api: &ApiConfig, token: String) -> Result<Self> {
    // Url::join drops the last segment unless the base ends with a slash
    let mut base = api.url.trim_end_matches('/').to_string();
    base.push('/');
    let base_url = Url::parse(&base).map_err(|e| eyre!("Invalid API url {}: {}", api.url, e))?;

    let http = reqwest::Client::builder()
      .gzip(true)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      version: api.version.clone(),
      token,
    })
  }

  /// Call an API method and unwrap its response envelope
  async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
    let url = self
      .base_url
      .join(method)
      .map_err(|e| eyre!("Invalid method {}: {}", method, e))?;

    tracing::debug!(method, "calling VK API");

    let mut form: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
    form.push(("access_token", &self.token));
    form.push(("v", &self.version));

    let envelope: ApiEnvelope<T> = self
      .http
      .post(url)
      .form(&form)
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", method, e))?
      .error_for_status()
      .map_err(|e| eyre!("Request to {} failed: {}", method, e))?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse {} response: {}", method, e))?;

    match (envelope.response, envelope.error) {
      (_, Some(error)) => Err(eyre!(
        "VK API error {} in {}: {}",
        error.error_code,
        method,
        error.error_msg
      )),
      (Some(response), None) => Ok(response),
      (None, None) => Err(eyre!("Empty response from {}", method)),
    }
  }
}

#[async_trait]
impl RemoteDirectory for VkClient {
  async fn groups_by_refs(&self, refs: &[GroupRef]) -> Result<Vec<Group>> {
    let mut groups = Vec::with_capacity(refs.len());

    for chunk in refs.chunks(MAX_IDS_PER_CALL) {
      let ids = chunk
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

      let response: ApiGroupsById = self
        .call(
          "groups.getById",
          &[("group_ids", ids), ("fields", GROUP_FIELDS.to_string())],
        )
        .await?;
      groups.extend(response.into_groups());
    }

    Ok(groups)
  }

  async fn group_counters(&self, group_id: u64) -> Result<Counters> {
    let response: ApiGroupsById = self
      .call(
        "groups.getById",
        &[
          ("group_id", group_id.to_string()),
          ("fields", "counters".to_string()),
        ],
      )
      .await?;

    Ok(
      response
        .into_groups()
        .into_iter()
        .next()
        .and_then(|group| group.counters)
        .unwrap_or_default(),
    )
  }

  async fn albums(&self, owner_id: i64, offset: usize, count: usize) -> Result<Page<Album>> {
    self
      .call(
        "photos.getAlbums",
        &[
          ("owner_id", owner_id.to_string()),
          ("offset", offset.to_string()),
          ("count", count.to_string()),
          ("need_covers", "1".to_string()),
        ],
      )
      .await
  }

  async fn user_groups(&self, offset: usize, count: usize) -> Result<Page<Group>> {
    self
      .call(
        "groups.get",
        &[
          ("extended", "1".to_string()),
          ("offset", offset.to_string()),
          ("count", count.to_string()),
          ("fields", GROUP_FIELDS.to_string()),
        ],
      )
      .await
  }
}
