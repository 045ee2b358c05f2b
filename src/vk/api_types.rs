//! Serde types matching VK API response envelopes.
//!
//! Domain types live in `types.rs`; these only describe the wrapping the API
//! puts around them.

use serde::Deserialize;

use super::types::Group;

/// Every VK method answers with either `response` or `error`.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
  pub response: Option<T>,
  pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
  pub error_code: i64,
  #[serde(default)]
  pub error_msg: String,
}

/// `groups.getById` changed shape between API versions: older versions return
/// a bare array, newer ones wrap it in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiGroupsById {
  Wrapped { groups: Vec<Group> },
  Plain(Vec<Group>),
}

impl ApiGroupsById {
  pub fn into_groups(self) -> Vec<Group> {
    match self {
      ApiGroupsById::Wrapped { groups } => groups,
      ApiGroupsById::Plain(groups) => groups,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_groups_by_id_both_shapes() {
    let wrapped: ApiEnvelope<ApiGroupsById> =
      serde_json::from_str(r#"{"response":{"groups":[{"id":1,"name":"a"}],"profiles":[]}}"#)
        .unwrap();
    let plain: ApiEnvelope<ApiGroupsById> =
      serde_json::from_str(r#"{"response":[{"id":2,"name":"b"}]}"#).unwrap();

    assert_eq!(wrapped.response.unwrap().into_groups()[0].id, 1);
    assert_eq!(plain.response.unwrap().into_groups()[0].id, 2);
  }

  #[test]
  fn test_error_envelope() {
    let envelope: ApiEnvelope<ApiGroupsById> = serde_json::from_str(
      r#"{"error":{"error_code":5,"error_msg":"User authorization failed"}}"#,
    )
    .unwrap();
    assert!(envelope.response.is_none());
    assert_eq!(envelope.error.unwrap().error_code, 5);
  }
}
