//! Remote API HTTP client
//!
//! Every API operation is a form-encoded POST of a `method` name plus its
//! arguments against a single endpoint. Uses synchronous HTTP (ureq) to be
//! executor-agnostic.

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::RemoteApi;
use super::api::{Envelope, KeyRef, UserRecord};
use crate::config::ApiCredentials;
use crate::error::SyncError;
use crate::models::{Key, KeyCategory, KeySet, RemoteObject, User};

/// Blocking client for the remote music-service API
pub struct HttpRemoteClient {
    agent: ureq::Agent,
    credentials: ApiCredentials,
}

impl HttpRemoteClient {
    /// Default per-request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Page size for listing calls
    const PAGE_SIZE: usize = 200;

    /// Field selector limiting listing results to bare keys
    const KEYS_ONLY: &'static str = "-*,key";

    /// Create a new client with the default timeout
    pub fn new(credentials: ApiCredentials) -> Self {
        Self::with_timeout(credentials, Self::DEFAULT_TIMEOUT)
    }

    /// Create a new client whose requests give up after `timeout`
    ///
    /// A request that times out fails with `SyncError::Canceled`.
    pub fn with_timeout(credentials: ApiCredentials, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
            credentials,
        }
    }

    /// Send an API method call and read its response envelope
    fn send(&self, method: &str, params: &[(&str, &str)]) -> Result<Envelope, ureq::Error> {
        let mut form: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 1);
        form.push(("method", method));
        form.extend_from_slice(params);

        let mut response = self
            .agent
            .post(&self.credentials.base_url)
            .header(
                "Authorization",
                &format!("Bearer {}", self.credentials.access_token),
            )
            .send_form(form)?;

        response.body_mut().read_json()
    }

    /// Unwrap a response envelope into its result
    fn unwrap_envelope(method: &str, envelope: Envelope) -> Result<Option<Value>, SyncError> {
        if envelope.status != "ok" {
            return Err(SyncError::connectivity(format!(
                "{} failed: {}",
                method,
                envelope.message.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        Ok(envelope.result)
    }

    /// Invoke an API method
    fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Option<Value>, SyncError> {
        let envelope = self
            .send(method, params)
            .map_err(|e| map_transport_error(method, e))?;
        Self::unwrap_envelope(method, envelope)
    }

    /// Deserialize a method result
    fn parse_result<T: DeserializeOwned>(
        method: &str,
        result: Option<Value>,
    ) -> Result<Option<T>, SyncError> {
        match result {
            None | Some(Value::Null) => Ok(None),
            Some(result) => serde_json::from_value(result).map(Some).map_err(|e| {
                SyncError::connectivity(format!("Failed to parse {} response: {}", method, e))
            }),
        }
    }

    /// Invoke a method and deserialize its result
    fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<T>, SyncError> {
        let result = self.call(method, params)?;
        Self::parse_result(method, result)
    }

    /// List ALL keys returned by a paged listing method
    fn list_keys_all(&self, method: &str, params: &[(&str, &str)]) -> Result<Vec<Key>, SyncError> {
        let mut keys = Vec::new();
        let count = Self::PAGE_SIZE.to_string();

        loop {
            let start = keys.len().to_string();
            let mut paged = params.to_vec();
            paged.push(("extras", Self::KEYS_ONLY));
            paged.push(("start", start.as_str()));
            paged.push(("count", count.as_str()));

            let page: Vec<KeyRef> = self.call_typed(method, &paged)?.unwrap_or_default();
            let page_len = page.len();
            keys.extend(page.into_iter().map(|r| Key::new(r.key)));

            debug!("{}: fetched {} keys ({} total)", method, page_len, keys.len());

            if page_len < Self::PAGE_SIZE {
                break;
            }
        }

        Ok(keys)
    }

    /// Listing method and extra arguments for a key category
    fn category_method(category: KeyCategory) -> (&'static str, Option<&'static str>) {
        match category {
            KeyCategory::Favorites => ("getFavorites", None),
            KeyCategory::Synced => ("getSynced", None),
            KeyCategory::OwnedPlaylists => ("getUserPlaylists", Some("owned")),
            KeyCategory::CollaborativePlaylists => ("getUserPlaylists", Some("collab")),
            KeyCategory::SubscribedPlaylists => ("getUserPlaylists", Some("subscribed")),
        }
    }
}

impl RemoteApi for HttpRemoteClient {
    fn resolve_user(&self, identifier: &str) -> Result<User, SyncError> {
        let record = if is_user_key(identifier) {
            let found: Option<HashMap<String, UserRecord>> =
                self.call_typed("get", &[("keys", identifier)])?;
            found.and_then(|mut map| map.remove(identifier))
        } else {
            match self.send("findUser", &[("vanityName", identifier)]) {
                Ok(envelope) => {
                    let result = Self::unwrap_envelope("findUser", envelope)?;
                    Self::parse_result::<UserRecord>("findUser", result)?
                }
                Err(ureq::Error::StatusCode(404)) => None,
                Err(e) => return Err(map_transport_error("findUser", e)),
            }
        };

        let record = record.ok_or_else(|| SyncError::user_not_found(identifier))?;
        let display_name = record.display_name();
        Ok(User::new(record.key, display_name))
    }

    fn get_user_keys(&self, user: &User) -> Result<KeySet, SyncError> {
        let mut key_set = KeySet::new();

        for category in KeyCategory::ALL {
            let (method, kind) = Self::category_method(category);
            let mut params = vec![("user", user.key.as_str())];
            if let Some(kind) = kind {
                params.push(("kind", kind));
            }

            let keys = self.list_keys_all(method, &params)?;
            key_set.entry(category).or_default().extend(keys);
        }

        Ok(key_set)
    }

    fn fetch_objects(&self, keys: &[Key]) -> Result<Vec<RemoteObject>, SyncError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let joined = keys.iter().map(Key::as_str).collect::<Vec<_>>().join(",");
        let found: Option<serde_json::Map<String, Value>> =
            self.call_typed("get", &[("keys", joined.as_str())])?;

        Ok(found
            .unwrap_or_default()
            .into_iter()
            .map(|(key, data)| RemoteObject::new(key, data))
            .collect())
    }

    fn get_following(&self, user: &User) -> Result<Vec<String>, SyncError> {
        let keys = self.list_keys_all("userFollowing", &[("user", user.key.as_str())])?;
        Ok(keys.into_iter().map(|k| k.0).collect())
    }
}

/// Map a transport failure onto the sync error taxonomy
fn map_transport_error(method: &str, error: ureq::Error) -> SyncError {
    match error {
        ureq::Error::Timeout(_) => SyncError::Canceled,
        ureq::Error::StatusCode(code) => {
            SyncError::connectivity(format!("{} failed with status {}", method, code))
        }
        other => SyncError::connectivity(format!("{} failed: {}", method, other)),
    }
}

/// User keys are an "s" followed by digits; anything else is a vanity name
fn is_user_key(identifier: &str) -> bool {
    identifier
        .strip_prefix('s')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::api::UserRecord;

    #[test]
    fn test_is_user_key() {
        assert!(is_user_key("s12345"));
        assert!(!is_user_key("s"));
        assert!(!is_user_key("alice"));
        assert!(!is_user_key("sam"));
    }

    #[test]
    fn test_user_record_display_name() {
        let record: UserRecord = serde_json::from_str(
            r#"{"key": "s1", "firstName": "Alice", "lastName": "Liddell", "vanityName": "alice"}"#,
        )
        .unwrap();
        assert_eq!(record.display_name(), "Alice Liddell");

        let record: UserRecord =
            serde_json::from_str(r#"{"key": "s1", "vanityName": "alice"}"#).unwrap();
        assert_eq!(record.display_name(), "alice");

        let record: UserRecord = serde_json::from_str(r#"{"key": "s1"}"#).unwrap();
        assert_eq!(record.display_name(), "s1");
    }

    #[test]
    fn test_status_code_maps_to_connectivity() {
        let err = map_transport_error("findUser", ureq::Error::StatusCode(500));
        assert!(matches!(err, SyncError::Connectivity { .. }));
        assert!(err.to_string().contains("status 500"));
    }

    #[test]
    fn test_category_methods() {
        assert_eq!(
            HttpRemoteClient::category_method(KeyCategory::CollaborativePlaylists),
            ("getUserPlaylists", Some("collab"))
        );
        assert_eq!(
            HttpRemoteClient::category_method(KeyCategory::Favorites),
            ("getFavorites", None)
        );
    }
}
