use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error};
use url::Url;

use crate::config::VkConfig;
use crate::poller::Wall;
use crate::types::{ApiError, Session, WallPage};
use crate::{TOKEN_EXPIRED_CODE, VK_API_VERSION};

/// Thin wrapper over the VK method-call protocol.
///
/// Every request carries `access_token` and `v` as query parameters, merged
/// with the caller's own. Remote errors are logged and collapse to `Ok(None)`;
/// only transport and decode failures surface as `Err`.
#[derive(Clone)]
pub struct VkClient {
    http: reqwest::Client,
    base: Url,
    token: String,
    login_url: String,
}

impl VkClient {
    pub fn new(config: &VkConfig) -> Result<Self> {
        if config.token.is_empty() || config.login_url.is_empty() {
            error!("No token or login url");
        }

        let mut base = config.api_base.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).with_context(|| format!("invalid api_base {base}"))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            token: config.token.clone(),
            login_url: config.login_url.clone(),
        })
    }

    /// Call `method` on behalf of a logged-in session.
    ///
    /// Without a session nothing is sent and `Ok(None)` is returned.
    pub async fn call(
        &self,
        session: Option<&Session>,
        method: &str,
        params: &Value,
    ) -> Result<Option<Value>> {
        if session.is_none() {
            error!("Can't call VK without login ({method})");
            return Ok(None);
        }
        self.call_unchecked(method, params).await
    }

    /// Call `method` without the login gate. Used to establish the login.
    pub async fn call_unchecked(&self, method: &str, params: &Value) -> Result<Option<Value>> {
        let url = self
            .base
            .join(method)
            .with_context(|| format!("invalid method name {method}"))?;

        debug!("POST {method}");
        let body: Value = self
            .http
            .post(url)
            .query(&self.query_pairs(params))
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?
            .json()
            .await
            .with_context(|| format!("{method} returned invalid JSON"))?;

        if let Some(err) = body.get("error") {
            self.report_error(method, err);
            return Ok(None);
        }

        Ok(Some(body))
    }

    fn report_error(&self, method: &str, err: &Value) {
        let err = ApiError::deserialize_lossy(err);
        if err.error_code == TOKEN_EXPIRED_CODE {
            error!("Old token, use url: {}", self.login_url);
        }
        error!("{method} failed: {} (code {})", err.error_msg, err.error_code);
    }

    /// Base parameters first; a caller key replaces a base key of the same name.
    fn query_pairs(&self, params: &Value) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("access_token".to_string(), self.token.clone()),
            ("v".to_string(), VK_API_VERSION.to_string()),
        ];

        let Some(extra) = params.as_object() else {
            return pairs;
        };

        for (key, value) in extra {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            match pairs.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value,
                None => pairs.push((key.clone(), value)),
            }
        }
        pairs
    }
}

impl ApiError {
    fn deserialize_lossy(err: &Value) -> Self {
        Self::deserialize(err).unwrap_or_else(|_| Self {
            error_code: 0,
            error_msg: err.to_string(),
        })
    }
}

/// Destructure the `response` payload of a successful call into `T`.
pub fn response_as<T: DeserializeOwned>(body: &Value) -> Option<T> {
    let payload = body.get("response")?;
    match T::deserialize(payload) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!("Unexpected response shape: {e}");
            None
        }
    }
}

/// The group wall, posted to as the group itself.
pub struct VkWall {
    client: VkClient,
    session: Session,
    group_id: i64,
}

impl VkWall {
    pub fn new(client: VkClient, session: Session, group_id: i64) -> Self {
        Self {
            client,
            session,
            group_id,
        }
    }
}

#[async_trait]
impl Wall for VkWall {
    async fn latest_post_date(&self) -> Result<Option<i64>> {
        let body = self
            .client
            .call(
                Some(&self.session),
                "wall.get",
                &json!({
                    "owner_id": -self.group_id,
                    "count": 1,
                    "extended": 0,
                }),
            )
            .await?;

        Ok(body
            .as_ref()
            .and_then(response_as::<WallPage>)
            .and_then(|page| page.items.first().and_then(|post| post.date)))
    }

    async fn post(&self, message: &str) -> Result<bool> {
        let body = self
            .client
            .call(
                Some(&self.session),
                "wall.post",
                &json!({
                    "owner_id": -self.group_id,
                    "friends_only": 0,
                    "from_group": 1,
                    "message": message,
                }),
            )
            .await?;
        Ok(body.is_some())
    }
}
