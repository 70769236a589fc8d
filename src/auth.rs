use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

use crate::api::{VkClient, response_as};
use crate::types::{Identity, ProfileInfo, Session};

/// Verify the access token by asking who it belongs to.
///
/// Runs without the login gate since its purpose is establishing the login.
/// Returns a `Session` only when the profile carries a non-zero id.
pub async fn identity_check(client: &VkClient) -> Result<Option<Session>> {
    let Some(body) = client
        .call_unchecked("account.getProfileInfo", &json!({}))
        .await?
    else {
        return Ok(None);
    };

    let Some(profile) = response_as::<ProfileInfo>(&body) else {
        warn!("account.getProfileInfo returned no profile");
        return Ok(None);
    };

    let Some(id) = profile.id.filter(|&id| id != 0) else {
        warn!("account.getProfileInfo returned no user id");
        return Ok(None);
    };

    let user = Identity {
        id,
        first_name: profile.first_name,
        last_name: profile.last_name,
    };
    info!("Logged as {} {}", user.first_name, user.last_name);
    Ok(Some(Session::new(user)))
}
