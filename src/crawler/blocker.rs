//! The block action

use crate::crawler::endpoints::Endpoints;
use crate::crawler::transport::{Cancelled, Transport};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

/// Blocks `user_id` on behalf of the session
///
/// # Returns
///
/// * `Ok(true)` - The platform confirmed the block
/// * `Ok(false)` - The request failed; the failure was logged
/// * `Err(Cancelled)` - The run was cancelled before the block completed
pub async fn block_user(
    transport: &Transport,
    endpoints: &Endpoints,
    user_id: &str,
    cancel: &CancellationToken,
) -> Result<bool, Cancelled> {
    let body = Endpoints::block_body(user_id);
    let response = transport
        .request(Method::POST, endpoints.block_user(), Some(body), cancel)
        .await?;
    Ok(response.is_some())
}
