//! Content endpoints (posts, shop, groups, library, notifications).
//!
//! These are plain passthroughs: the payload schemas belong to the backend, so
//! responses are returned as the envelope's `data` in JSON form.

use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{body::FilePart, ApiClient, ApiRequest, Error, MultipartBody};

/// Category value meaning "no filter".
pub const ALL_CATEGORIES: &str = "All";

/// A new feed post. With media files attached it is sent as multipart,
/// otherwise as JSON.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewPost {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<String>,
    #[serde(skip)]
    pub media: Vec<FilePart>,
}

impl NewPost {
    fn into_request(self) -> Result<ApiRequest, Error> {
        if self.media.is_empty() {
            return ApiRequest::post("/posts").json(&self);
        }

        let mut body = MultipartBody::new().text("content", self.content);
        if let Some(category) = self.category {
            body = body.text("category", category);
        }
        for mut file in self.media {
            file.field = "media".to_string();
            body = body.file(file);
        }
        Ok(ApiRequest::post("/posts").multipart(body))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn posts_path(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(category) if !category.is_empty() && category != ALL_CATEGORIES => {
            let encoded: String = url::form_urlencoded::byte_serialize(category.as_bytes()).collect();
            format!("/posts?category={encoded}")
        }
        _ => "/posts".to_string(),
    }
}

/// `/{collection}/{id}` with `id` percent-encoded as a single path segment.
fn item_path(collection: &str, id: &str) -> Result<String, Error> {
    let invalid = || Error::Serialization(format!("invalid resource id: {id}"));
    let mut url = Url::parse("http://localhost/").map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .push(collection)
        .push(id);
    Ok(url.path().to_string())
}

async fn get(api: &ApiClient, path: String) -> Result<Value, Error> {
    api.fetch(ApiRequest::get(path)).await
}

async fn post_empty(api: &ApiClient, path: String) -> Result<Value, Error> {
    let envelope = api.send::<Value>(ApiRequest::post(path)).await?;
    Ok(envelope.data.unwrap_or(Value::Null))
}

async fn put_empty(api: &ApiClient, path: String) -> Result<Value, Error> {
    let envelope = api.send::<Value>(ApiRequest::put(path)).await?;
    Ok(envelope.data.unwrap_or(Value::Null))
}

/// Lists feed posts, optionally filtered by category.
///
/// # Errors
///
/// Returns the gateway error for the call.
pub async fn list_posts(api: &ApiClient, category: Option<&str>) -> Result<Value, Error> {
    get(api, posts_path(category)).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn post(api: &ApiClient, id: &str) -> Result<Value, Error> {
    get(api, item_path("posts", id)?).await
}

/// Publishes a post; media files go up as `media` multipart parts.
///
/// # Errors
///
/// Returns the gateway error for the call.
pub async fn create_post(api: &ApiClient, post: NewPost) -> Result<Value, Error> {
    let envelope = api.send::<Value>(post.into_request()?).await?;
    Ok(envelope.data.unwrap_or(Value::Null))
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn like_post(api: &ApiClient, id: &str) -> Result<Value, Error> {
    post_empty(api, format!("{}/like", item_path("posts", id)?)).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn comment_post(api: &ApiClient, id: &str, text: &str) -> Result<Value, Error> {
    let request = ApiRequest::post(format!("{}/comment", item_path("posts", id)?))
        .json(&serde_json::json!({ "text": text }))?;
    let envelope = api.send::<Value>(request).await?;
    Ok(envelope.data.unwrap_or(Value::Null))
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn list_products(api: &ApiClient) -> Result<Value, Error> {
    get(api, "/shop".to_string()).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn product(api: &ApiClient, id: &str) -> Result<Value, Error> {
    get(api, item_path("shop", id)?).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn list_groups(api: &ApiClient) -> Result<Value, Error> {
    get(api, "/groups".to_string()).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn group(api: &ApiClient, id: &str) -> Result<Value, Error> {
    get(api, item_path("groups", id)?).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn create_group(api: &ApiClient, group: &NewGroup) -> Result<Value, Error> {
    let envelope = api
        .send::<Value>(ApiRequest::post("/groups").json(group)?)
        .await?;
    Ok(envelope.data.unwrap_or(Value::Null))
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn join_group(api: &ApiClient, id: &str) -> Result<Value, Error> {
    post_empty(api, format!("{}/join", item_path("groups", id)?)).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn leave_group(api: &ApiClient, id: &str) -> Result<Value, Error> {
    post_empty(api, format!("{}/leave", item_path("groups", id)?)).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn list_library(api: &ApiClient) -> Result<Value, Error> {
    get(api, "/library".to_string()).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn library_item(api: &ApiClient, id: &str) -> Result<Value, Error> {
    get(api, item_path("library", id)?).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn list_notifications(api: &ApiClient) -> Result<Value, Error> {
    get(api, "/notifications".to_string()).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn mark_notification_read(api: &ApiClient, id: &str) -> Result<Value, Error> {
    put_empty(api, format!("{}/read", item_path("notifications", id)?)).await
}

/// # Errors
///
/// Returns the gateway error for the call.
pub async fn mark_all_notifications_read(api: &ApiClient) -> Result<Value, Error> {
    put_empty(api, "/notifications/read-all".to_string()).await
}
