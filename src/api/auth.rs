//! Client wrappers for the `/users` auth endpoints. Login, register and logout
//! run without the refresh-and-retry; the profile endpoints use it. None of
//! these helpers touch session state; the session context decides what to
//! persist.

use secrecy::{ExposeSecret, SecretString};

use super::{
    types::{AuthPayload, Credentials, ProfilePayload, ProfileUpdate, Registration, User},
    ApiClient, ApiRequest, Error,
};

pub const LOGIN_PATH: &str = "/users/login";
pub const REGISTER_PATH: &str = "/users/register";
pub const LOGOUT_PATH: &str = "/users/logout";
pub const PROFILE_PATH: &str = "/users/profile";

/// Exchanges email and password for a fresh session.
///
/// # Errors
///
/// Returns [`Error::Api`] with the server's message on bad credentials.
pub async fn login(
    api: &ApiClient,
    email: &str,
    password: &SecretString,
) -> Result<AuthPayload, Error> {
    let request = ApiRequest::post(LOGIN_PATH)
        .json(&Credentials {
            email,
            password: password.expose_secret(),
        })?
        .without_retry();
    api.fetch(request).await
}

/// Creates an account and returns its first session.
///
/// # Errors
///
/// Returns [`Error::Api`] with the server's message, e.g. for a duplicate email.
pub async fn register(api: &ApiClient, registration: &Registration) -> Result<AuthPayload, Error> {
    let request = ApiRequest::post(REGISTER_PATH)
        .json(registration)?
        .without_retry();
    api.fetch(request).await
}

/// Invalidates `access_token` on the server.
///
/// # Errors
///
/// Returns any transport or API error; callers treat logout as best-effort.
pub async fn logout(api: &ApiClient, access_token: SecretString) -> Result<(), Error> {
    let request = ApiRequest::post(LOGOUT_PATH)
        .with_bearer(access_token)
        .without_retry();
    api.send::<serde_json::Value>(request).await.map(|_| ())
}

/// Fetches the profile of the current session.
///
/// # Errors
///
/// Returns [`Error::SessionExpired`] if the token could not be renewed.
pub async fn profile(api: &ApiClient) -> Result<User, Error> {
    let payload: ProfilePayload = api.fetch(ApiRequest::get(PROFILE_PATH)).await?;
    Ok(payload.user)
}

/// Updates profile fields and returns the server's copy of the profile.
///
/// # Errors
///
/// Returns [`Error::Api`] with the server's message on rejected updates.
pub async fn update_profile(api: &ApiClient, update: &ProfileUpdate) -> Result<User, Error> {
    let payload: ProfilePayload = api.fetch(ApiRequest::put(PROFILE_PATH).json(update)?).await?;
    Ok(payload.user)
}
