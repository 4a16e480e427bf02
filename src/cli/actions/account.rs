use anyhow::Result;

use super::{explain, require_session};
use crate::{
    api::{ProfileUpdate, Registration, User},
    cli::commands::account::Login,
    session::SessionContext,
};

fn describe(user: &User) -> String {
    let mut line = format!("{} <{}>", user.name, user.email);
    if let Some(role) = &user.role {
        line.push_str(&format!(" [{role}]"));
    }
    if let Some(location) = &user.location {
        line.push_str(&format!(", {location}"));
    }
    line
}

/// # Errors
/// Returns the server's message if the credentials are rejected.
pub async fn login(context: &SessionContext, args: Login) -> Result<()> {
    let user = context.login(&args.email, &args.password).await?;
    println!("Signed in as {}", describe(&user));
    Ok(())
}

/// # Errors
/// Returns the server's message if the account cannot be created.
pub async fn register(context: &SessionContext, registration: &Registration) -> Result<()> {
    let user = context.register(registration).await?;
    println!("Welcome to GreenVerse, {}", describe(&user));
    Ok(())
}

/// Clears the stored session and waits for the server to invalidate it.
///
/// # Errors
/// Never fails; the server call is best-effort.
pub async fn logout(context: &SessionContext) -> Result<()> {
    context.api().state().restore();
    context.logout();
    context.finish_logout().await;
    println!("Signed out");
    Ok(())
}

/// # Errors
/// Returns an error if there is no valid session.
pub async fn whoami(context: &SessionContext, route: &str) -> Result<()> {
    let user = require_session(context, route).await?;
    println!("{}", describe(&user));
    if let Some(bio) = user.bio.as_deref().filter(|bio| !bio.is_empty()) {
        println!("{bio}");
    }
    Ok(())
}

/// # Errors
/// Returns an error if there is no valid session or the update is rejected.
pub async fn profile(context: &SessionContext, route: &str, update: &ProfileUpdate) -> Result<()> {
    require_session(context, route).await?;
    let user = context.update_user(update).await.map_err(explain)?;
    println!("Profile updated: {}", describe(&user));
    Ok(())
}
