pub mod account;
pub mod content;

// Internal "interpreter" for `Action`.
mod run;

use anyhow::{anyhow, bail, Result};

use crate::{
    api::{Error, ProfileUpdate, Registration, User},
    cli::{
        commands::{
            account::Login,
            content::{Notifications, Post, Posts},
        },
        globals::GlobalArgs,
    },
    session::{GuardDecision, RouteGuard, SessionContext},
};

#[derive(Debug)]
pub enum Task {
    Login(Login),
    Register(Registration),
    Logout,
    WhoAmI,
    Profile(ProfileUpdate),
    Posts(Posts),
    Post(Post),
    Notifications(Notifications),
}

impl Task {
    /// Route the command stands in for; protected commands are checked
    /// against the route guard with it.
    #[must_use]
    pub fn route(&self) -> &'static str {
        match self {
            Task::Login(_) | Task::Logout => "/login",
            Task::Register(_) => "/register",
            Task::WhoAmI | Task::Profile(_) => "/profile",
            Task::Posts(_) | Task::Post(_) => "/feed",
            Task::Notifications(_) => "/notifications",
        }
    }
}

#[derive(Debug)]
pub struct Action {
    pub globals: GlobalArgs,
    pub task: Task,
}

impl Action {
    #[must_use]
    pub fn new(globals: GlobalArgs, task: Task) -> Self {
        Self { globals, task }
    }

    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}

/// Verifies the stored session and returns its user, or explains how to sign
/// in when the route guard would redirect.
///
/// # Errors
/// Returns an error if there is no usable session.
pub async fn require_session(context: &SessionContext, route: &str) -> Result<User> {
    context.initialize().await;
    let snapshot = context.settled().await;
    let guard = RouteGuard::new(context.api().config().login_path.clone());

    match guard.check(&snapshot, route) {
        GuardDecision::Render => snapshot
            .user
            .ok_or_else(|| anyhow!("session has no profile")),
        decision @ GuardDecision::Redirect { .. } => {
            bail!(
                "Not signed in. Run `greenverse login` first ({}).",
                decision.location().unwrap_or_default()
            )
        }
        GuardDecision::Loading => bail!("Session could not be verified, try again"),
    }
}

/// Turns an expired session into a sign-in hint; other errors pass through
/// with the server's message.
pub fn explain(err: Error) -> anyhow::Error {
    if matches!(err, Error::SessionExpired) {
        anyhow!("Your session has expired. Run `greenverse login` to sign in again.")
    } else {
        anyhow::Error::new(err)
    }
}
