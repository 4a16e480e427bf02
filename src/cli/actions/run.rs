use crate::cli::actions::{account, content, Action, Task};
use anyhow::Result;
use tracing::debug;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    let Action { globals, task } = action;
    debug!(?globals, route = task.route(), "Running command");

    let context = globals.open_session()?;
    let route = task.route();

    match task {
        Task::Login(args) => account::login(&context, args).await,
        Task::Register(registration) => account::register(&context, &registration).await,
        Task::Logout => account::logout(&context).await,
        Task::WhoAmI => account::whoami(&context, route).await,
        Task::Profile(update) => account::profile(&context, route, &update).await,
        Task::Posts(args) => content::posts(&context, route, args).await,
        Task::Post(args) => content::post(&context, route, args).await,
        Task::Notifications(args) => content::notifications(&context, route, args).await,
    }
}
