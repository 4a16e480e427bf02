use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

use crate::api::resources::ALL_CATEGORIES;

pub const CMD_POSTS: &str = "posts";
pub const CMD_POST: &str = "post";
pub const CMD_NOTIFICATIONS: &str = "notifications";

pub const ARG_CATEGORY: &str = "category";
pub const ARG_CONTENT: &str = "content";
pub const ARG_MEDIA: &str = "media";
pub const ARG_MARK_ALL_READ: &str = "mark-all-read";
pub const ARG_MARK_READ: &str = "mark-read";

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(
            Command::new(CMD_POSTS).about("List feed posts").arg(
                Arg::new(ARG_CATEGORY)
                    .short('c')
                    .long("category")
                    .help("Only show posts in this category")
                    .default_value(ALL_CATEGORIES),
            ),
        )
        .subcommand(
            Command::new(CMD_POST)
                .about("Publish a post")
                .arg(
                    Arg::new(ARG_CONTENT)
                        .help("Post text")
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_CATEGORY)
                        .short('c')
                        .long("category")
                        .help("Post category"),
                )
                .arg(
                    Arg::new(ARG_MEDIA)
                        .short('m')
                        .long("media")
                        .help("Image or video file to attach (repeatable)")
                        .action(ArgAction::Append)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new(CMD_NOTIFICATIONS)
                .about("List notifications")
                .arg(
                    Arg::new(ARG_MARK_ALL_READ)
                        .long("mark-all-read")
                        .help("Mark every notification as read")
                        .action(ArgAction::SetTrue)
                        .conflicts_with(ARG_MARK_READ),
                )
                .arg(
                    Arg::new(ARG_MARK_READ)
                        .long("mark-read")
                        .value_name("ID")
                        .help("Mark one notification as read"),
                ),
        )
}

#[derive(Debug)]
pub struct Posts {
    pub category: Option<String>,
}

impl Posts {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            category: matches.get_one::<String>(ARG_CATEGORY).cloned(),
        }
    }
}

#[derive(Debug)]
pub struct Post {
    pub content: String,
    pub category: Option<String>,
    pub media: Vec<PathBuf>,
}

impl Post {
    /// # Errors
    /// Returns an error if the post text is empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let content = matches
            .get_one::<String>(ARG_CONTENT)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("post text must not be empty"))?;

        Ok(Self {
            content,
            category: matches
                .get_one::<String>(ARG_CATEGORY)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            media: matches
                .get_many::<PathBuf>(ARG_MEDIA)
                .map(|paths| paths.cloned().collect())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Notifications {
    List,
    MarkRead(String),
    MarkAllRead,
}

impl Notifications {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        if matches.get_flag(ARG_MARK_ALL_READ) {
            Self::MarkAllRead
        } else if let Some(id) = matches.get_one::<String>(ARG_MARK_READ) {
            Self::MarkRead(id.clone())
        } else {
            Self::List
        }
    }
}
