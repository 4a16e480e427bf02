use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::{explain, require_session};
use crate::{
    api::{resources, FilePart},
    cli::commands::content::{Notifications, Post, Posts},
    session::SessionContext,
};

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

async fn read_media(path: &Path) -> Result<FilePart> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("media path has no file name")?
        .to_string();

    debug!(file = %file_name, size = bytes.len(), "Attaching media");
    Ok(FilePart {
        field: "media".to_string(),
        file_name,
        mime: mime_for(path).map(str::to_string),
        bytes,
    })
}

/// # Errors
/// Returns an error if there is no valid session or the request fails.
pub async fn posts(context: &SessionContext, route: &str, args: Posts) -> Result<()> {
    require_session(context, route).await?;
    let posts = resources::list_posts(context.api(), args.category.as_deref())
        .await
        .map_err(explain)?;
    print_json(&posts)
}

/// # Errors
/// Returns an error if there is no valid session, a media file cannot be read,
/// or the server rejects the post.
pub async fn post(context: &SessionContext, route: &str, args: Post) -> Result<()> {
    require_session(context, route).await?;

    let mut media = Vec::with_capacity(args.media.len());
    for path in &args.media {
        media.push(read_media(path).await?);
    }

    let created = resources::create_post(
        context.api(),
        resources::NewPost {
            content: args.content,
            category: args.category,
            media,
            ..resources::NewPost::default()
        },
    )
    .await
    .map_err(explain)?;
    print_json(&created)
}

/// # Errors
/// Returns an error if there is no valid session or the request fails.
pub async fn notifications(
    context: &SessionContext,
    route: &str,
    args: Notifications,
) -> Result<()> {
    require_session(context, route).await?;
    let api = context.api();

    let result = match args {
        Notifications::List => resources::list_notifications(api).await,
        Notifications::MarkRead(id) => resources::mark_notification_read(api, &id).await,
        Notifications::MarkAllRead => resources::mark_all_notifications_read(api).await,
    }
    .map_err(explain)?;

    print_json(&result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for(Path::new("tray.PNG")), Some("image/png"));
        assert_eq!(mime_for(Path::new("clip.mov")), Some("video/quicktime"));
        assert_eq!(mime_for(Path::new("notes.txt")), None);
        assert_eq!(mime_for(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn media_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("basil.jpg");
        std::fs::write(&path, [0xff, 0xd8, 0xff]).unwrap();

        let part = read_media(&path).await.unwrap();
        assert_eq!(part.field, "media");
        assert_eq!(part.file_name, "basil.jpg");
        assert_eq!(part.mime.as_deref(), Some("image/jpeg"));
        assert_eq!(part.bytes, vec![0xff, 0xd8, 0xff]);

        assert!(read_media(&dir.path().join("missing.png")).await.is_err());
    }
}
