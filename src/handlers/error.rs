use crate::commands::Data;
use crate::error::{MusicError, StoreError};
use crate::utils::embed;
use poise::serenity_prelude::CreateEmbed;

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Member-fixable rejections become a titled error embed. Anything else is
/// logged and answered with a generic message.
pub fn describe(error: &Error) -> Option<CreateEmbed> {
    let music = match error.downcast_ref::<StoreError>() {
        Some(StoreError::Rejected(e)) => Some(e),
        Some(_) => None,
        None => error.downcast_ref::<MusicError>(),
    }?;
    if !music.is_user_facing() {
        return None;
    }
    Some(embed::error(music.title(), &music.to_string()))
}

/// Handle framework errors
pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let embed = match describe(&error) {
                Some(embed) => {
                    tracing::debug!(command = %ctx.command().name, %error, "command rejected");
                    embed
                }
                None => {
                    tracing::error!(command = %ctx.command().name, ?error, "command failed");
                    embed::error(
                        "Command Failed",
                        "Something went wrong while running that command.",
                    )
                }
            };
            let reply = poise::CreateReply::default().embed(embed).ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                tracing::warn!(error = %e, "failed to report command error");
            }
        }
        poise::FrameworkError::CommandPanic { payload, ctx, .. } => {
            tracing::error!(command = %ctx.command().name, ?payload, "command panicked");
            let embed = embed::error(
                "Internal Error",
                "An unexpected error occurred. Please try again later.",
            );
            let _ = ctx.send(poise::CreateReply::default().embed(embed)).await;
        }
        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
            let message = match input {
                Some(input) => format!("Could not understand `{input}`: {error}"),
                None => error.to_string(),
            };
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .embed(embed::error("Invalid Argument", &message))
                        .ephemeral(true),
                )
                .await;
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                tracing::error!(error = %e, "error while handling error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;

    #[test]
    fn member_errors_are_described() {
        let error: Error = Box::new(MusicError::NothingPlaying);
        assert!(describe(&error).is_some());
    }

    #[test]
    fn rejected_store_writes_are_described() {
        let error: Error = Box::new(StoreError::Rejected(MusicError::NotFound));
        assert!(describe(&error).is_some());
    }

    #[test]
    fn internal_failures_stay_generic() {
        let node: Error = Box::new(MusicError::Node(NodeError::NoPlayer));
        assert!(describe(&node).is_none());

        let io: Error = Box::new(StoreError::Io(std::io::Error::other("disk")));
        assert!(describe(&io).is_none());

        let other: Error = "plain".into();
        assert!(describe(&other).is_none());
    }
}
