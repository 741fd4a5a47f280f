//! Discord front-end: slash commands over the movie search pipeline.

use log::{debug, error, info, warn};
use poise::{
    CreateReply, Framework, FrameworkError, FrameworkOptions, builtins,
    serenity_prelude::{ClientBuilder, CreateEmbed, GatewayIntents},
};

use crate::config::Config;
use crate::error::{BotError, Result};
use crate::format::{HELP_TEXT, history_message, movie_message, stats_message};
use crate::searcher::MovieSearcher;
use crate::types::MovieQuery;

/// Shared state handed to every command.
pub struct Data {
    searcher: MovieSearcher,
}

/// Context type for bot commands.
type Context<'a> = poise::Context<'a, Data, BotError>;

fn user_key(ctx: Context<'_>) -> String {
    ctx.author().id.to_string()
}

/// Find a movie and where to watch it.
#[poise::command(slash_command)]
pub async fn movie(
    ctx: Context<'_>,
    #[description = "Movie title to search for"] title: String,
) -> Result<()> {
    let query = MovieQuery::new(user_key(ctx), &title)?;

    ctx.defer().await?;

    let outcome = ctx.data().searcher.search(&query).await?;
    let content = movie_message(&outcome.movie, &outcome.reference, outcome.elapsed);

    let mut reply = CreateReply::default().content(content);
    if let Some(poster_url) = outcome.movie.poster_url.as_deref() {
        reply = reply.embed(CreateEmbed::new().image(poster_url));
    }

    ctx.send(reply).await?;
    info!(
        "Answered {} with {}",
        ctx.author().tag(),
        outcome.movie.canonical_title()
    );
    Ok(())
}

/// Show your recent searches.
#[poise::command(slash_command)]
pub async fn history(ctx: Context<'_>) -> Result<()> {
    let history = ctx.data().searcher.history(&user_key(ctx))?;
    ctx.say(history_message(&history)).await?;
    Ok(())
}

/// Show how often you searched each movie.
#[poise::command(slash_command)]
pub async fn stats(ctx: Context<'_>) -> Result<()> {
    let stats = ctx.data().searcher.stats(&user_key(ctx))?;
    ctx.say(stats_message(&stats)).await?;
    Ok(())
}

/// List the available commands.
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<()> {
    ctx.say(HELP_TEXT).await?;
    Ok(())
}

/// Get all bot commands.
#[must_use]
pub fn commands() -> Vec<poise::Command<Data, BotError>> {
    vec![movie(), history(), stats(), help()]
}

async fn on_error(error: FrameworkError<'_, Data, BotError>) {
    match error {
        FrameworkError::Command { error, ctx, .. } => {
            error!(
                "Command /{} failed for {}: {error}",
                ctx.command().name,
                ctx.author().tag()
            );
            if let Err(e) = ctx.say(error.user_message()).await {
                warn!("Failed to send error reply: {e}");
            }
        }
        other => {
            if let Err(e) = builtins::on_error(other).await {
                error!("Error while handling framework error: {e}");
            }
        }
    }
}

/// Run the Discord bot.
pub async fn run() -> Result<()> {
    info!("Initializing bot");
    let config = Config::from_env()?;

    debug!("Initializing movie searcher");
    let searcher = MovieSearcher::from_config(&config)?;

    let intents = GatewayIntents::non_privileged();

    debug!("Building framework");
    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: commands(),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready and connected to Discord");
                debug!("Registering commands globally");
                builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Commands registered successfully");
                Ok(Data { searcher })
            })
        })
        .build();

    debug!("Creating Discord client");
    let mut client = ClientBuilder::new(config.discord_token, intents)
        .framework(framework)
        .await?;

    info!("Starting Discord client");

    tokio::select! {
        result = client.start() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    Ok(())
}
