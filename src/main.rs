use lavalink_rs::client::LavalinkClient;
use lavalink_rs::model::client::NodeDistributionStrategy;
use lavalink_rs::node::NodeBuilder;
use serenity::all::{ActivityData, GatewayIntents};
use songbird::SerenityInit;
use std::collections::HashSet;
use std::sync::Arc;
use tempo::commands::{self, Data};
use tempo::config::Config;
use tempo::error::BotError;
use tempo::handlers::{handle_event, lavalink_events, on_error};
use tempo::repository::PlaylistStore;
use tempo::services::lyrics::LrclibLyrics;
use tempo::services::music::MusicPlayer;
use tempo::services::music::autoplay::MixRecommender;
use tempo::services::music::display::SerenityDisplay;
use tempo::services::music::lavalink::{ClientData, LavalinkNode};
use tempo::services::music::session::SessionDeps;
use tempo::utils::image::HttpArtworkProbe;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BotError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tempo=debug")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(lavalink = %config.lavalink_address(), "starting tempo");

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES;

    let owners: HashSet<_> = config.owner_id.into_iter().collect();

    // Voice state updates must reach songbird before the node can connect.
    let songbird = songbird::Songbird::serenity();
    let songbird_for_data = songbird.clone();
    let setup_config = config.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            owners,
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("!".into()),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| {
                Box::pin(handle_event(ctx, event, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let config = setup_config;
            let songbird = songbird_for_data;
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!(count = framework.options().commands.len(), "registered commands");

                let (signals, signal_rx) = mpsc::unbounded_channel();
                let events = lavalink_events();
                let node = NodeBuilder {
                    hostname: config.lavalink_address(),
                    password: config.lavalink_password.clone(),
                    user_id: ready.user.id.get().into(),
                    session_id: None,
                    is_ssl: config.lavalink_ssl,
                    events: events.clone().into(),
                };
                let client = LavalinkClient::new_with_data(
                    events,
                    vec![node],
                    NodeDistributionStrategy::round_robin(),
                    Arc::new(ClientData { signals }),
                )
                .await;
                let node = Arc::new(LavalinkNode::new(client));
                tracing::info!("lavalink client ready");

                let deps = SessionDeps {
                    node: node.clone(),
                    sink: Arc::new(SerenityDisplay::new(ctx.http.clone())),
                    recommender: config
                        .autoplay_enabled
                        .then(|| Arc::new(MixRecommender::new(node.clone())) as _),
                    lyrics: config
                        .lyrics_api_url
                        .as_ref()
                        .map(|url| Arc::new(LrclibLyrics::new(url.clone())) as _),
                    artwork: Some(Arc::new(HttpArtworkProbe::default())),
                };
                if deps.recommender.is_none() {
                    tracing::warn!("autoplay disabled");
                }
                if deps.lyrics.is_none() {
                    tracing::warn!("lyrics disabled");
                }

                let music_player = MusicPlayer::new(deps);
                music_player.spawn_router(signal_rx);

                let playlists = Arc::new(PlaylistStore::new(config.playlist_dir.clone()));
                tracing::info!(dir = %config.playlist_dir.display(), "playlist store ready");

                ctx.set_activity(Some(ActivityData::listening("/play")));

                Ok(Data {
                    music_player,
                    node,
                    songbird,
                    playlists,
                })
            })
        })
        .build();

    let mut client = serenity::Client::builder(&config.token, intents)
        .framework(framework)
        .register_songbird_with(songbird)
        .await
        .map_err(|e| BotError::Client(format!("Failed to create client: {}", e)))?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client
        .start()
        .await
        .map_err(|e| BotError::Client(format!("Failed to run client: {}", e)))?;

    Ok(())
}
