#[tokio::main]
async fn main() -> cinebot::error::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("cinebot=info,serenity=warn"),
    )
    .init();
    log::info!("Starting cinebot Discord bot");

    match cinebot::run().await {
        Ok(()) => {
            log::info!("Bot shut down successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Bot encountered an error: {e}");
            Err(e)
        }
    }
}
