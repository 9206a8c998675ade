use anyhow::Result;
use tappi::api::logging;
use tappi::app::App;
use tappi::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = Config::load()?;
    config.validate()?;

    let mut app = App::new(config)?;
    let result = app.run().await;
    drop(app);
    if let Err(error) = &result {
        tracing::error!(error = %format!("{error:#}"), "tappi exited with an error");
    }
    result
}
