use clap::Parser;
use migration::{Migrator, MigratorTrait};
use miette::{IntoDiagnostic, Result};
use postern::{settings, storage, web};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "postern",
    version,
    about = "Email OTP signup/signin service"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings; the struct holds secrets, so log the source instead
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(config = %cli.config, "Loaded configuration");
    if settings.auth.token_secret == settings::DEV_TOKEN_SECRET {
        tracing::warn!(
            "auth.token_secret is the built-in development value; set POSTERN__AUTH__TOKEN_SECRET before deploying"
        );
    }

    // init storage (database) and bring the schema up to date
    let db = storage::init(&settings.database).await?;
    Migrator::up(&db, None).await.into_diagnostic()?;

    // start web server
    web::serve(settings, db).await?;
    Ok(())
}
