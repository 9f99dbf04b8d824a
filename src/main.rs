use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storyline::app::AppContext;
use storyline::cli::{commands, Cli, Commands, SettingsAction};
use storyline::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let ctx = AppContext::new(config, cli.db)?;

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
        } => {
            commands::register(&ctx, &name, &email, &password).await?;
        }
        Commands::Login { email, password } => {
            commands::login(&ctx, &email, &password).await?;
        }
        Commands::Logout => {
            commands::logout(&ctx)?;
        }
        Commands::Whoami => {
            commands::whoami(&ctx)?;
        }
        Commands::Feed { refresh, more } => {
            commands::feed(&ctx, refresh, more).await?;
        }
        Commands::Show { id } => {
            commands::show(&ctx, &id).await?;
        }
        Commands::Upload {
            photo,
            description,
            lat,
            lon,
        } => {
            commands::upload(&ctx, &photo, &description, lat, lon).await?;
        }
        Commands::Map => {
            commands::map(&ctx).await?;
        }
        Commands::Settings { action } => match action {
            Some(SettingsAction::DarkMode { state }) => {
                commands::set_dark_mode(&ctx, state.enabled())?;
            }
            Some(SettingsAction::Language { code }) => {
                commands::set_language(&ctx, &code)?;
            }
            None => commands::print_settings(&ctx),
        },
    }

    Ok(())
}
