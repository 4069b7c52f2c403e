use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use tokio_util::sync::CancellationToken;
use weather_core::{Config, WeatherRecord, WeatherService, config::SUPPORTED_UNITS};

use crate::server;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Cached current-weather service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the provider API key and settings in the config file.
    Configure,

    /// Show current weather for a city.
    Show {
        /// City name, e.g. "London" or "Porto Alegre".
        city: String,
    },

    /// Run the HTTP service.
    Serve {
        /// Address to listen on; overrides `server.bind` from the config.
        #[arg(long)]
        bind: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city } => show(&city).await,
            Command::Serve { bind } => {
                let mut config = load_validated()?;
                if let Some(bind) = bind {
                    config.server.bind = bind;
                }
                let service = WeatherService::from_config(&config)?;
                server::serve(&config, service).await
            }
        }
    }
}

fn load_validated() -> Result<Config> {
    let config = Config::load()?;
    config.validate()?;
    Ok(config)
}

fn configure() -> Result<()> {
    let mut config = Config::load_file()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let base_url = Text::new("Provider base URL:")
        .with_default(&config.provider.base_url)
        .prompt()
        .context("Failed to read base URL")?;

    let current = SUPPORTED_UNITS
        .iter()
        .position(|u| *u == config.provider.units)
        .unwrap_or(1);
    let units = Select::new("Units:", SUPPORTED_UNITS.to_vec())
        .with_starting_cursor(current)
        .prompt()
        .context("Failed to read units")?;

    config.provider.api_key = api_key.trim().to_string();
    config.provider.base_url = base_url.trim().to_string();
    config.provider.units = units.to_string();
    config.validate()?;
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(city: &str) -> Result<()> {
    let config = load_validated()?;
    let service = WeatherService::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let record = service.get_current_weather(city, &cancel).await?;
    println!("{}", render(&record, &config.provider.units));
    Ok(())
}

fn render(record: &WeatherRecord, units: &str) -> String {
    let suffix = match units {
        "imperial" => "°F",
        "standard" => " K",
        _ => "°C",
    };
    let conditions = if record.conditions.is_empty() {
        "unknown".to_string()
    } else {
        record.conditions.join(", ")
    };

    format!(
        "{}\n  Temperature: {:.1}{suffix} (feels like {:.1}{suffix})\n  Humidity:    {}%\n  Conditions:  {conditions}",
        record.city_name, record.temperature, record.feels_like, record.humidity,
    )
}
