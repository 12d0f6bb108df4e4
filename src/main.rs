use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use spotify_nowplaying::{Config, NowPlayingClient, NowPlayingPoller, TrackSnapshot};

#[derive(Parser)]
#[command(name = "spotify-nowplaying")]
#[command(about = "Show and control what you are currently playing on Spotify")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Spotify authorization URL
    AuthUrl,

    /// Exchange an authorization code for tokens
    Login {
        /// The URL Spotify redirected you to, or just its `code` value
        redirect: String,
    },

    /// Show the currently playing track once
    NowPlaying,

    /// Keep showing the currently playing track until Ctrl-C
    Watch {
        /// Authorization code to exchange before polling starts
        #[arg(long)]
        code: Option<String>,
    },

    /// Pause if playing, otherwise resume
    Toggle,

    /// Show whether a Spotify access token is stored
    Status,

    /// Forget the stored Spotify tokens
    Logout,

    /// Show setup guide
    Setup,
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    match cli.command {
        Commands::AuthUrl => auth_url()?,
        Commands::Login { redirect } => login(&redirect).await?,
        Commands::NowPlaying => now_playing().await?,
        Commands::Watch { code } => watch(code.as_deref()).await?,
        Commands::Toggle => toggle().await?,
        Commands::Status => status()?,
        Commands::Logout => logout()?,
        Commands::Setup => show_setup_guide(),
    }

    Ok(())
}

fn load_client() -> Result<(Config, NowPlayingClient)> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let missing = config.get_missing_config();
    if !missing.is_empty() {
        println!("{}", "Missing configuration:".red());
        for item in &missing {
            println!("   - {}", item);
        }
        println!(
            "\n{}",
            "Please create a .env file with your Spotify credentials (see `setup`).".yellow()
        );
        std::process::exit(1);
    }

    let client = NowPlayingClient::with_file_store(&config)
        .context("Failed to open the Spotify token store")?;

    Ok((config, client))
}

fn require_login(client: &NowPlayingClient) {
    if !client.is_authenticated() {
        println!("{}", "Not logged in to Spotify".red());
        println!("Run `spotify-nowplaying auth-url`, then `spotify-nowplaying login <redirect-url>`.");
        std::process::exit(1);
    }
}

fn auth_url() -> Result<()> {
    let (_, client) = load_client()?;
    let request = client
        .authorization_request()
        .context("Failed to build authorization URL")?;

    println!("\nOpen this URL in your browser to authorize Spotify:");
    println!("{}\n", request.url);
    println!("State: {}", request.state.cyan());

    Ok(())
}

async fn login(redirect: &str) -> Result<()> {
    let (_, client) = load_client()?;

    let Some(code) = NowPlayingClient::parse_response_code(redirect) else {
        println!("{}", "No authorization code found in input".red());
        std::process::exit(1);
    };

    if client.exchange_code_for_token(&code).await {
        println!("{}", "Logged in to Spotify".green());
    } else {
        println!("{}", "Token exchange failed".red());
        std::process::exit(1);
    }

    Ok(())
}

async fn now_playing() -> Result<()> {
    let (_, client) = load_client()?;
    require_login(&client);

    let track = client
        .currently_playing()
        .await
        .unwrap_or_else(TrackSnapshot::nothing_playing);
    print_track(&track);

    Ok(())
}

async fn watch(code: Option<&str>) -> Result<()> {
    let (config, client) = load_client()?;
    let poller = NowPlayingPoller::new(Arc::new(client), config.poll_interval);

    if !poller.bootstrap(code).await {
        println!("{}", "Not logged in to Spotify".red());
        std::process::exit(1);
    }

    println!("{}", "Now Playing".cyan().bold());
    println!("{}", "=".repeat(50));

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} {msg}\n  [{bar:40.green/white}]")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
    };

    poller
        .run(
            |track| {
                pb.set_prefix(Local::now().format("%H:%M:%S").to_string());
                pb.set_length(track.duration_ms);
                pb.set_position(track.progress_ms.min(track.duration_ms));
                pb.set_message(format!(
                    "{} {} - {} ({})",
                    if track.is_playing { ">" } else { "||" },
                    track.title,
                    track.artist_name,
                    track.progress_label()
                ));
            },
            shutdown,
        )
        .await;

    pb.finish_and_clear();
    Ok(())
}

async fn toggle() -> Result<()> {
    let (_, client) = load_client()?;
    require_login(&client);

    if client.toggle_playback().await {
        println!("{}", "Playback toggled".green());
    } else {
        println!("{}", "Failed to toggle playback".red());
        std::process::exit(1);
    }

    Ok(())
}

fn status() -> Result<()> {
    let (config, client) = load_client()?;

    if client.is_authenticated() {
        println!("{}", "Logged in to Spotify".green());
    } else {
        println!("{}", "Not logged in to Spotify".yellow());
    }
    println!("Token file: {}", config.token_file.display());

    Ok(())
}

fn logout() -> Result<()> {
    let (_, client) = load_client()?;
    client.logout();
    println!("{}", "Logged out of Spotify".green());
    Ok(())
}

fn print_track(track: &TrackSnapshot) {
    if track.is_nothing_playing() {
        println!("{}", track.title.yellow());
        return;
    }

    let state = if track.is_playing {
        "Playing".green()
    } else {
        "Paused".yellow()
    };

    println!("{} {}", state, track.title.bold());
    println!("   {}", track.artist_name.cyan());
    println!("   {}", track.progress_label());
    if !track.artwork_url.is_empty() {
        println!("   {}", track.artwork_url.dimmed());
    }
}

fn show_setup_guide() {
    println!("{}", "Spotify Now Playing Setup Guide".cyan().bold());
    println!("{}", "=".repeat(50));

    println!("\n{}", "1. Spotify API Setup".yellow());
    println!("   - Go to https://developer.spotify.com/dashboard/");
    println!("   - Create a new app");
    println!("   - Copy your Client ID and Client Secret");
    println!("   - Add 'http://localhost:5173/callback' as a redirect URI");

    println!("\n{}", "2. Configuration".yellow());
    println!("   - Create a .env file with:");
    println!("     SPOTIFY_CLIENT_ID=your_spotify_client_id");
    println!("     SPOTIFY_CLIENT_SECRET=your_spotify_client_secret");
    println!("     SPOTIFY_REDIRECT_URI=http://localhost:5173/callback");
    println!("   - Optional: SPOTIFY_TOKEN_FILE, SPOTIFY_HTTP_TIMEOUT_SECS, SPOTIFY_POLL_INTERVAL_SECS");

    println!("\n{}", "3. Usage".yellow());
    println!("   - spotify-nowplaying auth-url               (open the printed URL)");
    println!("   - spotify-nowplaying login <redirect-url>   (store your tokens)");
    println!("   - spotify-nowplaying now-playing            (show the current track)");
    println!("   - spotify-nowplaying watch                  (refresh every 5 seconds)");
    println!("   - spotify-nowplaying toggle                 (play/pause)");

    println!("\n{}", "Ready to listen!".green());
}
