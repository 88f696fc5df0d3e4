use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use rmcp::ServiceExt;
use std::fs;
use std::path::{Path, PathBuf};

mod cli;

use cli::Cli;
use cli::commands::{CacheCommands, Commands};
use ticktick_mcp::api::TickTickClient;
use ticktick_mcp::cache;
use ticktick_mcp::config::Config;
use ticktick_mcp::format::markdown;
use ticktick_mcp::server::TickTickMcpServer;

fn setup_logging(config: &Config) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ticktick-mcp")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ticktick-mcp.log");

    // stdout belongs to the MCP transport
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = if std::env::var_os("RUST_LOG").is_some() {
        env_logger::Builder::from_default_env()
    } else {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(config.log_level.as_deref().unwrap_or("info"));
        builder
    };
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    if cli.is_verbose() {
        eprintln!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None | Some(Commands::Serve) => run_server(config).await,
        Some(Commands::Auth { port, no_browser }) => handle_auth_command(*port, *no_browser, config).await,
        Some(Commands::Login { username, password }) => {
            handle_login_command(username, password.as_deref(), config).await
        }
        Some(Commands::Logout) => handle_logout_command(config),
        Some(Commands::Status) => handle_status_command(config).await,
        Some(Commands::Cache { command }) => handle_cache_command(command, config).await,
        Some(Commands::Config) => handle_config_command(config),
    }
}

async fn run_server(config: &Config) -> Result<()> {
    info!("Starting MCP server '{}' on stdio", config.server.name);
    let server = TickTickMcpServer::from_config(config).context("Failed to initialize server")?;
    let service = server
        .serve(rmcp::transport::io::stdio())
        .await
        .context("Failed to start MCP transport")?;
    service.waiting().await?;
    info!("MCP server stopped");
    Ok(())
}

async fn handle_auth_command(port: u16, no_browser: bool, config: &Config) -> Result<()> {
    let (Some(client_id), Some(client_secret)) = (&config.oauth.client_id, &config.oauth.client_secret) else {
        return Err(eyre!(
            "OAuth client credentials missing: set TICKTICK_CLIENT_ID and TICKTICK_CLIENT_SECRET or oauth.client_id/client_secret in the config"
        ));
    };

    let client = TickTickClient::from_config(config)?;
    let redirect_uri = cli::callback_uri(port);
    let url = client.configure_oauth(client_id, client_secret, Some(&redirect_uri))?;

    println!("{}", "Authorize ticktick-mcp in your browser:".cyan());
    println!("  {}", url);
    if !no_browser {
        if let Err(e) = open::that(&url) {
            log::warn!("Failed to open browser: {}", e);
            println!("{}", "Could not open a browser; open the URL above manually.".yellow());
        }
    }

    println!("Waiting for the callback on {} ...", redirect_uri);
    let code = cli::wait_for_callback(port).await?;
    let token = client.exchange_code(&code).await.context("Failed to exchange authorization code")?;

    println!("{}", "OAuth authorization complete".green());
    if let Some(secs) = token.seconds_until_expiry() {
        println!("Token expires in {} days", secs / 86_400);
    }
    Ok(())
}

async fn handle_login_command(username: &str, password: Option<&str>, config: &Config) -> Result<()> {
    let password = password.ok_or_else(|| eyre!("Password required: pass --password or set TICKTICK_PASSWORD"))?;
    let client = TickTickClient::from_config(config)?;
    let session = client.login(username, password).await.context("Login failed")?;
    println!("{}", "Logged in".green());
    if let Some(inbox) = session.inbox_id {
        println!("Inbox: {}", inbox);
    }
    Ok(())
}

fn handle_logout_command(config: &Config) -> Result<()> {
    let client = TickTickClient::from_config(config)?;
    client.logout()?;
    println!("{}", "Stored credentials removed".green());
    Ok(())
}

async fn handle_status_command(config: &Config) -> Result<()> {
    let server = TickTickMcpServer::from_config(config)?;
    let status = server.services().client.auth_status();

    let yes_no = |ok: bool| if ok { "yes".green() } else { "no".red() };
    println!("{}", "Authentication".bold());
    println!("  authenticated:    {}", yes_no(status.is_authenticated));
    println!(
        "  api version:      {}",
        status.api_version.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
    );
    println!("  oauth configured: {}", yes_no(status.oauth_configured));
    println!("  v1 token:         {}", yes_no(status.oauth.is_some()));
    println!("  v2 session:       {}", yes_no(status.session.is_some()));
    if let Some(inbox) = &status.inbox_id {
        println!("  inbox:            {}", inbox);
    }

    let stats = server.services().cache.read().await.stats();
    println!("{}", "Cache".bold());
    println!("  path:         {}", stats.cache_path);
    println!("  entries:      {}", stats.total_entries);
    println!(
        "  last refresh: {}",
        stats
            .last_refresh
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    Ok(())
}

async fn handle_cache_command(command: &CacheCommands, config: &Config) -> Result<()> {
    let server = TickTickMcpServer::from_config(config)?;
    let services = server.services();

    match command {
        CacheCommands::Refresh => {
            let report = cache::refresh_shared(&services.cache, &services.tasks, services.tasks.concurrency())
                .await
                .context("Cache refresh failed")?;
            println!("{}", markdown::refresh_report(&report));
            if !report.failed_projects.is_empty() {
                println!("{}", "Some projects failed; their entries were kept".yellow());
            }
        }
        CacheCommands::Stats => {
            println!("{}", markdown::cache_stats(&services.cache.read().await.stats()));
        }
        CacheCommands::List => {
            let entries = services.cache.read().await.list();
            println!("{}", markdown::cache_entries(&entries, "Cached Tasks"));
        }
        CacheCommands::Search { query } => {
            let entries = services.cache.read().await.search(query);
            println!("{}", markdown::cache_entries(&entries, &format!("Cache search: {}", query)));
        }
        CacheCommands::Export { output } => {
            let csv = services.cache.read().await.export_csv()?;
            match output {
                Some(path) => {
                    fs::write(path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("{} {}", "Exported to".green(), path.display());
                }
                None => print!("{}", csv),
            }
        }
        CacheCommands::Import { file } => {
            let data = read_input(file)?;
            let imported = services.cache.write().await.import_csv(&data)?;
            println!("{} {} entries", "Imported".green(), imported);
        }
        CacheCommands::Clear => {
            let cleared = services.cache.write().await.clear()?;
            println!("{} {} entries", "Cleared".green(), cleared);
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn handle_config_command(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(&config.redacted()).context("Failed to render config")?;
    print!("{}", yaml);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(&config).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
