//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - serve: run the MCP server on stdio (default)
//! - auth / login / logout / status: credential management
//! - cache: inspect and maintain the local task cache
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ticktick-mcp - MCP server for TickTick with a local task cache
#[derive(Parser, Debug)]
#[command(name = "ticktick-mcp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the MCP server on stdio
    Serve,

    /// Authorize the official API through the OAuth browser flow
    Auth {
        /// Local port for the OAuth callback
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Sign in with username and password for the v2 API
    Login {
        /// Account email or username
        #[arg(short, long)]
        username: String,

        /// Password (read from TICKTICK_PASSWORD when omitted)
        #[arg(short, long, env = "TICKTICK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget stored credentials
    Logout,

    /// Show authentication and cache status
    Status,

    /// Local task cache management
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Print the effective configuration (secrets masked)
    Config,
}

/// Cache subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CacheCommands {
    /// Rebuild the cache from every project
    Refresh,

    /// Show cache statistics
    Stats,

    /// List cached tasks
    List,

    /// Search cached task titles
    Search {
        /// Text to look for
        query: String,
    },

    /// Export the cache as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import cache entries from a CSV file
    Import {
        /// CSV file to read
        file: PathBuf,
    },

    /// Remove every cached entry
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_no_args() {
        // No args means serve
        let cli = Cli::try_parse_from(["ticktick-mcp"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["ticktick-mcp", "-v"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["ticktick-mcp", "-c", "/path/to/ticktick-mcp.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/ticktick-mcp.yml")));
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::try_parse_from(["ticktick-mcp", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve)));
    }

    #[test]
    fn test_auth_defaults() {
        let cli = Cli::try_parse_from(["ticktick-mcp", "auth"]).unwrap();
        match cli.command {
            Some(Commands::Auth { port, no_browser }) => {
                assert_eq!(port, 8080);
                assert!(!no_browser);
            }
            _ => panic!("Expected auth command"),
        }
    }

    #[test]
    fn test_auth_with_port() {
        let cli = Cli::try_parse_from(["ticktick-mcp", "auth", "--port", "9000", "--no-browser"]).unwrap();
        match cli.command {
            Some(Commands::Auth { port, no_browser }) => {
                assert_eq!(port, 9000);
                assert!(no_browser);
            }
            _ => panic!("Expected auth command"),
        }
    }

    #[test]
    fn test_login_command() {
        let cli =
            Cli::try_parse_from(["ticktick-mcp", "login", "-u", "me@example.com", "-p", "secret"]).unwrap();
        match cli.command {
            Some(Commands::Login { username, password }) => {
                assert_eq!(username, "me@example.com");
                assert_eq!(password.as_deref(), Some("secret"));
            }
            _ => panic!("Expected login command"),
        }
    }

    #[test]
    fn test_login_requires_username() {
        assert!(Cli::try_parse_from(["ticktick-mcp", "login"]).is_err());
    }

    #[test]
    fn test_cache_search() {
        let cli = Cli::try_parse_from(["ticktick-mcp", "cache", "search", "report"]).unwrap();
        match cli.command {
            Some(Commands::Cache {
                command: CacheCommands::Search { query },
            }) => assert_eq!(query, "report"),
            _ => panic!("Expected cache search command"),
        }
    }

    #[test]
    fn test_cache_export_output() {
        let cli = Cli::try_parse_from(["ticktick-mcp", "cache", "export", "-o", "tasks.csv"]).unwrap();
        match cli.command {
            Some(Commands::Cache {
                command: CacheCommands::Export { output },
            }) => assert_eq!(output, Some(PathBuf::from("tasks.csv"))),
            _ => panic!("Expected cache export command"),
        }
    }

    #[test]
    fn test_cache_import_requires_file() {
        assert!(Cli::try_parse_from(["ticktick-mcp", "cache", "import"]).is_err());
    }

    #[test]
    fn test_help_works() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        // Version flag exits early with an error
        assert!(Cli::try_parse_from(["ticktick-mcp", "--version"]).is_err());
    }
}
