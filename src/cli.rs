//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Collie partials builder and static server
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to root (optional, default: collie.toml)
    #[arg(short = 'C', long, default_value = "collie.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compile every template file into an html partial
    Build,

    /// Build partials, then serve the site directory
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// Port to listen on (overrides the port environment variable)
        #[arg(short, long)]
        port: Option<u16>,

        /// Rebuild partials when templates change
        #[arg(
            short,
            long,
            action = clap::ArgAction::Set,
            num_args = 0..=1,
            default_missing_value = "true",
            require_equals = false
        )]
        watch: Option<bool>,
    },

    /// Load the built partials into the fallback page and report empty placeholders
    Check,
}

#[allow(unused)]
impl Cli {
    pub const fn is_build(&self) -> bool {
        matches!(self.command, Commands::Build)
    }
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }
    pub const fn is_check(&self) -> bool {
        matches!(self.command, Commands::Check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_takes_no_flags() {
        let cli = Cli::try_parse_from(["collie-site", "build"]).unwrap();
        assert!(cli.is_build());
        assert_eq!(cli.config, PathBuf::from("collie.toml"));
        assert!(cli.root.is_none());

        assert!(Cli::try_parse_from(["collie-site", "build", "--watch"]).is_err());
    }

    #[test]
    fn test_serve_flags() {
        let cli =
            Cli::try_parse_from(["collie-site", "--root", "site", "serve", "-p", "8080", "--watch"])
                .unwrap();
        assert!(cli.is_serve());
        assert_eq!(cli.root, Some(PathBuf::from("site")));
        match cli.command {
            Commands::Serve {
                interface,
                port,
                watch,
            } => {
                assert!(interface.is_none());
                assert_eq!(port, Some(8080));
                assert_eq!(watch, Some(true));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_check_command() {
        let cli = Cli::try_parse_from(["collie-site", "-C", "site.toml", "check"]).unwrap();
        assert!(cli.is_check());
        assert_eq!(cli.config, PathBuf::from("site.toml"));
    }
}
