//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments shared by bridge binaries.
#[derive(Parser, Debug, Clone)]
#[command(about = "Bridges S7 data blocks to Zenoh topics")]
#[command(version)]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse process arguments, using `default_config` when `--config` is absent.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        Self::parse_from_with_default(std::env::args_os(), default_config)
    }

    /// Parse an explicit argument list, using `default_config` when `--config` is absent.
    pub fn parse_from_with_default<I, T>(args: I, default_config: &'static str) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = <Self as clap::CommandFactory>::command()
            .mut_arg("config", |arg| arg.default_value(default_config).required(false))
            .get_matches_from(args);

        match <Self as clap::FromArgMatches>::from_arg_matches(&matches) {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let args = BridgeArgs::parse_from_with_default(["zenoh-bridge-s7"], "s7.json5");
        assert_eq!(args.config, PathBuf::from("s7.json5"));
        assert!(args.log_level.is_none());
    }

    #[test]
    fn test_explicit_arguments() {
        let args = BridgeArgs::parse_from_with_default(
            ["zenoh-bridge-s7", "-c", "plant.json5", "--log-level", "debug"],
            "s7.json5",
        );
        assert_eq!(args.config, PathBuf::from("plant.json5"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }
}
