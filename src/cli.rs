//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Resolve image-host page links into directly embeddable image URLs.
///
/// Pass Imgur image or album links as arguments, or pipe them via stdin
/// (one per line). Each discovered image is printed on its own line.
#[derive(Parser)]
#[command(name = "imgdetect")]
#[command(author, version, about)]
pub struct Args {
    /// Page URLs to resolve (reads stdin when omitted)
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Imgur API client id (overrides IMGUR_CLIENT_ID and the config file)
    #[arg(long)]
    pub client_id: Option<String>,

    /// Path to a config file (defaults to $XDG_CONFIG_HOME/imgdetect/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print one JSON object per image instead of plain text
    #[arg(long)]
    pub json: bool,

    /// Per-request deadline in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout_secs: Option<u64>,
}

// Hand-written so the client id never reaches debug logs.
impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("urls", &self.urls)
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .field(
                "client_id",
                &self.client_id.as_ref().map(|_| "<redacted>"),
            )
            .field("config", &self.config)
            .field("json", &self.json)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["imgdetect"]).unwrap();
        assert!(args.urls.is_empty());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.json);
        assert!(args.client_id.is_none());
    }

    #[test]
    fn test_cli_collects_positional_urls() {
        let args = Args::try_parse_from([
            "imgdetect",
            "http://imgur.com/abc",
            "http://imgur.com/a/xyz",
        ])
        .unwrap();
        assert_eq!(args.urls, vec!["http://imgur.com/abc", "http://imgur.com/a/xyz"]);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["imgdetect", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_client_id_and_config() {
        let args = Args::try_parse_from([
            "imgdetect",
            "--client-id",
            "abc",
            "--config",
            "/tmp/imgdetect.toml",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.client_id.as_deref(), Some("abc"));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/imgdetect.toml")));
        assert!(args.json);
    }

    #[test]
    fn test_cli_timeout_out_of_range_rejected() {
        assert!(Args::try_parse_from(["imgdetect", "--timeout-secs", "0"]).is_err());
        let args = Args::try_parse_from(["imgdetect", "--timeout-secs", "5"]).unwrap();
        assert_eq!(args.timeout_secs, Some(5));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["imgdetect", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_debug_redacts_client_id() {
        let args =
            Args::try_parse_from(["imgdetect", "--client-id", "s3cret-id", "http://imgur.com/a"])
                .unwrap();
        let rendered = format!("{args:?}");
        assert!(!rendered.contains("s3cret-id"), "leaked: {rendered}");
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("http://imgur.com/a"));

        let args = Args::try_parse_from(["imgdetect"]).unwrap();
        assert!(format!("{args:?}").contains("client_id: None"));
    }
}
