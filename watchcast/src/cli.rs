use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(name = "watchcast")]
#[command(about = "Live-stream capture orchestrator for video channels", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["channel_id", "manual_channels", "execute_url", "list"])
))]
pub struct Cli {
    /// Monitor a channel from the configured channels file, by its numeric id.
    #[arg(long)]
    pub channel_id: Option<i64>,

    /// Monitor one or more channel URLs without touching persistent storage.
    #[arg(long, num_args = 1.., value_name = "URL")]
    pub manual_channels: Option<Vec<String>>,

    /// Run the capture pipeline once for a single video URL.
    #[arg(long, value_name = "URL")]
    pub execute_url: Option<String>,

    /// Dump the seen/notified store. Pass "all" or a channel id.
    #[arg(long, value_name = "all|ID")]
    pub list: Option<String>,

    /// Path to a YAML configuration file.
    #[arg(long, env = "WATCHCAST_CONFIG")]
    pub config: Option<String>,

    /// Verbose per-entry metadata dump during classification.
    #[arg(long)]
    pub debug: bool,

    /// Path fragment appended to `rtmp://127.0.0.1` for the re-mux sink.
    #[arg(long, value_name = "PATH")]
    pub rtmp_details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exactly_one_mode() {
        let cli = Cli::parse_from(["watchcast", "--channel-id", "5"]);
        assert_eq!(cli.channel_id, Some(5));
    }

    #[test]
    fn rejects_no_mode() {
        let result = Cli::try_parse_from(["watchcast"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_two_modes() {
        let result = Cli::try_parse_from(["watchcast", "--channel-id", "5", "--list", "all"]);
        assert!(result.is_err());
    }

    #[test]
    fn manual_channels_accepts_multiple_urls() {
        let cli = Cli::parse_from([
            "watchcast",
            "--manual-channels",
            "https://a.example.com",
            "https://b.example.com",
        ]);
        assert_eq!(cli.manual_channels.unwrap().len(), 2);
    }
}
