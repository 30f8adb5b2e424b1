use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser, Debug)]
#[clap(
    name = "murmur",
    version,
    about = "Capture short notes and voice murmurs from the terminal"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Directory holding stored murmurs and clips
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the murmur application
    #[clap(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_and_subcommand() {
        let cli = Cli::try_parse_from([
            "murmur",
            "--data-dir",
            "/tmp/m",
            "-v",
            "add",
            "-T",
            "Trip idea",
            "-c",
            "pack light",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/m")));
        match cli.command {
            Commands::Add { title, content, .. } => {
                assert_eq!(title, "Trip idea");
                assert_eq!(content.as_deref(), Some("pack light"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn edit_rejects_audio_with_remove_audio() {
        let result = Cli::try_parse_from([
            "murmur",
            "edit",
            "5",
            "--audio",
            "a.pcm",
            "--remove-audio",
        ]);
        assert!(result.is_err());
    }
}
