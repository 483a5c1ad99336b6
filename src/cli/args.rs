use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcribe-relay",
    about = "Relay live or stored audio to a cloud transcription service",
    version
)]
pub struct Cli {
    /// Read configuration from this file instead of the default location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// With no subcommand, an interactive menu is shown.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream microphone (or WAV file) audio and print live transcripts
    Stream(StreamArgs),
    /// Submit a remotely-stored audio file for batch transcription
    Batch(BatchArgs),
    /// List available audio input devices
    Devices,
    /// Record briefly from the microphone and report input levels
    MicCheck(MicCheckArgs),
}

#[derive(Args)]
pub struct StreamArgs {
    /// Stream this WAV file instead of the microphone
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Language code, e.g. en-US
    #[arg(long)]
    pub language: Option<String>,

    /// Service region
    #[arg(long)]
    pub region: Option<String>,

    /// Streaming endpoint URL (wss://...), overriding the config
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Remote audio location, e.g. s3://bucket/audio.wav
    pub source_ref: String,

    /// Container format of the audio
    #[arg(long, default_value = "wav")]
    pub format: String,

    /// Language code, e.g. en-US
    #[arg(long)]
    pub language: Option<String>,

    /// Batch endpoint base URL (https://...), overriding the config
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Print the job id and exit instead of polling for completion
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Args)]
pub struct MicCheckArgs {
    /// How long to record, in seconds
    #[arg(long, default_value_t = 3)]
    pub seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_is_menu_mode() {
        let cli = Cli::try_parse_from(["transcribe-relay"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_stream_defaults() {
        let cli = Cli::try_parse_from(["transcribe-relay", "stream"]).unwrap();
        match cli.command {
            Some(Commands::Stream(args)) => {
                assert!(args.input.is_none());
                assert!(args.language.is_none());
            }
            _ => panic!("expected stream subcommand"),
        }
    }

    #[test]
    fn test_stream_with_wav_input() {
        let cli =
            Cli::try_parse_from(["transcribe-relay", "stream", "--input", "clip.wav"]).unwrap();
        match cli.command {
            Some(Commands::Stream(args)) => {
                assert_eq!(args.input.unwrap(), PathBuf::from("clip.wav"));
            }
            _ => panic!("expected stream subcommand"),
        }
    }

    #[test]
    fn test_batch_requires_source_ref() {
        assert!(Cli::try_parse_from(["transcribe-relay", "batch"]).is_err());

        let cli =
            Cli::try_parse_from(["transcribe-relay", "batch", "s3://bucket/a.wav", "--no-wait"])
                .unwrap();
        match cli.command {
            Some(Commands::Batch(args)) => {
                assert_eq!(args.source_ref, "s3://bucket/a.wav");
                assert_eq!(args.format, "wav");
                assert!(args.no_wait);
            }
            _ => panic!("expected batch subcommand"),
        }
    }

    #[test]
    fn test_mic_check_default_duration() {
        let cli = Cli::try_parse_from(["transcribe-relay", "mic-check"]).unwrap();
        match cli.command {
            Some(Commands::MicCheck(args)) => assert_eq!(args.seconds, 3),
            _ => panic!("expected mic-check subcommand"),
        }
    }
}
