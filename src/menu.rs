//! Interactive console menu, shown when no subcommand is given.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use crate::app::config::Config;
use crate::cli::{handle_batch, handle_stream, BatchArgs, StreamArgs};

fn prompt(text: &str) -> Result<Option<String>> {
    print!("{}", text);
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None); // EOF
    }
    Ok(Some(line.trim().to_string()))
}

/// Loop until the user exits. Command failures are printed and the menu
/// comes back; only I/O failures on the console itself end the loop.
pub fn run_menu(config: &Config, runtime: &Runtime) -> Result<()> {
    loop {
        println!();
        println!("1. Stream microphone audio");
        println!("2. Submit a batch transcription job");
        println!("3. Exit");

        let Some(choice) = prompt("Select an option: ")? else {
            break;
        };

        match choice.as_str() {
            "1" => {
                let args = StreamArgs {
                    input: None,
                    language: None,
                    region: None,
                    endpoint: None,
                };
                if let Err(e) = runtime.block_on(handle_stream(config, &args)) {
                    eprintln!("Error: {:#}", e);
                }
            }
            "2" => {
                let Some(source_ref) = prompt("Remote audio location (e.g. s3://bucket/audio.wav): ")?
                else {
                    break;
                };
                if source_ref.is_empty() {
                    println!("No location given.");
                    continue;
                }
                let args = BatchArgs {
                    source_ref,
                    format: "wav".to_string(),
                    language: None,
                    endpoint: None,
                    no_wait: false,
                };
                if let Err(e) = runtime.block_on(handle_batch(config, &args)) {
                    eprintln!("Error: {:#}", e);
                }
            }
            "3" | "q" | "exit" => break,
            "" => continue,
            other => println!("Unknown option: {}", other),
        }
    }

    println!("Goodbye.");
    Ok(())
}
