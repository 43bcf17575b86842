//! Interactive terminal chat client for OpenAI-compatible endpoints.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage; settings in ./config.json, transcripts in ./chat_history
//! mdchat
//!
//! # Keep everything somewhere else
//! mdchat --config ~/.mdchat.json --history-dir ~/chats
//!
//! # Disable colors (useful for piping output)
//! mdchat --no-color
//! ```
//!
//! `MDCHAT_API_KEY`, `MDCHAT_BASE_URL` and `MDCHAT_MODEL` override the settings file and may be
//! placed in a `.env` file.  `RUST_LOG` controls diagnostics on stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;

use mdchat::chat::{AppContext, ChatArgs, ChatConfig, PlainTextRenderer, RustylineReader, Shell};
use mdchat::observability::init_tracing;
use mdchat::{CompletionClient, EnvOverrides};

/// Main entry point for the mdchat application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let (args, _) = ChatArgs::from_command_line_relaxed("mdchat [OPTIONS]");
    let config = ChatConfig::from(args);

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let context = AppContext::load(&config, &EnvOverrides::from_env())?;
    let client = CompletionClient::new()?;
    let mut reader = RustylineReader::new()?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color).with_interrupt(interrupted);

    let mut shell = Shell::new(context, &client, &mut reader, &mut renderer);
    shell.run().await?;
    Ok(())
}
