// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Murmur - realtime message sync for team chat.
//!
//! This is the binary entry point: it loads configuration, installs
//! logging, and dispatches to the `tail`, `history`, `send`, and `config`
//! commands.

mod commands;
mod runtime;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use murmur_core::ContentType;

/// Murmur - realtime message sync for team chat.
#[derive(Parser, Debug)]
#[command(name = "murmur", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow live messages in one or more conversations.
    Tail {
        /// Conversation ids to subscribe to.
        #[arg(required = true)]
        conversations: Vec<i64>,
    },
    /// Print a conversation's history, newest page first.
    History {
        conversation: i64,
        /// Older pages to load after the first.
        #[arg(long, default_value_t = 0)]
        pages: u32,
    },
    /// Send a message to a conversation.
    Send {
        conversation: i64,
        content: String,
        #[arg(long, default_value = "TEXT")]
        content_type: ContentType,
        /// Message id this is a reply to.
        #[arg(long)]
        reply_to: Option<i64>,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => murmur_config::load_and_validate_path(path),
        None => murmur_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            murmur_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    runtime::init_tracing(&config.client.log_level);

    let result = match cli.command {
        Some(Commands::Tail { conversations }) => commands::tail(&config, &conversations).await,
        Some(Commands::History {
            conversation,
            pages,
        }) => commands::history(&config, conversation, pages).await,
        Some(Commands::Send {
            conversation,
            content,
            content_type,
            reply_to,
        }) => commands::send(&config, conversation, &content, content_type, reply_to).await,
        Some(Commands::Config) => commands::show_config(&config),
        None => {
            println!("murmur: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("murmur: {e}");
        std::process::exit(1);
    }
}
