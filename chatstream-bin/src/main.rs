use std::io::{self, Write};
use std::path::PathBuf;

use chatstream_core::{client::ChatClient, config::Config, stream::StreamOutcome};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Streaming chat client", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and stream the reply (Ctrl-C cancels)
    Chat {
        #[arg(long)]
        model: Option<String>,
        #[arg(short, long, help = "Message from the user")]
        message: String,
    },
    /// List configured models
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Models => {
            for m in &cfg.models.available {
                let marker = if m.value == cfg.models.default { "*" } else { " " };
                println!("{marker} {:<20} {}", m.value, m.label);
            }
        }
        Commands::Chat { model, message } => {
            let mut client = ChatClient::from_config(cfg)?;
            if let Some(model) = model {
                client.select_model(&model)?;
            }

            let handle = client.cancel_handle();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.cancel();
                }
            });

            let mut saw_content = false;
            let outcome = client
                .send_message(&message, |event| {
                    if let Some(r) = &event.reasoning {
                        eprint!("{r}");
                        io::stderr().flush().ok();
                    }
                    if let Some(c) = &event.content {
                        saw_content = true;
                        print!("{c}");
                        io::stdout().flush().ok();
                    }
                })
                .await;
            ctrl_c.abort();

            match outcome? {
                StreamOutcome::Completed(_) => {
                    if saw_content {
                        println!();
                    }
                }
                StreamOutcome::Cancelled => {
                    if saw_content {
                        println!();
                    }
                    eprintln!("[cancelled]");
                }
            }
        }
    }

    Ok(())
}
