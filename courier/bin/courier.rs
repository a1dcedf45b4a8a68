#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use courier::{CourierConfig, find_config_file, load_messages};
use courier_common::{internal, logging};
use courier_dispatch::{DispatchOutcome, Dispatcher, Message, SendResult};
use tokio::task::JoinSet;

/// Dispatch a batch of messages through simulated providers
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Dispatch messages with dedup, rate limiting and failover", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Give up on a message after this many milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Send messages one after another instead of concurrently
    #[arg(short, long)]
    sequential: bool,

    /// Skip printing the audit log
    #[arg(long)]
    no_audit: bool,

    /// RON file containing a list of messages
    messages: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let config_path = find_config_file(cli.config.clone())?;
    let config = CourierConfig::load(&config_path)?;
    let messages = load_messages(&cli.messages)?;

    internal!(
        level = INFO,
        "Loaded {} messages, configuration from {}",
        messages.len(),
        config_path.display()
    );

    let dispatcher = Arc::new(config.into_dispatcher()?);
    let signals = tokio::spawn(watch_signals(Arc::clone(&dispatcher)));

    let timeout = cli.timeout_ms.map(Duration::from_millis);
    let results = if cli.sequential {
        let mut results = Vec::with_capacity(messages.len());
        for message in messages {
            let result = send(&dispatcher, &message, timeout).await;
            results.push((message, result));
        }
        results
    } else {
        dispatch_all(&dispatcher, messages, timeout).await?
    };

    signals.abort();

    print_results(&results);
    if !cli.no_audit {
        print_audit_log(&dispatcher.log());
    }

    Ok(())
}

async fn send(dispatcher: &Dispatcher, message: &Message, timeout: Option<Duration>) -> SendResult {
    let result = match timeout {
        Some(timeout) => dispatcher.send_with_timeout(message, timeout).await,
        None => dispatcher.send(message).await,
    };

    SendResult::from(&result)
}

async fn dispatch_all(
    dispatcher: &Arc<Dispatcher>,
    messages: Vec<Message>,
    timeout: Option<Duration>,
) -> anyhow::Result<Vec<(Message, SendResult)>> {
    let count = messages.len();
    let mut tasks = JoinSet::new();

    for (index, message) in messages.into_iter().enumerate() {
        let dispatcher = Arc::clone(dispatcher);
        tasks.spawn(async move {
            let result = send(&dispatcher, &message, timeout).await;
            (index, message, result)
        });
    }

    let mut results = Vec::with_capacity(count);
    while let Some(joined) = tasks.join_next().await {
        results.push(joined?);
    }
    results.sort_by_key(|(index, ..)| *index);

    Ok(results
        .into_iter()
        .map(|(_, message, result)| (message, result))
        .collect())
}

/// First Ctrl+C cancels outstanding dispatches, a second one exits immediately
async fn watch_signals(dispatcher: Arc<Dispatcher>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }

    internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
    dispatcher.shutdown();

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(130);
    }
}

fn print_results(results: &[(Message, SendResult)]) {
    println!("Results:");
    for (message, result) in results {
        let outcome = if result.success {
            format!(
                "sent via {}",
                result.provider_name.as_deref().unwrap_or("unknown")
            )
        } else {
            format!(
                "failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            )
        };

        println!("  {} {:?}: {outcome}", message.recipient(), message.subject());
    }
}

fn print_audit_log(log: &[DispatchOutcome]) {
    println!("\nAudit log ({} entries):", log.len());
    for outcome in log {
        println!(
            "  {} {} {} attempt={} {} {}",
            outcome.dispatch_id,
            outcome.message.recipient(),
            outcome.provider.as_deref().unwrap_or("-"),
            outcome
                .attempt
                .map_or_else(|| "-".to_string(), |attempt| attempt.to_string()),
            if outcome.succeeded { "ok" } else { "failed" },
            outcome.note
        );
    }
}
