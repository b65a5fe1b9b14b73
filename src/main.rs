use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod compute;
mod expr;
mod ingest;
mod metrics;
mod query;
mod store;

use query::Session;
use store::Database;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(true)
        .pretty()
        .init();

    // Initialize metrics
    let metrics_addr = SocketAddr::from(([127, 0, 0, 1], 9090));
    if let Err(e) = metrics::init_metrics(metrics_addr) {
        eprintln!("Failed to initialize metrics: {}", e);
    } else {
        info!("Metrics server listening on {}", metrics_addr);
    }

    let root = match std::env::args().nth(1) {
        Some(root) => PathBuf::from(root),
        None => {
            eprintln!("usage: tickdb <db-root>");
            return ExitCode::FAILURE;
        }
    };

    let db = match Database::open(&root).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Cannot open database at {}: {}", root.display(), e);
            return ExitCode::FAILURE;
        }
    };
    info!("Tables: {}", db.table_names().await.join(", "));

    let session = Session::new(db);
    if let Err(e) = console(&session).await {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    info!("Shutting down...");
    ExitCode::SUCCESS
}

/// Reads queries line by line until `\\` or end of input
async fn console(session: &Session) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();

    loop {
        out.write_all(b"tickdb) ").await?;
        out.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "\\\\" {
            break;
        }

        match session.eval(text).await {
            Ok(frame) => println!("{}", frame),
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}
