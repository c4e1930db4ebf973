//! `wirestream` binary.
//!
//! Streams a file or standard input through an in-process receiver and
//! prints the size of the reassembled stream.

mod cli;

use std::{error::Error, time::Duration};

use clap::Parser;
use cli::{Backend, Cli};
use tokio::{
    fs::File,
    io::{self, AsyncRead},
    signal,
    sync::mpsc,
};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use wirestream::{
    BackoffConfig,
    HandlerConfig,
    LoopbackTransport,
    StorageBackend,
    StreamingClient,
    StreamingHandler,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let backend = match cli.backend {
        Backend::Memory => StorageBackend::Memory,
        Backend::Filesystem => StorageBackend::filesystem(&cli.dir),
    };
    let handler = StreamingHandler::new(
        HandlerConfig::default()
            .with_timeout(Duration::from_secs(cli.timeout))
            .with_backend(backend),
    );

    let (finalized_tx, mut finalized_rx) = mpsc::unbounded_channel();
    let client = StreamingClient::new(LoopbackTransport::new(handler.clone()).with_finalized(finalized_tx))
        .with_backoff(BackoffConfig {
            max_attempts: cli.max_attempts,
            ..BackoffConfig::default()
        });

    let reader: Box<dyn AsyncRead + Send + Unpin> = match &cli.input {
        Some(path) => Box::new(File::open(path).await?),
        None => Box::new(io::stdin()),
    };
    let chunks = ReaderStream::with_capacity(reader, usize::try_from(cli.chunk_size)?);

    let id = client.start().await?;
    let outcome = tokio::select! {
        outcome = client.send(&id, chunks) => outcome?,
        _ = signal::ctrl_c() => {
            warn!(stream = %id, "interrupted; abandoning stream");
            handler.registry().shutdown();
            return Ok(());
        }
    };
    drop(client);

    while let Some(stream) = finalized_rx.recv().await {
        info!(stream = %stream.id, "reassembled stream delivered");
        println!(
            "{}: {} bytes in {} segments",
            stream.id,
            stream.all.len(),
            outcome.segments()
        );
    }
    handler.registry().shutdown();
    Ok(())
}
