/// kanji-server
///
/// Serves the top-N predictions of a trained kanji classifier over HTTP.
/// Synchronous tiny_http accept loop; every request runs on its own thread
/// against one shared, read-only model.
///
/// Run with:
///   PORT=2036 cargo run --bin kanji-server --release -- --params params.json
///
/// Routes:
///   GET  /      liveness string
///   POST /post  form field `data`: base64 image → {"0": {"cls", "score"}, ...}

mod context;
mod handlers;
mod routes;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tiny_http::Server;

use kanji_recognizer::InferenceEngine;

use context::AppContext;

#[derive(Parser)]
#[command(name = "kanji-server", version, about = "HTTP predictor for the kanji classifier")]
struct Args {
    /// params.json written by the trainer
    #[arg(long, default_value = "./params.json")]
    params: PathBuf,
    /// Checkpoint to serve
    #[arg(long, default_value = "./kanji_recognizer_best.json")]
    model: PathBuf,
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(long, env = "PORT", default_value_t = 2036)]
    port: u16,
    /// Ranks returned per request
    #[arg(long, default_value_t = context::DEFAULT_TOP_N)]
    nbest: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kanji_recognizer=info".parse()?)
                .add_directive("kanji_server=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let engine = InferenceEngine::open(&args.model, &args.params)
        .with_context(|| format!("cannot load model '{}'", args.model.display()))?;
    let ctx = Arc::new(AppContext::new(engine, args.nbest));

    let addr = format!("{}:{}", args.host, args.port);
    let server = Server::http(&addr).map_err(|e| anyhow!("cannot bind {addr}: {e}"))?;
    tracing::info!(%addr, top_n = ctx.top_n, "listening");

    for request in server.incoming_requests() {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || routes::dispatch(request, ctx));
    }
    Ok(())
}
