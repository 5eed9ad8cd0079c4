use anyhow::Result;
use crowdsense::{
    clock::SystemClock,
    config::Config,
    model::TaskSubmission,
    provider::HttpProviderClient,
    scheduler::Scheduler,
    sink::HttpCallbackSink,
};
use std::{env, sync::Arc};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let version = crowdsense::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    // Configuration is constructed before anything else starts; there is no
    // lazy re-initialization later.
    let config = Config::new()?;

    let env_filter = tracing_subscriber::EnvFilter::new(
        env::var("RUST_LOG").unwrap_or_else(|_| "info,crowdsense=debug".to_string()),
    );
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = %version, "Starting crowdsensed");

    let http_client = Arc::new(reqwest::Client::new());
    let provider = Arc::new(HttpProviderClient::new(
        http_client.clone(),
        config.provider_base_url.as_url().clone(),
        config.http_timeout_ms.as_duration(),
    ));
    let sink = Arc::new(HttpCallbackSink::new(
        http_client,
        config.http_timeout_ms.as_duration(),
    ));

    let token = CancellationToken::new();
    let scheduler = Scheduler::new(
        provider,
        sink,
        Arc::new(SystemClock),
        config.reference_cache_config(),
        config.scheduler_config(),
        token.clone(),
    );

    // Optional startup manifest: a JSON array of task submissions, submitted
    // as if they had arrived from the task source. Rejections are logged and
    // skipped; they do not abort startup.
    if let Ok(path) = env::var("CROWDSENSE_TASKS_PATH") {
        let raw = tokio::fs::read_to_string(&path).await?;
        let submissions: Vec<TaskSubmission> = serde_json::from_str(&raw)?;
        info!(path = %path, count = submissions.len(), "Submitting startup tasks");
        for submission in submissions {
            let task_id = submission.task_id.clone();
            if let Err(e) = scheduler.submit_task(submission).await {
                warn!(task_id = %task_id, error = %e, "Startup task rejected");
            }
        }
    }

    signal::ctrl_c().await?;
    info!(tasks = scheduler.task_count().await, "Shutdown signal received");
    token.cancel();

    Ok(())
}
