//! RelayWorks CLI entry point.
//!
//! This binary is the composition root for both processes of the relay:
//!
//! - `relayworks listen` — the webhook receiver: verifies inbound GitHub
//!   events and enqueues work items.
//! - `relayworks work` — the dispatch worker: consumes work items, invokes
//!   the agent capability, and posts results back to GitHub.
//!
//! Responsibilities: parse environment configuration, wire observability,
//! construct the concrete infrastructure (queue backend, GitHub App clients,
//! agent capability), inject it into the selected service, and shut down
//! cleanly on interrupt.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pipeline::{AppConfig, ListenerConfig, QueueConfig};
use tracing::info;

mod telemetry;

#[derive(Parser)]
#[command(name = "relayworks", about = "GitHub webhook → queue → agent relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook receiver.
    Listen,
    /// Run the dispatch worker.
    Work,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Listen => {
            telemetry::init("relayworks-listener")?;
            listen().await
        }
        Command::Work => {
            telemetry::init("relayworks-worker")?;
            work().await
        }
    }
}

async fn listen() -> anyhow::Result<()> {
    let listener_config = ListenerConfig::from_env().context("loading listener configuration")?;
    let queue_config = QueueConfig::from_env().context("loading queue configuration")?;

    let work_queue = queue::for_config(&queue_config)
        .await
        .context("constructing work queue")?;
    let (publisher, drain) =
        queue::BufferedPublisher::spawn(Arc::clone(&work_queue), queue::DEFAULT_BUFFER_CAPACITY);

    if listener_config.webhook_secret.is_none() {
        info!("no webhook secret configured; signature verification disabled");
    }
    let state = listener::AppState {
        publisher,
        webhook_secret: listener_config.webhook_secret.clone(),
    };

    listener::serve(state, listener_config.port)
        .await
        .context("webhook service failed")?;

    // The server (and with it the last publisher clone) is gone; wait for the
    // drain task to flush buffered items, then release the broker.
    let _ = drain.await;
    work_queue.close().await.context("closing work queue")?;
    Ok(())
}

async fn work() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;

    let app = Arc::new(github::GitHubApp::new(&config.github).context("constructing GitHub App")?);

    // The toolset acts as the default installation, mirroring the webhook-less
    // operations (issue reads, branch/PR writes) the agent performs.
    let default_installation = app
        .default_installation()
        .context("GITHUB_INSTALLATION_ID must be set for the worker")?;
    let tools_client = Arc::new(app.installation(default_installation));
    let issues: Arc<dyn pipeline::IssueTracker> = tools_client.clone();
    let code: Arc<dyn pipeline::CodeRepository> = tools_client.clone();
    let prs: Arc<dyn pipeline::PullRequestManager> = tools_client;
    let toolset = agent::GitHubToolset::new(
        issues,
        code,
        prs,
        agent::PermissionTable::with_agent(agent::AGENT_ID, agent::AgentRole::Contributor),
        agent::AGENT_ID,
    );
    let capability = Arc::new(
        agent::ToolAgent::from_env(&config.agent, toolset)
            .context("constructing agent capability")?,
    );

    let work_queue = queue::for_config(&config.queue)
        .await
        .context("constructing work queue")?;

    // Interrupt closes the queue, which ends the subscribe loop after the
    // in-flight item finishes or is abandoned to broker redelivery.
    let queue_for_shutdown = Arc::clone(&work_queue);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received; closing work queue");
        let _ = queue_for_shutdown.close().await;
    });

    let dispatcher = Arc::new(worker::DispatchWorker::new(
        Arc::clone(&work_queue),
        capability,
        app,
    ));
    dispatcher.run().await.context("dispatch worker failed")?;
    info!("dispatch worker stopped");
    Ok(())
}
