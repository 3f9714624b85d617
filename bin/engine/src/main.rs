use nodeflow_engine::config::EngineConfig;
use nodeflow_engine::definitions::Definitions;
use nodeflow_engine::error::EngineError;
use nodeflow_engine::input::{Command, parse_line};
use nodeflow_engine::sink::JsonLinesSink;
use nodeflow_plugin::{PluginCatalog, PluginClient};
use nodeflow_trigger::{InMemoryWorkflowStore, TriggerEngine};
use nodeflow_workflow::{NodeRegistry, WorkflowExecutor};
use rootcause::prelude::Report;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Report<EngineError>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = EngineConfig::from_env()?;
    tracing::info!(plugin_service = %config.plugin.base_url, "Loaded configuration");

    let client = PluginClient::new(&config.plugin).map_err(|e| EngineError::Plugin {
        details: e.to_string(),
    })?;
    let catalog = PluginCatalog::new(Arc::new(client), config.plugin.plugins.clone());
    match catalog.refresh().await {
        Ok(count) => tracing::info!(plugins = count, "Plugin catalog loaded"),
        Err(e) => {
            tracing::warn!(error = %e, "Plugin service unreachable; using configured plugins");
        }
    }

    let registry = NodeRegistry::with_builtins();
    registry.set_resolver(Arc::new(catalog));
    let executor = WorkflowExecutor::new(Arc::new(registry));

    let definitions = match &config.definitions_path {
        Some(path) => Definitions::load(path).await?,
        None => Definitions::default(),
    };
    let workflows = InMemoryWorkflowStore::new();
    for workflow in definitions.workflows {
        workflows.insert(workflow);
    }
    tracing::info!(workflows = workflows.len(), "Workflows loaded");

    let sink = JsonLinesSink::new(tokio::io::stdout());
    let engine = TriggerEngine::new(executor, Arc::new(workflows), Arc::new(sink));
    engine.load(definitions.triggers);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, waiting for running workflows");
                break Ok(());
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => dispatch(&engine, &line).await,
                Ok(None) => {
                    tracing::info!("Input closed, waiting for running workflows");
                    break Ok(());
                }
                Err(e) => break Err(EngineError::Input { details: e.to_string() }),
            },
        }
    };

    engine.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(result?)
}

async fn dispatch(engine: &TriggerEngine, line: &str) {
    match parse_line(line) {
        Ok(Some(Command::Event(event))) => {
            for run in engine.handle_event(event).await {
                tracing::info!(
                    trigger_id = %run.trigger_id,
                    execution_id = %run.execution_id,
                    "Workflow run started"
                );
            }
        }
        Ok(Some(Command::Cancel { cancel })) => {
            if !engine.cancel(cancel) {
                tracing::warn!(execution_id = %cancel, "No running workflow to cancel");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring malformed input line"),
    }
}
