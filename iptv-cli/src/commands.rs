//! Subcommand handlers.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use iptv_connectivity::{ConnectivitySupervisor, EndpointStatus, ImportReport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::console::{ConsoleCommand, HELP};
use crate::source::TextSource;

pub async fn import(supervisor: &ConnectivitySupervisor, source: &TextSource) -> Result<ImportReport> {
    let text = source.read().await?;
    let report = supervisor
        .import_from_text(&text)
        .await
        .with_context(|| format!("Failed to import from {source}"))?;

    if report.is_empty() {
        println!("No server URL and device id pairs found in {source}");
        for warning in &report.warnings {
            println!("[WARN] {warning}");
        }
    } else {
        println!("{report}");
    }
    Ok(report)
}

pub async fn add(supervisor: &ConnectivitySupervisor, server_url: &str, device_id: &str, remember: bool) -> Result<()> {
    let line = supervisor.add_endpoint(server_url, device_id, remember).await?;
    println!("{line}");

    if let (true, Some(store)) = (remember, supervisor.credential_store()) {
        println!("Remembered in {}", store.path().display());
    }
    if !line.is_ok() {
        bail!("{} is not reachable", line.endpoint);
    }
    Ok(())
}

/// How `check` lists the endpoints after the pass.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub active_only: bool,
    pub filter: Option<String>,
    pub json: bool,
}

pub async fn check(
    supervisor: &ConnectivitySupervisor,
    import_from: Option<TextSource>,
    listing: &Listing,
) -> Result<()> {
    if let Some(source) = import_from {
        import(supervisor, &source).await?;
    }

    if supervisor.registry().is_empty() {
        println!("No endpoints to check. Import some, or add one with --remember.");
        return Ok(());
    }

    let summary = supervisor.check_all().await?;

    let registry = supervisor.registry();
    let rows: Vec<EndpointStatus> = match &listing.filter {
        Some(query) => registry.filter(query),
        None => registry.snapshot(),
    }
    .into_iter()
    .filter(|status| status.active || !listing.active_only)
    .collect();

    if listing.json {
        let json = serde_json::to_string_pretty(&rows).context("Failed to encode endpoint list")?;
        println!("{json}");
    } else {
        println!("{summary}");
        print_statuses(rows);
    }
    Ok(())
}

/// Check on a schedule and print registry events until Ctrl+C, `quit` or
/// the end of the event stream.
pub async fn watch(
    supervisor: Arc<ConnectivitySupervisor>,
    interval: Duration,
    import_from: Option<TextSource>,
) -> Result<()> {
    let mut events = supervisor.registry().subscribe();

    if let Some(source) = import_from {
        import(&supervisor, &source).await?;
    }

    println!("Checking every {}s. Type 'help' for commands, Ctrl+C to stop.", interval.as_secs());
    let periodic = supervisor.spawn_periodic(interval);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut shutdown_signal = pin!(tokio::signal::ctrl_c());
    let mut console_tasks = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Received Ctrl+C, stopping");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => println!("{event}"),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Missed registry events"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !spawn_console_line(&mut console_tasks, &supervisor, &line) {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Console input failed");
                    stdin_open = false;
                }
            },
            Some(finished) = console_tasks.join_next(), if !console_tasks.is_empty() => {
                if let Err(e) = finished {
                    warn!(error = %e, "Console command failed");
                }
            }
        }
    }

    supervisor.shutdown();
    console_tasks.shutdown().await;
    periodic.await.context("Periodic check task failed")?;
    Ok(())
}

/// Parse one console line and run it on `tasks`, off the watch loop.
///
/// Returns `false` when the user asked to quit.
fn spawn_console_line(tasks: &mut JoinSet<()>, supervisor: &Arc<ConnectivitySupervisor>, line: &str) -> bool {
    match ConsoleCommand::parse(line) {
        Ok(Some(ConsoleCommand::Quit)) => false,
        Ok(Some(command)) => {
            let supervisor = Arc::clone(supervisor);
            tasks.spawn(async move { run_console_command(&supervisor, command).await });
            true
        }
        Ok(None) => true,
        Err(e) => {
            println!("{e}");
            true
        }
    }
}

async fn run_console_command(supervisor: &ConnectivitySupervisor, command: ConsoleCommand) {
    let registry = supervisor.registry();
    let outcome = match command {
        ConsoleCommand::List => {
            print_statuses(registry.snapshot());
            Ok(())
        }
        ConsoleCommand::Active => {
            for endpoint in registry.list_active() {
                println!("{endpoint}");
            }
            Ok(())
        }
        ConsoleCommand::Filter(query) => {
            print_statuses(registry.filter(&query));
            Ok(())
        }
        ConsoleCommand::Import(text) => supervisor
            .import_from_text(&text)
            .await
            .map(|report| println!("{report}")),
        ConsoleCommand::Add { server_url, device_id } => supervisor
            .add_endpoint(&server_url, &device_id, false)
            .await
            .map(|line| println!("{line}")),
        ConsoleCommand::Toggle { device_id, active } => supervisor
            .toggle(&device_id, active)
            .map(|count| println!("{count} endpoint(s) updated")),
        ConsoleCommand::Remove { server_url, device_id } => supervisor.remove(&server_url, &device_id),
        ConsoleCommand::Check => supervisor.check_all().await.map(|summary| println!("{summary}")),
        ConsoleCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ConsoleCommand::Quit => Ok(()),
    };

    if let Err(e) = outcome {
        println!("Error: {e}");
    }
}

fn print_statuses(rows: impl IntoIterator<Item = EndpointStatus>) {
    let mut shown = 0;
    for status in rows {
        let state = if status.active { "active" } else { "inactive" };
        println!(
            "{state:<8} failures={:<3} {} {}",
            status.consecutive_failures, status.server_url, status.device_id
        );
        shown += 1;
    }
    if shown == 0 {
        println!("(no endpoints)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use iptv_connectivity::{ConnectivityConfig, SubscriptionRegistry, ValidationResult, Validator};

    /// Never answers.
    struct Stalled;

    #[async_trait]
    impl Validator for Stalled {
        async fn validate(&self, _server_url: &str, _device_id: &str, _timeout: Duration) -> ValidationResult {
            std::future::pending::<ValidationResult>().await
        }
    }

    fn supervisor() -> Arc<ConnectivitySupervisor> {
        let registry = Arc::new(SubscriptionRegistry::new());
        let supervisor =
            ConnectivitySupervisor::with_validator(registry, Arc::new(Stalled), ConnectivityConfig::default()).unwrap();
        Arc::new(supervisor)
    }

    #[tokio::test]
    async fn test_console_commands_do_not_block_the_loop() {
        let supervisor = supervisor();
        let mut tasks = JoinSet::new();

        assert!(spawn_console_line(
            &mut tasks,
            &supervisor,
            "import http://svc.example/c 00:1A:79:70:E2:97"
        ));
        assert!(spawn_console_line(&mut tasks, &supervisor, "check"));
        assert_eq!(tasks.len(), 2);
        tokio::task::yield_now().await;

        // Stuck probes end once the supervisor shuts down.
        supervisor.shutdown();
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(joined) = tasks.join_next().await {
                joined.unwrap();
            }
        })
        .await;
        assert!(drained.is_ok());
    }

    #[tokio::test]
    async fn test_quit_and_bad_lines_spawn_nothing() {
        let supervisor = supervisor();
        let mut tasks = JoinSet::new();

        assert!(!spawn_console_line(&mut tasks, &supervisor, "quit"));
        assert!(spawn_console_line(&mut tasks, &supervisor, "   "));
        assert!(spawn_console_line(&mut tasks, &supervisor, "frobnicate"));
        assert!(tasks.is_empty());
    }
}
