//! agent-handoff CLI
//!
//! Main entry point for the `handoff` binary.

mod commands;

use agent_handoff::config::HandoffConfig;
use agent_handoff::handoff::{HandoffManager, HandoffRecord, HandoffRequest, HandoffStatus, Payload};
use agent_handoff::routing::SmartRouter;
use agent_handoff::storage::{self, HandoffRepository};
use agent_handoff::{metrics, HandoffError, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use commands::{Cli, Commands};
use std::path::Path;
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = agent_handoff::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = HandoffConfig::load_or_default(cli.config.as_deref())?;
    let store_path = cli.store.clone().unwrap_or_else(|| config.store.path.clone());
    let json = cli.json;

    match cli.command {
        Commands::Create {
            from_agent,
            to_agent,
            task,
            priority,
            context,
            deadline,
            capabilities,
        } => {
            let (mut repo, mut manager) = open_store(&store_path)?;
            let mut request = HandoffRequest::new(from_agent, to_agent, task)?
                .with_priority(priority.unwrap_or_else(|| config.default_priority().value()))?
                .with_context(parse_payload("context", &context)?);
            if let Some(deadline) = deadline {
                request = request.with_deadline(parse_deadline(&deadline)?);
            }

            if request.is_unassigned() && !config.routing.agents.is_empty() {
                let router =
                    SmartRouter::new(config.registry()).with_timeout(config.decision_timeout());
                let preferred = (!capabilities.is_empty()).then_some(capabilities);
                match router.route(&request, preferred.as_deref()).await {
                    Ok(decision) => request = request.with_target(decision.target_agent),
                    Err(e) => tracing::warn!(error = %e, "Could not route handoff, leaving it unassigned"),
                }
            }

            let record = manager.create(request);
            save(&manager, repo.as_mut(), &store_path)?;

            if json {
                print_json(&record)?;
            } else {
                println!("Created handoff {}", record.record_id);
                println!("  From   : {}", record.request.from_agent);
                println!("  To     : {}", record.request.to_agent);
                println!("  Task   : {}", record.request.task_description);
                println!("  Status : {}", record.status);
            }
        }

        Commands::Status { id } => {
            let (_, manager) = open_store(&store_path)?;
            let record = manager.get(&id)?;
            if json {
                print_json(record)?;
            } else {
                print_record(record);
            }
        }

        Commands::Accept { id } => {
            let (mut repo, mut manager) = open_store(&store_path)?;
            let record = manager.accept(&id)?;
            finish(&manager, repo.as_mut(), &store_path, &record, "accepted", json)?;
        }

        Commands::Reject { id, reason } => {
            let (mut repo, mut manager) = open_store(&store_path)?;
            let record = manager.reject(&id, reason)?;
            finish(&manager, repo.as_mut(), &store_path, &record, "rejected", json)?;
        }

        Commands::Start { id } => {
            let (mut repo, mut manager) = open_store(&store_path)?;
            let record = manager.start(&id)?;
            finish(&manager, repo.as_mut(), &store_path, &record, "started", json)?;
        }

        Commands::Complete { id, result } => {
            let result = parse_payload("result", &result)?;
            let (mut repo, mut manager) = open_store(&store_path)?;
            let record = manager.complete(&id, result)?;
            finish(&manager, repo.as_mut(), &store_path, &record, "completed", json)?;
        }

        Commands::Fail { id, reason } => {
            let (mut repo, mut manager) = open_store(&store_path)?;
            let record = manager.fail(&id, reason)?;
            finish(&manager, repo.as_mut(), &store_path, &record, "failed", json)?;
        }

        Commands::List { status } => {
            let status = status
                .as_deref()
                .map(str::parse::<HandoffStatus>)
                .transpose()?;
            let (_, manager) = open_store(&store_path)?;
            let records = manager.list(status);

            if json {
                print_json(&records)?;
            } else if records.is_empty() {
                println!("No handoff records found.");
            } else {
                for record in records {
                    let task: String = record.request.task_description.chars().take(40).collect();
                    println!(
                        "{}  {:<12}  {} -> {}  {}",
                        record.short_id(),
                        record.status.as_str(),
                        record.request.from_agent,
                        record.request.to_agent,
                        task
                    );
                }
            }
        }

        Commands::Route {
            from_agent,
            task,
            capabilities,
        } => {
            let request = HandoffRequest::new(from_agent, "", task)?;
            let router = SmartRouter::new(config.registry()).with_timeout(config.decision_timeout());
            let preferred = (!capabilities.is_empty()).then_some(capabilities);
            let decision = router.route(&request, preferred.as_deref()).await?;

            if json {
                print_json(&decision)?;
            } else {
                println!("Target     : {}", decision.target_agent);
                println!("Confidence : {:.2}", decision.confidence);
                println!("Reasoning  : {}", decision.reasoning);
                if !decision.fallback_agents.is_empty() {
                    println!("Fallbacks  : {}", decision.fallback_agents.join(", "));
                }
            }
        }

        Commands::Agents => handle_agents(&config, json)?,

        Commands::Metrics { prometheus: true } => print!("{}", metrics::gather_text()),

        Commands::Metrics { prometheus: false } => {
            let repo = storage::open_repository(&store_path)?;
            let stats = repo.metrics()?;
            if json {
                print_json(&stats)?;
            } else {
                println!("Total handoffs : {}", stats.total);
                for (status, count) in &stats.by_status {
                    println!("  {:<12} : {}", status, count);
                }
                match stats.avg_duration_seconds {
                    Some(avg) => println!("Avg duration   : {:.1}s", avg),
                    None => println!("Avg duration   : n/a"),
                }
                match stats.completion_rate {
                    Some(rate) => println!("Completion     : {:.1}%", rate * 100.0),
                    None => println!("Completion     : n/a"),
                }
            }
        }
    }

    Ok(())
}

/// Open the store backend and load every record into a manager
fn open_store(path: &Path) -> Result<(Box<dyn HandoffRepository>, HandoffManager)> {
    let repo = storage::open_repository(path)?;
    let mut manager = HandoffManager::new();
    let loaded = manager.load_from(repo.as_ref())?;
    tracing::debug!(path = %path.display(), loaded, "Loaded handoff store");
    Ok((repo, manager))
}

fn handle_agents(config: &HandoffConfig, json: bool) -> Result<()> {
    let registry = config.registry();
    if json {
        return print_json(registry.agents());
    }
    if registry.is_empty() {
        println!("No agents configured.");
        println!("Add agents under routing.agents in {}", HandoffConfig::default_path().display());
        return Ok(());
    }
    for agent in registry.agents() {
        let caps: Vec<&str> = agent.capabilities.iter().map(String::as_str).collect();
        println!("{:<20} {}", agent.agent_id, caps.join(", "));
    }
    Ok(())
}

fn save(manager: &HandoffManager, repo: &mut dyn HandoffRepository, path: &Path) -> Result<()> {
    let saved = manager.save_to(repo)?;
    tracing::debug!(path = %path.display(), saved, "Saved handoff store");
    Ok(())
}

fn finish(
    manager: &HandoffManager,
    repo: &mut dyn HandoffRepository,
    path: &Path,
    record: &HandoffRecord,
    verb: &str,
    json: bool,
) -> Result<()> {
    save(manager, repo, path)?;
    if json {
        print_json(record)
    } else {
        println!("Handoff {} {}.", record.record_id, verb);
        Ok(())
    }
}

fn print_record(record: &HandoffRecord) {
    println!("Handoff ID : {}", record.record_id);
    println!("Status     : {}", record.status);
    println!("From       : {}", record.request.from_agent);
    println!("To         : {}", record.request.to_agent);
    println!("Task       : {}", record.request.task_description);
    println!("Priority   : {}", record.request.priority.value());
    if let Some(deadline) = record.request.deadline {
        println!("Deadline   : {}", deadline.to_rfc3339());
    }
    println!("Created    : {}", record.created_at.to_rfc3339());
    println!("Updated    : {}", record.updated_at.to_rfc3339());
    if let Some(response) = &record.response {
        println!(
            "Response   : accepted={}, reason={:?}",
            response.accepted, response.reason
        );
    }
    if !record.result.is_empty() {
        let result = serde_json::to_string(&record.result).unwrap_or_default();
        println!("Result     : {}", result);
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_payload(flag: &str, text: &str) -> Result<Payload> {
    serde_json::from_str(text)
        .map_err(|e| HandoffError::Validation(format!("invalid JSON for --{}: {}", flag, e)))
}

fn parse_deadline(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| HandoffError::Validation(format!("invalid --deadline '{}': {}", text, e)))
}
