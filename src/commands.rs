//! CLI command definitions
//!
//! All CLI structs and subcommand enums are defined here.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Agent handoff lifecycle manager
#[derive(Parser, Debug)]
#[command(name = "handoff")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (default: ~/.config/agent-handoff/config.yaml)
    #[arg(short, long, global = true, env = "HANDOFF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Handoff store file, overriding the config (.json, .jsonl, .db)
    #[arg(short, long, global = true, env = "HANDOFF_STORE")]
    pub store: Option<PathBuf>,

    /// Print JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new handoff request
    Create {
        /// Sending agent id
        #[arg(long = "from")]
        from_agent: String,

        /// Receiving agent id (routed from the configured agents when omitted)
        #[arg(long = "to", default_value = "")]
        to_agent: String,

        /// Task description
        #[arg(long)]
        task: String,

        /// Priority 1-10 (default from config, normally 5)
        #[arg(short, long)]
        priority: Option<u8>,

        /// JSON object with task context
        #[arg(long, default_value = "{}")]
        context: String,

        /// Deadline as an RFC 3339 timestamp
        #[arg(long)]
        deadline: Option<String>,

        /// Capability the receiver must have (repeatable; used when routing)
        #[arg(long = "capability")]
        capabilities: Vec<String>,
    },

    /// Show full details of a handoff
    Status {
        /// Handoff record id
        #[arg(long)]
        id: String,
    },

    /// Accept a pending handoff
    Accept {
        #[arg(long)]
        id: String,
    },

    /// Reject a pending handoff
    Reject {
        #[arg(long)]
        id: String,

        /// Why the receiver declined
        #[arg(long)]
        reason: String,
    },

    /// Mark an accepted handoff as in progress
    Start {
        #[arg(long)]
        id: String,
    },

    /// Complete a handoff with a result payload
    Complete {
        #[arg(long)]
        id: String,

        /// JSON object with the result
        #[arg(long, default_value = "{}")]
        result: String,
    },

    /// Fail an accepted or in-progress handoff
    Fail {
        #[arg(long)]
        id: String,

        /// Failure reason
        #[arg(long)]
        reason: String,
    },

    /// List handoffs, oldest first
    List {
        /// Filter by status (pending, accepted, in_progress, completed, rejected, failed)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show which agent a task would be routed to
    Route {
        /// Sending agent id
        #[arg(long = "from")]
        from_agent: String,

        /// Task description
        #[arg(long)]
        task: String,

        /// Required capability (repeatable; otherwise keywords from the task)
        #[arg(long = "capability")]
        capabilities: Vec<String>,
    },

    /// List configured agents and their capabilities
    Agents,

    /// Show aggregate handoff statistics
    Metrics {
        /// Print process counters in the Prometheus text format instead
        #[arg(long)]
        prometheus: bool,
    },
}
