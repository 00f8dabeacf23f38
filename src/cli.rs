//! CLI interface for adaptive-feedback

use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::types::Verdict;
use crate::learning::{
    DecayScheduler, FeedbackEngine, JsonFileStore, Pattern, Proposal, ProposalAttempt, Signal,
};

#[derive(Parser)]
#[command(name = "adaptive-feedback")]
#[command(about = "Adaptive feedback and proposal engine for autonomous agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the engine state (default: platform data dir)
    #[arg(long, global = true, env = "ADAPTIVE_FEEDBACK_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record an observed signal
    Observe {
        /// Pattern type (e.g. cron_failing)
        #[arg(short = 't', long = "type")]
        pattern_type: String,
        /// Pattern key within the type
        #[arg(short, long)]
        key: String,
        /// Human readable description
        #[arg(short, long)]
        description: Option<String>,
        /// Seed confidence for a new pattern
        #[arg(short, long)]
        confidence: Option<f64>,
        /// Action to offer when proposing
        #[arg(short, long)]
        action: Option<String>,
    },
    /// Create proposals for confident patterns
    Propose {
        /// Only try this pattern type (requires --key)
        #[arg(short = 't', long = "type", requires = "key")]
        pattern_type: Option<String>,
        /// Only try this pattern key (requires --type)
        #[arg(short, long, requires = "pattern_type")]
        key: Option<String>,
        /// Custom proposal message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Answer a proposal
    Reply {
        /// The operator's reply
        text: String,
        /// Proposal to answer (default: most recent pending)
        #[arg(long)]
        id: Option<String>,
        /// Record this verdict instead of classifying the text (approved, rejected, snoozed)
        #[arg(long, requires = "id")]
        verdict: Option<String>,
    },
    /// Record that the agent acted autonomously for a pattern
    Act {
        #[arg(short = 't', long = "type")]
        pattern_type: String,
        #[arg(short, long)]
        key: String,
    },
    /// Feed the next operator message after an autonomous action
    Inbound {
        text: String,
    },
    /// Run a decay pass
    Decay {
        /// Keep running on the configured interval until Ctrl+C
        #[arg(short, long)]
        watch: bool,
    },
    /// Show patterns and proposals
    Status,
    /// Show how a reply would be classified
    Classify {
        text: String,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the active configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Print the built-in defaults as TOML
    Defaults,
}

fn open_engine(state_dir: Option<PathBuf>) -> Result<FeedbackEngine> {
    let config = Config::load()?;
    let store = match state_dir {
        Some(dir) => JsonFileStore::with_dir(dir)?,
        None => JsonFileStore::new()?,
    };
    let engine = FeedbackEngine::with_state_store(config, Arc::new(store))
        .context("Failed to load engine state")?;
    Ok(engine)
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Observe { pattern_type, key, description, confidence, action } => {
            let engine = open_engine(cli.state_dir)?;
            let mut signal = Signal::new(&pattern_type, &key);
            if let Some(d) = description {
                signal = signal.with_description(&d);
            }
            if let Some(c) = confidence {
                signal = signal.with_confidence(c);
            }
            if let Some(a) = action {
                signal = signal.with_action(&a);
            }
            let pattern = engine.observe(&signal)?;
            print_pattern(&pattern);
        }
        Commands::Propose { pattern_type, key, message } => {
            let engine = open_engine(cli.state_dir)?;
            match (pattern_type, key) {
                (Some(pattern_type), Some(key)) => {
                    match engine.propose(&pattern_type, &key, message.as_deref())? {
                        ProposalAttempt::Proposed(p) => print_proposal(&p),
                        ProposalAttempt::BelowThreshold { confidence, threshold } => {
                            println!("Not proposed: confidence {:.2} is below {:.2}", confidence, threshold);
                        }
                        ProposalAttempt::AlreadyApproved { .. } => {
                            println!("Not proposed: already approved");
                        }
                        ProposalAttempt::AlreadyPending(id) => {
                            println!("Not proposed: {} is still pending", id);
                        }
                        ProposalAttempt::Refused(decision) => println!("Not proposed: {}", decision),
                    }
                }
                _ => {
                    let created = engine.propose_ready()?;
                    if created.is_empty() {
                        println!("No proposals ready.");
                    }
                    for p in &created {
                        print_proposal(p);
                    }
                }
            }
        }
        Commands::Reply { text, id, verdict } => {
            let engine = open_engine(cli.state_dir)?;
            let resolution = match (id, verdict) {
                (Some(id), Some(name)) => {
                    let verdict = Verdict::from_name(&name)
                        .with_context(|| format!("Unknown verdict '{}'", name))?;
                    Some(engine.resolve(&id, verdict, &text)?)
                }
                (Some(id), None) => engine.handle_reply(&id, &text)?,
                (None, _) => engine.handle_reply_latest(&text)?,
            };
            match resolution {
                Some(r) => {
                    println!("{} -> {}", r.proposal.id, r.proposal.status);
                    if let Some(p) = r.pattern {
                        print_pattern(&p);
                    }
                }
                None => println!("No verdict recorded."),
            }
        }
        Commands::Act { pattern_type, key } => {
            let engine = open_engine(cli.state_dir)?;
            engine.record_autonomous_action(&pattern_type, &key)?;
            println!("Watching the next message for feedback on {}:{}", pattern_type, key);
        }
        Commands::Inbound { text } => {
            let engine = open_engine(cli.state_dir)?;
            match engine.handle_inbound(&text)? {
                Some(sentiment) => println!("Outcome: {}", sentiment),
                None => println!("No outcome feedback."),
            }
        }
        Commands::Decay { watch } => {
            let engine = open_engine(cli.state_dir)?;
            let scheduler = DecayScheduler::new(engine);
            if watch {
                scheduler.start().await;
                tokio::signal::ctrl_c().await?;
                scheduler.stop().await;
                let stats = scheduler.stats().await;
                println!(
                    "Ran {} passes ({} failed, {} patterns removed)",
                    stats.passes, stats.failures, stats.patterns_removed
                );
            } else {
                match scheduler.run_once().await {
                    Some(report) => {
                        println!("Decayed: {}", report.decayed);
                        println!("Removed: {}", report.removed.len());
                        for topic in &report.removed {
                            println!("  {}", topic);
                        }
                        println!("Expired proposals: {}", report.expired_proposals);
                        println!("Pruned proposals: {}", report.pruned_proposals);
                    }
                    None => anyhow::bail!("Decay pass failed; see logs (RUST_LOG=warn)"),
                }
            }
        }
        Commands::Status => {
            let engine = open_engine(cli.state_dir)?;
            let patterns = engine.patterns()?;
            let proposals = engine.proposals()?;
            println!("Patterns ({})", patterns.len());
            println!("============");
            for p in &patterns {
                print_pattern(p);
            }
            println!();
            println!("Proposals ({})", proposals.len());
            println!("=============");
            for p in &proposals {
                print_proposal(p);
            }
        }
        Commands::Classify { text } => {
            match crate::classifier::classify(&text) {
                Some(verdict) => println!("reply: {}", verdict),
                None => println!("reply: none"),
            }
            match crate::classifier::classify_sentiment(&text, true) {
                Some(sentiment) => println!("after action: {}", sentiment),
                None => println!("after action: none"),
            }
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = Config::load()?;
                print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?);
            }
            ConfigCommands::Path => {
                println!("{}", crate::config::config_path()?.display());
            }
            ConfigCommands::Defaults => {
                print!("{}", crate::config::default_config_toml());
            }
        },
    }

    Ok(())
}

fn print_pattern(p: &Pattern) {
    let feedback = p.user_feedback
        .map(|v| format!(", feedback: {}", v))
        .unwrap_or_default();
    println!(
        "  {} [{}] confidence {:.2}, seen {}x{}",
        p.topic(), p.status, p.confidence, p.occurrences, feedback
    );
    if !p.description.is_empty() {
        println!("    {}", p.description);
    }
}

fn print_proposal(p: &Proposal) {
    println!(
        "  {} [{}] {}:{} ({})",
        p.id, p.status, p.pattern_type, p.pattern_key, p.created_at.format("%Y-%m-%d %H:%M")
    );
    println!("    {}", p.message);
}
