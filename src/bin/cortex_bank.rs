//! `cortex-bank`: thin CLI wrapper around the memory bank engine.
//!
//! Mirrors the corpus's `commands/` layering: every subcommand here is a
//! handful of lines that load config, open the engine, call one façade
//! method, and print the result. No business logic lives in this binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cortex_memory_bank::core::config::{self, BankConfig};
use cortex_memory_bank::core::logging;
use cortex_memory_bank::optimizer::Strategy;
use cortex_memory_bank::MemoryBank;

#[derive(Parser)]
#[command(name = "cortex-bank", version, about = "Durable, dependency-aware Markdown memory bank")]
struct Cli {
    /// Root directory the bank lives under. Defaults to $CORTEX_HOME or ./.cortex.
    #[arg(long, global = true, env = "CORTEX_HOME")]
    bank_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a file's content from stdin or --content.
    Write {
        file: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        expected_hash: Option<String>,
    },
    /// Read a file and print its content to stdout.
    Read { file: String },
    /// Delete a file.
    Delete { file: String },
    /// List every live file in the bank.
    List,
    /// Select files/sections under a token budget for a query.
    Optimize {
        query: String,
        #[arg(long, default_value_t = 100_000)]
        budget: u64,
        #[arg(long, default_value = "priority")]
        strategy: String,
        #[arg(long)]
        mandatory: Vec<String>,
    },
    /// Run the duplication detector and all planners, printing suggestions.
    Suggest,
    /// Approve or reject a pending suggestion.
    Approve {
        suggestion_id: String,
        #[arg(long)]
        reject: bool,
    },
    /// Apply an approved suggestion.
    Apply { suggestion_id: String },
    /// Print a per-file quality/health report.
    Quality,
    /// Print graph- and usage-driven anti-patterns (orphans, hubs, unused files).
    AntiPatterns,
}

fn parse_strategy(s: &str) -> Strategy {
    match s {
        "dependencies" => Strategy::Dependencies,
        "sections" => Strategy::Sections,
        "hybrid" => Strategy::Hybrid,
        _ => Strategy::Priority,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::initialize_default_logging().ok();
    let cli = Cli::parse();

    let bank_root = cli.bank_root.unwrap_or_else(config::default_bank_root);
    let config = config::load_config(&bank_root)
        .await
        .unwrap_or_else(|_| BankConfig {
            bank_root: bank_root.clone(),
            ..BankConfig::default()
        });
    let bank = MemoryBank::open(config).await?;

    match cli.command {
        Command::Write { file, content, expected_hash } => {
            let bytes = match content {
                Some(c) => c.into_bytes(),
                None => {
                    use std::io::Read;
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            let (version, sha256) = bank.write_file(&file, &bytes, expected_hash.as_deref()).await?;
            println!("wrote {file} as v{version} (sha256 {sha256})");
        }
        Command::Read { file } => {
            let bytes = bank.read_file(&file).await?;
            std::io::Write::write_all(&mut std::io::stdout(), &bytes)?;
        }
        Command::Delete { file } => {
            bank.delete_file(&file).await?;
            println!("deleted {file}");
        }
        Command::List => {
            for file in bank.list_files().await {
                println!("{file}");
            }
        }
        Command::Optimize { query, budget, strategy, mandatory } => {
            let result = bank
                .optimize(&query, budget, parse_strategy(&strategy), &mandatory)
                .await?;
            println!(
                "{} items selected, {} tokens ({:.1}% of budget)",
                result.selected.len(),
                result.total_tokens,
                result.utilization * 100.0
            );
            for item in &result.selected {
                match item {
                    cortex_memory_bank::optimizer::Selected::File(name) => println!("  file  {name}"),
                    cortex_memory_bank::optimizer::Selected::Section(name, section) => {
                        println!("  section  {name}#{section}")
                    }
                }
            }
        }
        Command::Suggest => {
            let suggestions = bank.suggest().await?;
            for s in &suggestions {
                println!(
                    "{}  {:?}  confidence={:.2}  {}",
                    s.suggestion_id, s.suggestion_type, s.confidence, s.rationale
                );
            }
        }
        Command::Approve { suggestion_id, reject } => {
            bank.approve(&suggestion_id, !reject).await?;
            println!("{suggestion_id} {}", if reject { "rejected" } else { "approved" });
        }
        Command::Apply { suggestion_id } => {
            bank.apply_suggestion(&suggestion_id).await?;
            println!("{suggestion_id} applied");
        }
        Command::Quality => {
            for (file, score, grade) in bank.quality_report().await {
                println!("{file}  {:.2}  {:?}", score, grade);
            }
        }
        Command::AntiPatterns => {
            for pattern in bank.anti_pattern_report().await {
                println!("{:?}  {}  {}", pattern.severity, pattern.file, pattern.detail);
            }
        }
    }

    Ok(())
}
