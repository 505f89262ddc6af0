use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dtm::index::build::build_store;
use dtm::index::reader::StoreReader;
use dtm::index::stats::show_stats;
use dtm::{FeatureTemplate, ModelConfig, Rule};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dtm")]
#[command(about = "Dynamic phrase translation model over a word-aligned corpus")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a model store from a word-aligned bitext
    Build {
        /// Source sentences, one per line
        #[arg(long)]
        source: PathBuf,

        /// Target sentences, one per line
        #[arg(long)]
        target: PathBuf,

        /// Alignments in i-j format, one line per sentence pair
        #[arg(long)]
        align: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Look up translation options for a source phrase
    Query {
        /// Model directory
        #[arg(short, long)]
        model: PathBuf,

        /// Model configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Feature template, overrides the configuration file
        #[arg(short, long)]
        template: Option<FeatureTemplate>,

        /// Maximum number of rules to print
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Print rules as JSON
        #[arg(long)]
        json: bool,

        /// Source phrase tokens
        #[arg(required = true, trailing_var_arg = true)]
        phrase: Vec<String>,
    },
    /// Show model statistics
    Stats {
        /// Model directory
        #[arg(short, long)]
        model: PathBuf,

        /// Index the store in memory and report table sizes
        #[arg(long)]
        load: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            source,
            target,
            align,
            out,
        } => {
            let meta = build_store(&source, &target, &align, &out, true)?;
            println!(
                "Built {} ({} sentence pairs, {} source / {} target types)",
                out.display(),
                meta.sentences,
                meta.source_vocab,
                meta.target_vocab
            );
        }
        Commands::Query {
            model,
            config,
            template,
            limit,
            json,
            phrase,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => ModelConfig::default(),
            };
            if let Some(template) = template {
                config.template = template;
            }
            run_query(&model, config, &phrase.join(" "), limit, json)?;
        }
        Commands::Stats { model, load } => {
            show_stats(&model, load)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ModelConfig> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let config: ModelConfig = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// A rule with its target side spelled out
#[derive(Serialize)]
struct RuleOutput<'a> {
    target_text: String,
    #[serde(flatten)]
    rule: &'a Rule,
}

fn run_query(dir: &Path, config: ModelConfig, phrase: &str, limit: usize, json: bool) -> Result<()> {
    let (model, lexicon) = StoreReader::open(dir)?.load_model(config)?;

    // A word never seen in training cannot have translations
    let Some(ids) = lexicon.source.lookup(phrase) else {
        if json {
            println!("[]");
        } else {
            println!("No translations for \"{}\"", phrase);
        }
        return Ok(());
    };

    let rules = model.query(&ids)?;
    let shown = &rules[..rules.len().min(limit)];

    if json {
        let output: Vec<RuleOutput<'_>> = shown
            .iter()
            .map(|rule| RuleOutput {
                target_text: lexicon.target.decode(&rule.target),
                rule,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No translations for \"{}\"", phrase);
        return Ok(());
    }

    println!(
        "{:<30} {:>8} {:>8} {:>8} {:>8} {:>6}",
        "target", "p(e|f)", "p(f|e)", "lex(e|f)", "lex(f|e)", "count"
    );
    for rule in shown {
        println!(
            "{:<30} {:>8.4} {:>8.4} {:>8.4} {:>8.4} {:>6}",
            lexicon.target.decode(&rule.target),
            rule.scores.phrase_fwd,
            rule.scores.phrase_bwd,
            rule.scores.lex_fwd,
            rule.scores.lex_bwd,
            rule.count
        );
    }
    if rules.len() > shown.len() {
        println!("... and {} more", rules.len() - shown.len());
    }
    Ok(())
}
