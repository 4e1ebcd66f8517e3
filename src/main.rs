//! Seqeline CLI - data lineage over parsed PL/SQL syntax trees

use anyhow::Context;
use clap::{Parser, Subcommand};
use seqeline::config::{self, SeqelineConfig};
use seqeline::report::{self, UnitEvent, UnitProgress};
use seqeline::{Analysis, Dialect, DialectKind, Schema, SyntaxTree};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "seqeline")]
#[command(version = "0.0.1")]
#[command(about = "Data lineage for procedural SQL")]
#[command(long_about = r#"
Seqeline reads PL/SQL syntax trees (JSON documents produced by an ANTLR or
PMD parser) and builds a binding graph:
  • Packages, routines, cursors and variables with their members
  • Name references resolved through nested scopes
  • Value flow between variables, arguments and table columns

Example usage:
  seqeline analyze 'trees/**/*.json' --schema schema.json
  seqeline lineage trees/billing.json billing.charge.amount
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more syntax tree documents
    Analyze {
        /// Tree documents or glob patterns
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Grammar the trees come from (plsql, pmd)
        #[arg(short, long)]
        dialect: Option<DialectKind>,

        /// Relation metadata document
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Also list every lineage edge
        #[arg(short, long)]
        edges: bool,
    },

    /// Show what flows into and out of one binding
    Lineage {
        /// Tree document
        input: PathBuf,

        /// Dotted binding path, e.g. pkg.proc.var
        path: String,

        /// Grammar the tree comes from (plsql, pmd)
        #[arg(short, long)]
        dialect: Option<DialectKind>,

        /// Relation metadata document
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let settings = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Analyze {
            inputs,
            dialect,
            schema,
            format,
            edges,
        } => {
            let format = settings.format(format.as_deref());
            if format != "text" && format != "json" {
                anyhow::bail!("unknown format `{}` (expected text or json)", format);
            }
            let dialect = Dialect::of(settings.dialect(dialect));
            let schema = load_schema(&settings.schema_path(schema.as_deref()))?;
            let files = expand_inputs(&inputs)?;
            if files.is_empty() {
                anyhow::bail!("no input documents matched");
            }

            let json = format == "json";
            if !json {
                report::header(&format!("Analyzing {} unit(s)", files.len()));
                report::info("Dialect", dialect.kind.as_str());
                report::info("Relations", &schema.len().to_string());
            }

            let start = Instant::now();
            let (progress, tx) = UnitProgress::new(files.len());
            let results = analyze_all(&files, &dialect, &schema, tx);

            progress.finish();
            let failures = results.iter().filter(|(_, result)| result.is_err()).count();
            if json {
                print_json(&results)?;
            } else {
                report::summary(start.elapsed(), files.len(), failures);
                print_text(&results, edges);
            }
            if failures > 0 {
                anyhow::bail!("{} of {} unit(s) failed", failures, files.len());
            }
        }

        Commands::Lineage {
            input,
            path,
            dialect,
            schema,
        } => {
            let dialect = Dialect::of(settings.dialect(dialect));
            let schema = load_schema(&settings.schema_path(schema.as_deref()))?;
            let analysis = analyze_file(&input, &dialect, &schema)
                .with_context(|| format!("analyzing {}", input.display()))?;
            let id = analysis
                .find(&path)
                .ok_or_else(|| anyhow::anyhow!("no binding at `{}` in {}", path, input.display()))?;
            report::lineage(&analysis, id);
        }

        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            let defaults = SeqelineConfig {
                schema: Some(config::default_schema_path().display().to_string()),
                dialect: Some(DialectKind::default()),
                format: Some("text".to_string()),
            };
            config::write_config(&path, &defaults, force)?;
            report::success(&format!("Wrote {}", path.display()));
        }
    }

    Ok(())
}

/// A missing schema document downgrades to placeholder structures.
fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    match Schema::load(path).with_context(|| format!("loading schema {}", path.display()))? {
        Some(schema) => {
            tracing::debug!(path = %path.display(), relations = schema.len(), "schema loaded");
            Ok(schema)
        }
        None => {
            report::warn(&format!(
                "No schema at {}; tables resolve to placeholder structures",
                path.display()
            ));
            Ok(Schema::empty())
        }
    }
}

fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in inputs {
        let before = files.len();
        for entry in glob::glob(pattern).with_context(|| format!("bad pattern `{}`", pattern))? {
            let path = entry?;
            if path.is_file() {
                files.push(path);
            }
        }
        if files.len() == before {
            report::warn(&format!("Nothing matches {}", pattern));
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn analyze_file(path: &Path, dialect: &Dialect, schema: &Schema) -> seqeline::Result<Analysis> {
    let tree = SyntaxTree::load(path)?;
    seqeline::analyze(&tree, dialect, schema)
}

type UnitResult = (PathBuf, seqeline::Result<Analysis>);

/// Analyze every unit on a fixed pool of scoped workers. Units are
/// independent; they only share the read-only dialect and schema.
fn analyze_all(
    files: &[PathBuf],
    dialect: &Dialect,
    schema: &Schema,
    progress: crossbeam::channel::Sender<UnitEvent>,
) -> Vec<UnitResult> {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(files.len())
        .max(1);
    let (jobs_tx, jobs_rx) = crossbeam::channel::unbounded::<(usize, &PathBuf)>();
    let (done_tx, done_rx) = crossbeam::channel::unbounded::<(usize, seqeline::Result<Analysis>)>();
    for job in files.iter().enumerate() {
        let _ = jobs_tx.send(job);
    }
    drop(jobs_tx);

    let scoped = crossbeam::thread::scope(|scope| {
        for _ in 0..workers {
            let jobs = jobs_rx.clone();
            let done = done_tx.clone();
            let progress = progress.clone();
            scope.spawn(move |_| {
                for (index, path) in jobs {
                    let unit = path.display().to_string();
                    let _ = progress.send(UnitEvent::Started(unit.clone()));
                    let result = analyze_file(path, dialect, schema);
                    match &result {
                        Ok(analysis) => tracing::info!(
                            unit = %unit,
                            bindings = analysis.graph().len(),
                            "unit analyzed"
                        ),
                        Err(e) => tracing::debug!(unit = %unit, error = %e, "unit failed"),
                    }
                    let _ = progress.send(UnitEvent::Finished {
                        unit,
                        failed: result.is_err(),
                    });
                    let _ = done.send((index, result));
                }
            });
        }
    });
    drop(done_tx);
    drop(progress);
    if scoped.is_err() {
        tracing::warn!("an analysis worker panicked");
    }

    let mut results: Vec<Option<seqeline::Result<Analysis>>> = files.iter().map(|_| None).collect();
    for (index, result) in done_rx {
        results[index] = Some(result);
    }
    files
        .iter()
        .cloned()
        .zip(results)
        .map(|(path, result)| {
            let result = result.unwrap_or_else(|| {
                Err(seqeline::Error::Parse(format!("{}: worker panicked", path.display())))
            });
            (path, result)
        })
        .collect()
}

fn print_text(results: &[UnitResult], edges: bool) {
    for (path, result) in results {
        match result {
            Ok(analysis) => {
                report::section(&path.display().to_string());
                report::summary_row("Roots", &analysis.roots().len().to_string());
                println!("{}", report::kind_table(analysis));
                if edges {
                    let table = report::edge_table(analysis);
                    if !table.is_empty() {
                        println!("{}", table);
                    }
                }
            }
            Err(e) => report::error(&format!("{}: {}", path.display(), e)),
        }
    }
}

/// One JSON document per unit, keyed by path; failures go to stderr.
fn print_json(results: &[UnitResult]) -> anyhow::Result<()> {
    let mut units = serde_json::Map::new();
    for (path, result) in results {
        match result {
            Ok(analysis) => {
                let document: serde_json::Value = serde_json::from_str(&analysis.to_json()?)?;
                units.insert(path.display().to_string(), document);
            }
            Err(e) => report::error(&format!("{}: {}", path.display(), e)),
        }
    }
    println!("{}", serde_json::to_string_pretty(&units)?);
    Ok(())
}
