mod cli;

use std::fs::OpenOptions;
use std::io::{IsTerminal, Read as _};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;

use cli::{Cli, Command};
use treemodel::model::TreeModel;
use treemodel::output::{self, TreeSnapshot};
use treemodel::{script, source, tui};

/// Logs go to `log_file` when given, otherwise stderr. Without a log file
/// the interactive browser logs nothing, since stderr is its screen.
fn setup_logging(log_file: Option<&Path>, verbose: bool, interactive: bool) -> Result<()> {
    let level = match (log_file, interactive, verbose) {
        (None, true, _) => LevelFilter::Off,
        (_, _, true) => LevelFilter::Debug,
        _ => LevelFilter::Warn,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp_secs();
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn open_model(path: &Path, show_hidden: bool) -> Result<TreeModel> {
    let source = source::open(path, show_hidden)
        .with_context(|| format!("failed to open source {}", path.display()))?;
    TreeModel::load(source)
}

fn source_title(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_tree(model: &TreeModel, json: bool) -> Result<()> {
    let rows = model.rows();
    if json {
        let snapshot = TreeSnapshot {
            rows: &rows,
            selected: model.selection().selected(),
            focus: model.selection().most_recent(),
        };
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", output::format_tree(&rows));
    }
    Ok(())
}

fn expand_roots(model: &mut TreeModel) {
    let roots = model.tree().roots().to_vec();
    for root in &roots {
        model.expand_all(Some(root));
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, Command::Browse { .. });
    setup_logging(cli.log_file.as_deref(), cli.verbose, interactive)?;

    match cli.command {
        Command::Show {
            source,
            expand_all,
            json,
        } => {
            let mut model = open_model(&source, cli.show_hidden)?;
            if expand_all {
                expand_roots(&mut model);
            }
            print_tree(&model, json)?;
        }

        Command::Exec { source, json } => {
            let mut model = open_model(&source, cli.show_hidden)?;
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            let outcomes = script::run(&mut model, &input)?;
            if json {
                #[derive(serde::Serialize)]
                struct ExecOutput<'a> {
                    outcomes: &'a [script::Outcome],
                    #[serde(flatten)]
                    tree: TreeSnapshot<'a>,
                }
                let rows = model.rows();
                let out = ExecOutput {
                    outcomes: &outcomes,
                    tree: TreeSnapshot {
                        rows: &rows,
                        selected: model.selection().selected(),
                        focus: model.selection().most_recent(),
                    },
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                eprint!("{}", script::format_outcomes(&outcomes));
                print_tree(&model, false)?;
            }
        }

        Command::Search {
            source,
            query,
            expand_all,
            json,
        } => {
            let mut model = open_model(&source, cli.show_hidden)?;
            if expand_all {
                expand_roots(&mut model);
            }
            let matches = model.search(&query);
            if json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else if matches.is_empty() {
                eprintln!("No matches for '{query}'");
                std::process::exit(1);
            } else {
                print!("{}", output::format_matches(&matches));
            }
        }

        Command::Browse {
            source,
            poll_interval,
        } => {
            if !std::io::stdout().is_terminal() {
                bail!("browse requires a terminal");
            }
            let model = open_model(&source, cli.show_hidden)?;
            tui::run(model, source_title(&source), poll_interval)?;
        }
    }

    Ok(())
}
