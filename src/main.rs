use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

#[macro_use]
mod utils;

mod cli;
mod config;
mod difflog;
mod dynamicfile;
mod interpreter;
mod model;
mod orchestrator;
mod profile_builder;
mod solver;
mod state;

use cli::{parse_selector, Cli, Commands};
use interpreter::RunFlags;
use orchestrator::Orchestrator;
use utils::{error, header, info, success};

fn main() {
    let cli = Cli::parse();

    init_logger(cli.verbose, cli.log.as_deref());

    if let Err(err) = run(&cli) {
        error(&err.to_string());
        std::process::exit(utils::ReconcileError::exit_code_for(&err));
    }
}

fn init_logger(verbose: bool, log_file: Option<&std::path::Path>) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "info" }),
    );
    if let Some(path) = log_file {
        if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
    }
    builder.init();
}

fn run(cli: &Cli) -> Result<()> {
    if matches!(cli.command, Commands::Resume) {
        return run_resume(cli);
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let mut engine_config = config::load_engine_config(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(session) = &cli.session {
        engine_config.session_dir = session.clone();
    }

    match &cli.command {
        Commands::Update { run, exclude } => {
            header("Updating");
            let orchestrator = Orchestrator::new(engine_config, RunFlags::from(run));
            orchestrator.update(exclude)?;
            success("Update complete");
        }
        Commands::Remove { run, profiles, all } => {
            header("Removing");
            let orchestrator = Orchestrator::new(engine_config, RunFlags::from(run));
            if *all {
                orchestrator.uninstall_all(&[])?;
            } else {
                orchestrator.remove(profiles)?;
            }
            success("Removal complete");
        }
        Commands::Sync { run, exclude } => {
            header("Syncing");
            let orchestrator = Orchestrator::new(engine_config, RunFlags::from(run));
            orchestrator.sync(exclude)?;
            success("Sync complete");
        }
        Commands::Timewarp {
            run,
            from,
            to,
            include,
            exclude,
        } => {
            header("Timewarping");
            let from_selector = parse_selector(from)?;
            let to_selector = parse_selector(to)?;
            let orchestrator = Orchestrator::new(engine_config, RunFlags::from(run));
            orchestrator.timewarp(from_selector, to_selector, include, exclude)?;
            success("Timewarp complete");
        }
        Commands::Show { profile } => cmd_show(&engine_config, profile.as_deref())?,
        Commands::Find { query } => cmd_find(&engine_config, query)?,
        Commands::History { limit } => cmd_history(&engine_config, *limit)?,
        Commands::Resume => unreachable!("handled above"),
    }

    Ok(())
}

fn run_resume(cli: &Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let mut engine_config = config::load_engine_config(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(session) = &cli.session {
        engine_config.session_dir = session.clone();
    }

    let stdin = std::io::stdin();
    let resume = interpreter::read_resume_config(stdin.lock())
        .context("failed to read resume envelope from stdin")?;
    orchestrator::run_resume(engine_config, resume)
}

fn cmd_show(config: &config::EngineConfig, profile: Option<&str>) -> Result<()> {
    let loaded = state::store::load(&config.session_dir)?;

    let names: Vec<&String> = match profile {
        Some(name) => vec![loaded
            .profiles
            .keys()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| anyhow::anyhow!("no installed profile named '{name}'"))?],
        None => loaded.profiles.keys().collect(),
    };

    if names.is_empty() {
        info("No profiles installed");
        return Ok(());
    }

    for name in names {
        let ps = &loaded.profiles[name];
        header(&format!("{} ({} link(s))", ps.name, ps.links.len()));
        if let Some(parent) = &ps.parent {
            println!("  {} {}", "parent:".dimmed(), parent);
        }
        println!(
            "  {} {}",
            "installed:".dimmed(),
            ps.installed.to_rfc3339()
        );
        println!("  {} {}", "updated:".dimmed(), ps.updated.to_rfc3339());
        for link in &ps.links {
            if link.hard {
                println!(
                    "  {} {} {} inode {}",
                    "•".blue(),
                    link.path.display(),
                    "<->".dimmed(),
                    link.target_inode.unwrap_or_default()
                );
            } else {
                println!(
                    "  {} {} {} {}",
                    "•".blue(),
                    link.path.display(),
                    "->".dimmed(),
                    link.target().display()
                );
            }
        }
        println!();
    }

    Ok(())
}

fn cmd_find(config: &config::EngineConfig, query: &str) -> Result<()> {
    use fuzzy_matcher::skim::SkimMatcherV2;
    use fuzzy_matcher::FuzzyMatcher;

    let loaded = state::store::load(&config.session_dir)?;
    let matcher = SkimMatcherV2::default();

    let mut hits: Vec<(i64, String, String)> = Vec::new();
    for (profile_name, ps) in &loaded.profiles {
        for link in &ps.links {
            let path_str = link.path.display().to_string();
            let target_str = if link.hard {
                format!("inode:{}", link.target_inode.unwrap_or_default())
            } else {
                link.target().display().to_string()
            };
            let best = [
                matcher.fuzzy_match(&path_str, query),
                matcher.fuzzy_match(&target_str, query),
            ]
            .into_iter()
            .flatten()
            .max();
            if let Some(score) = best {
                hits.push((score, profile_name.clone(), format!("{path_str} -> {target_str}")));
            }
        }
    }

    hits.sort_by(|a, b| b.0.cmp(&a.0));

    if hits.is_empty() {
        info("No matches found");
        return Ok(());
    }

    for (score, profile_name, summary) in hits {
        println!("  {} [{}] {}", score.to_string().dimmed(), profile_name.cyan(), summary);
    }

    Ok(())
}

fn cmd_history(config: &config::EngineConfig, limit: usize) -> Result<()> {
    let mut timestamps = state::snapshot::list(&config.session_dir)?;
    timestamps.sort_unstable_by(|a, b| b.cmp(a));
    timestamps.truncate(limit);

    if timestamps.is_empty() {
        info("No snapshots recorded yet");
        return Ok(());
    }

    header(&format!("Last {} snapshot(s)", timestamps.len()));
    for ts in timestamps {
        let datetime = chrono::DateTime::from_timestamp(ts, 0)
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| ts.to_string());
        println!("  {} {}", ts.to_string().cyan(), datetime.dimmed());
    }

    println!();
    info("Use 'dotty timewarp --from current --to <timestamp>' to reconcile against a snapshot");

    Ok(())
}
