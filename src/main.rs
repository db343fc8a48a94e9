//! protogen: generate protobuf sources for several targets and make the
//! CommonJS output loadable from ES module packages.
//!
//! Each target is generated into its own directory. Targets with dual-module
//! post-processing then have their `*_pb.js`/`*_pb.d.ts` files renamed and
//! relative imports rewritten to match.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Args, Commands};
use colored::Colorize;
use protogen::generator::{self, GeneratorSettings};
use protogen::pipeline::{self, Stage, TargetReport};
use protogen::target::{self, PostProcess, TargetConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    protogen::init_tracing(args.verbose);

    match args.command {
        Commands::Generate {
            proto_pattern,
            includes,
            protoc,
            config,
            target,
            no_post_process,
            json,
        } => {
            cmd_generate(
                &proto_pattern,
                includes,
                protoc,
                config.as_deref(),
                &target,
                no_post_process,
                json,
            )
            .await
        }
        Commands::Normalize { root, json } => cmd_normalize(root, json).await,
        Commands::Targets { config } => cmd_targets(config.as_deref()),
    }
}

async fn cmd_generate(
    proto_pattern: &str,
    includes: Vec<String>,
    protoc: String,
    config: Option<&Path>,
    only: &[String],
    no_post_process: bool,
    json_output: bool,
) -> Result<ExitCode> {
    let mut targets = select_targets(load_targets(config)?, only)?;
    if no_post_process {
        for t in &mut targets {
            t.post_process = None;
        }
    }

    let proto_files = generator::find_proto_files(proto_pattern)?;
    let settings = GeneratorSettings {
        protoc,
        includes: includes.into_iter().map(PathBuf::from).collect(),
        proto_files,
    };

    if !json_output {
        println!(
            "{} Generating {} target(s) from {} proto file(s)",
            "info:".blue().bold(),
            targets.len(),
            settings.proto_files.len()
        );
    }

    let reports = pipeline::run_all(&targets, Some(&settings)).await;
    report_results(&reports, json_output)
}

async fn cmd_normalize(root: PathBuf, json_output: bool) -> Result<ExitCode> {
    let target = TargetConfig {
        name: root.display().to_string(),
        out: root,
        invocations: Vec::new(),
        post_process: Some(PostProcess::DualModule),
    };
    let report = pipeline::run_target(&target, None).await;
    report_results(&[report], json_output)
}

fn cmd_targets(config: Option<&Path>) -> Result<ExitCode> {
    let targets = load_targets(config)?;
    for t in &targets {
        let post = match t.post_process {
            Some(PostProcess::DualModule) => "dual-module".green(),
            None => "none".dimmed(),
        };
        println!("{} -> {} (post-process: {})", t.name.bold(), t.out.display(), post);
        for group in &t.invocations {
            println!("    {}", group.join(" ").dimmed());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_targets(config: Option<&Path>) -> Result<Vec<TargetConfig>> {
    match config {
        Some(path) => target::load_targets(path)
            .with_context(|| format!("Failed to load targets from {}", path.display())),
        None => Ok(target::builtin_targets()),
    }
}

fn select_targets(targets: Vec<TargetConfig>, only: &[String]) -> Result<Vec<TargetConfig>> {
    if only.is_empty() {
        return Ok(targets);
    }
    if let Some(unknown) = only.iter().find(|n| !targets.iter().any(|t| &t.name == *n)) {
        let known: Vec<_> = targets.iter().map(|t| t.name.as_str()).collect();
        bail!("Unknown target '{}' (known: {})", unknown, known.join(", "));
    }
    Ok(targets
        .into_iter()
        .filter(|t| only.contains(&t.name))
        .collect())
}

fn report_results(reports: &[TargetReport], json_output: bool) -> Result<ExitCode> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(reports)?);
    } else {
        for report in reports {
            print_report(report);
        }
    }

    if reports.iter().any(TargetReport::failed) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_report(report: &TargetReport) {
    let name = format!("{} ({})", report.target, report.out.display());

    if report.stage == Stage::Failed {
        let after = report.failed_after.unwrap_or(Stage::NotStarted);
        eprintln!(
            "{} {} failed after {:?}: {}",
            "error:".red().bold(),
            name,
            after,
            report.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    match &report.rewrite {
        Some(rewrite) => println!(
            "{} {} renamed {} file(s), rewrote {} import(s) in {} of {} file(s)",
            "ok:".green().bold(),
            name,
            report.renamed,
            rewrite.replacements,
            rewrite.files_changed,
            rewrite.files_visited
        ),
        None => println!(
            "{} {} {}",
            "ok:".green().bold(),
            name,
            "(no post-processing)".dimmed()
        ),
    }
}
