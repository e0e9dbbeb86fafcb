mod agents;
mod llm;
mod prompts;
mod runner;
mod workspace;

use agents::{ResultEvaluator, ScenarioIdentifier, TestImplementer};
use clap::{value_parser, Arg, ArgAction, Command};
use llm::LlmClient;
use runner::PytestRunner;
use std::path::PathBuf;
use std::sync::Arc;
use testforge_core::Pipeline;
use testforge_model::{RunConfig, RunStatus};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use workspace::FsWorkspace;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Command::new("testforge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("LLM-driven PyTest generation with a coverage and security gate")
        .arg(
            Arg::new("path")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the Python project to generate tests for"),
        )
        .arg(
            Arg::new("files")
                .long("file")
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .help("Restrict analysis to specific source files (repeatable)"),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .value_parser(value_parser!(PathBuf))
                .help("Directory for generated test files (default: <path>/tests)"),
        )
        .arg(
            Arg::new("no-run")
                .long("no-run")
                .action(ArgAction::SetTrue)
                .help("Generate tests without executing them"),
        )
        .arg(
            Arg::new("target-coverage")
                .long("target-coverage")
                .default_value("90")
                .value_parser(value_parser!(f64))
                .help("Coverage percentage required to complete"),
        )
        .arg(
            Arg::new("max-iterations")
                .long("max-iterations")
                .default_value("20")
                .value_parser(value_parser!(u32))
                .help("Maximum run/evaluate/improve iterations"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .default_value(llm::DEFAULT_MODEL)
                .help("Model identifier for the chat-completions API"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .default_value(llm::DEFAULT_BASE_URL)
                .help("OpenAI-compatible API base URL"),
        )
        .arg(
            Arg::new("python")
                .long("python")
                .default_value("python3")
                .help("Python interpreter used to run pytest"),
        );

    let matches = cli.get_matches();

    let path = matches.get_one::<PathBuf>("path").unwrap().clone();
    let mut config = RunConfig::new(path)
        .with_auto_run_tests(!matches.get_flag("no-run"))
        .with_target_coverage(*matches.get_one::<f64>("target-coverage").unwrap())
        .with_max_iterations(*matches.get_one::<u32>("max-iterations").unwrap());
    if let Some(dir) = matches.get_one::<PathBuf>("output-dir") {
        config = config.with_output_dir(dir.clone());
    }
    if let Some(files) = matches.get_many::<PathBuf>("files") {
        config.target_files = Some(files.cloned().collect());
    }

    let model = matches.get_one::<String>("model").unwrap();
    let base_url = matches.get_one::<String>("base-url").unwrap();
    let client = LlmClient::from_env(base_url, model).map_err(|e| anyhow::anyhow!("{e}"))?;

    let python = matches.get_one::<String>("python").unwrap();
    let pipeline = Pipeline::builder()
        .identification_agent(Arc::new(ScenarioIdentifier::new(client.clone())))
        .implementation_agent(Arc::new(TestImplementer::new(client.clone())))
        .evaluation_agent(Arc::new(ResultEvaluator::new(client)))
        .workspace(Arc::new(FsWorkspace))
        .test_runner(Arc::new(PytestRunner::new(python.clone())))
        .build()?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            signal_token.cancel();
        }
    });

    let run = pipeline.run(&config, &cancel).await;

    println!();
    println!("Run {} finished: {}", run.id, run.status);
    println!("  Iterations: {}", run.iteration);
    println!("  Scenarios: {}", run.approved_scenarios.len());
    if let Some(artifact) = &run.artifact_path {
        println!("  Test file: {}", artifact.display());
    }
    if let Some(evaluation) = &run.evaluation {
        println!(
            "  Tests: {} passed, {} failed",
            evaluation.summary.passed, evaluation.summary.failed
        );
        println!("  Coverage: {:.1}%", evaluation.coverage_percent);
        if evaluation.has_severe_findings {
            println!("  Severe security findings:");
            for finding in evaluation.severe_findings() {
                println!(
                    "    [{}] {} at {}",
                    finding.severity, finding.description, finding.location
                );
            }
        }
        for recommendation in &evaluation.recommendations {
            println!("  Recommendation: {recommendation}");
        }
    }
    if let Some(message) = &run.error_message {
        println!("  Error: {message}");
    }

    std::process::exit(if run.status == RunStatus::Completed { 0 } else { 1 });
}
