//! Prompt-to-project code generator CLI.
//!
//! `blueprint run` turns a natural-language request into a project directory
//! through planner, architect and coder stages backed by an OpenAI-compatible
//! model endpoint.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use blueprint::agents::StructuredOutputError;
use blueprint::core::types::{CoderState, RunState};
use blueprint::exit_codes;
use blueprint::graph::{self, IterationLimitExceeded, RunInput, StageEvent};
use blueprint::io::config::{
    BlueprintConfig, DEFAULT_CONFIG_FILE, MissingCredential, ModelSettings, load_config,
    write_config,
};
use blueprint::io::model::OpenAiClient;
use blueprint::io::workspace::Workspace;
use blueprint::logging;
use blueprint::retry::{RateLimitExhausted, run_with_retry};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "blueprint",
    version,
    about = "Generate a project from a natural-language prompt"
)]
struct Cli {
    /// Config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan, decompose and code a project from PROMPT.
    Run(RunArgs),
    /// List generated files.
    Files {
        /// Project directory (overrides `project.root`).
        #[arg(long)]
        root: Option<PathBuf>,
        /// Print file contents instead of sizes.
        #[arg(long)]
        contents: bool,
    },
    /// Remove generated files, keeping directories.
    Clean {
        /// Project directory (overrides `project.root`).
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Write a default config file.
    Config {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// What to build. Not needed with `--resume`, which skips planning.
    #[arg(required_unless_present = "resume")]
    prompt: Option<String>,
    /// Coder turns allowed, including the final one (overrides `run.max_coder_turns`).
    #[arg(long)]
    max_turns: Option<u32>,
    /// Project directory (overrides `project.root`).
    #[arg(long)]
    root: Option<PathBuf>,
    /// Model name (overrides `MODEL_NAME` and `model.name`).
    #[arg(long)]
    model: Option<String>,
    /// Continue from a saved coder state (JSON) instead of planning.
    #[arg(long)]
    resume: Option<PathBuf>,
    /// Print the final run state as JSON.
    #[arg(long)]
    json: bool,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{:#}", err);
            if err.downcast_ref::<IterationLimitExceeded>().is_some() {
                eprintln!("hint: raise --max-turns or run.max_coder_turns");
            }
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(&cli.config, args),
        Command::Files { root, contents } => cmd_files(&cli.config, root, contents),
        Command::Clean { root } => cmd_clean(&cli.config, root),
        Command::Config { force } => cmd_config(&cli.config, force),
    }
}

/// Map a failed command to its exit code.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<IterationLimitExceeded>().is_some() {
        exit_codes::ITERATION_LIMIT
    } else if err.downcast_ref::<RateLimitExhausted>().is_some() {
        exit_codes::RATE_LIMITED
    } else if err.downcast_ref::<MissingCredential>().is_some() {
        exit_codes::MISSING_CREDENTIAL
    } else if err.downcast_ref::<StructuredOutputError>().is_some() {
        exit_codes::STRUCTURED_OUTPUT
    } else {
        exit_codes::INVALID
    }
}

fn cmd_run(config_path: &Path, args: RunArgs) -> Result<()> {
    let mut cfg = load_config(config_path)?;
    if let Some(root) = args.root {
        cfg.project.root = root;
    }
    if let Some(turns) = args.max_turns {
        cfg.run.max_coder_turns = turns;
    }
    cfg.validate()?;

    let mut settings = ModelSettings::from_env(&cfg.model)?;
    if let Some(model) = args.model {
        settings.model = model;
    }
    let resume = args.resume.as_deref().map(load_coder_state).transpose()?;

    let client = OpenAiClient::new(settings).context("build model client")?;
    let workspace = Workspace::init(&cfg.project.root)?;
    let input = RunInput {
        user_prompt: args.prompt.unwrap_or_default(),
        max_coder_turns: cfg.run.max_coder_turns,
    };
    let quiet = args.json;

    let state = run_with_retry(&cfg.retry.policy(), std::thread::sleep, |attempt| {
        if attempt > 0 && !quiet {
            println!("rate limited, retrying (attempt {})", attempt + 1);
        }
        graph::run(
            &input,
            &client,
            &workspace,
            &cfg.run,
            resume.clone(),
            &mut |event| {
                if !quiet {
                    print_event(event);
                }
            },
        )
    })?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&state).context("serialize run state")?
        );
    } else {
        print_summary(&state, &workspace);
    }
    Ok(())
}

fn load_coder_state(path: &Path) -> Result<CoderState> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse coder state {}", path.display()))
}

fn print_event(event: &StageEvent<'_>) {
    match event {
        StageEvent::Planned(plan) => {
            println!("planned: {} ({} files)", plan.name, plan.files.len());
        }
        StageEvent::Architected(task_plan) => {
            println!("architected: {} tasks", task_plan.implementation_steps.len());
        }
        StageEvent::Coded {
            idx,
            total,
            task,
            incomplete,
        } => {
            let mark = if *incomplete { " (incomplete)" } else { "" };
            println!("coded [{}/{}] {}{}", idx + 1, total, task.filepath, mark);
        }
        StageEvent::Done { total, incomplete } => {
            println!("done: {} tasks, {} incomplete", total, incomplete.len());
        }
    }
}

fn print_summary(state: &RunState, workspace: &Workspace) {
    println!("project: {}", workspace.root().display());
    for idx in &state.incomplete_steps {
        let path = state
            .task_plan
            .as_ref()
            .and_then(|t| t.implementation_steps.get(*idx))
            .map_or("?", |t| t.filepath.as_str());
        println!("incomplete: task {} ({})", idx + 1, path);
    }
}

fn project_root(config_path: &Path, root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => Ok(load_config(config_path)?.project.root),
    }
}

fn cmd_files(config_path: &Path, root: Option<PathBuf>, contents: bool) -> Result<()> {
    let workspace = Workspace::init(project_root(config_path, root)?)?;
    let files = workspace.list_files()?;
    if files.is_empty() {
        println!("no files in {}", workspace.root().display());
        return Ok(());
    }
    for file in &files {
        if contents {
            println!("== {file} ==");
            println!("{}", workspace.read_file(file)?);
        } else {
            let full = workspace.root().join(file);
            let size = fs::metadata(&full)
                .with_context(|| format!("stat {}", full.display()))?
                .len();
            println!("{file}\t{size}");
        }
    }
    Ok(())
}

fn cmd_clean(config_path: &Path, root: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::init(project_root(config_path, root)?)?;
    let removed = workspace.clean()?;
    println!(
        "removed {} files from {}",
        removed.len(),
        workspace.root().display()
    );
    Ok(())
}

fn cmd_config(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!("{} already exists (use --force)", config_path.display());
    }
    write_config(config_path, &BlueprintConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint::agents::coder::TaskIncomplete;
    use blueprint::io::model::ModelError;

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "blueprint",
            "run",
            "a todo app",
            "--max-turns",
            "12",
            "--root",
            "out",
            "--json",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.prompt.as_deref(), Some("a todo app"));
        assert_eq!(args.max_turns, Some(12));
        assert_eq!(args.root, Some(PathBuf::from("out")));
        assert!(args.json);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["blueprint", "clean", "--config", "custom.toml"]);
        assert!(matches!(cli.command, Command::Clean { root: None }));
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
    }

    #[test]
    fn parse_config_force() {
        let cli = Cli::parse_from(["blueprint", "config", "--force"]);
        assert!(matches!(cli.command, Command::Config { force: true }));
    }

    #[test]
    fn run_requires_prompt() {
        assert!(Cli::try_parse_from(["blueprint", "run"]).is_err());
    }

    #[test]
    fn resume_does_not_need_prompt() {
        let cli = Cli::parse_from(["blueprint", "run", "--resume", "state.json"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.prompt, None);
        assert_eq!(args.resume, Some(PathBuf::from("state.json")));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let limit = anyhow::Error::new(IterationLimitExceeded {
            limit: 3,
            completed_steps: 2,
            total_steps: 5,
        });
        assert_eq!(exit_code_for(&limit), exit_codes::ITERATION_LIMIT);

        let throttled = anyhow::Error::new(ModelError::RateLimited { retry_after: None })
            .context(RateLimitExhausted { attempts: 3 });
        assert_eq!(exit_code_for(&throttled), exit_codes::RATE_LIMITED);

        let missing = anyhow::Error::new(MissingCredential { searched: Vec::new() });
        assert_eq!(exit_code_for(&missing), exit_codes::MISSING_CREDENTIAL);

        let structured = anyhow::Error::new(StructuredOutputError {
            contract: "Plan",
            reason: "bad".to_string(),
        });
        assert_eq!(exit_code_for(&structured), exit_codes::STRUCTURED_OUTPUT);

        let incomplete = anyhow::Error::new(TaskIncomplete {
            step: 0,
            filepath: "a".to_string(),
            reason: "r".to_string(),
        });
        assert_eq!(exit_code_for(&incomplete), exit_codes::INVALID);
    }

    #[test]
    fn config_refuses_to_overwrite_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("blueprint.toml");
        cmd_config(&path, false).expect("first write");
        assert!(cmd_config(&path, false).is_err());
        cmd_config(&path, true).expect("forced write");
        assert_eq!(load_config(&path).expect("load"), BlueprintConfig::default());
    }
}
