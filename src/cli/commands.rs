//! CLI command definitions for skill-forge.

use clap::Parser;

use crate::corpus::CorpusClient;
use crate::pipeline::{self, RunOptions};

/// Learn repository-specific skills for coding agents.
#[derive(Parser)]
#[command(name = "skill-forge")]
#[command(about = "Automatically learn repository-specific skill files for coding agents")]
#[command(version)]
#[command(
    long_about = "skill-forge evolves a SKILL.md for one repository by scoring candidate \
skills against real bug-fix tasks and mutating the best performers.\n\nExample usage:\n  \
skill-forge run https://github.com/pallets/jinja --max-evals 150"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Optimize a SKILL.md for the given repository.
    Run(RunArgs),

    /// List available bug-fix tasks for a repository.
    Tasks(TasksArgs),
}

/// Arguments for `skill-forge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// GitHub repository URL or 'owner/repo', e.g. https://github.com/pallets/jinja
    pub repo_url: String,

    /// Directory to write the optimized SKILL.md.
    #[arg(short = 'o', long, default_value = ".claude/skills")]
    pub output_dir: String,

    /// Evaluation budget (number of agent runs).
    #[arg(short = 'n', long, default_value = "150")]
    pub max_evals: usize,

    /// Skip static analysis; start the search from an empty seed.
    #[arg(long)]
    pub no_initial_skill: bool,

    /// Model for the coding agent (e.g. openai/gpt-5.2).
    #[arg(short = 'm', long, env = "SKILL_FORGE_AGENT_MODEL")]
    pub agent_model: Option<String>,

    /// Model for seed generation and mutation.
    #[arg(short = 's', long, env = "SKILL_FORGE_SKILL_MODEL")]
    pub skill_model: Option<String>,

    /// OpenAI-compatible base URL for local models (e.g. http://localhost:11434/v1).
    #[arg(short = 'u', long, env = "OPENROUTER_API_BASE")]
    pub base_url: Option<String>,

    /// Maximum evaluations in flight at once.
    #[arg(long, default_value = "4")]
    pub concurrency: usize,

    /// Wall-clock bound per evaluation, in seconds.
    #[arg(long, default_value = "900")]
    pub eval_timeout_secs: u64,

    /// Maximum fail-to-pass tests run per verification.
    #[arg(long, default_value = "10")]
    pub test_cap: usize,

    /// RNG seed for the task sampling schedule.
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

/// Arguments for `skill-forge tasks`.
#[derive(Parser, Debug)]
pub struct TasksArgs {
    /// Repository name in 'owner/repo' format, e.g. pallets/jinja
    pub repo: String,

    /// Number of tasks to show.
    #[arg(short = 'l', long, default_value = "10")]
    pub limit: usize,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Execute the parsed CLI command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_command(args).await,
        Commands::Tasks(args) => tasks_command(args).await,
    }
}

async fn run_command(args: RunArgs) -> anyhow::Result<()> {
    let report = pipeline::run(RunOptions {
        repo_url: args.repo_url,
        output_dir: args.output_dir.into(),
        max_evals: args.max_evals,
        use_initial_skill: !args.no_initial_skill,
        agent_model: args.agent_model,
        skill_model: args.skill_model,
        base_url: args.base_url,
        concurrency: args.concurrency,
        eval_timeout_secs: args.eval_timeout_secs,
        test_cap: args.test_cap,
        seed: args.seed,
    })
    .await?;

    let outcome = &report.outcome;
    println!("Repository:       {}", report.repo);
    println!(
        "Evaluations used: {} ({} generations)",
        outcome.evaluations_used, outcome.generations
    );
    println!("Train score:      {:.1}%", outcome.train_score * 100.0);
    if let Some(val) = outcome.val_score {
        println!("Validation score: {:.1}%", val * 100.0);
    }
    if outcome.low_confidence {
        println!("Warning: no candidate achieved a nonzero score; the skill is unproven.");
    }
    println!("Skill saved to:   {}", report.skill_path.display());
    Ok(())
}

async fn tasks_command(args: TasksArgs) -> anyhow::Result<()> {
    let tasks = CorpusClient::new().load_tasks(&args.repo).await?;
    let shown = &tasks[..args.limit.min(tasks.len())];
    println!(
        "Found {} tasks for '{}' (showing {}):\n",
        tasks.len(),
        args.repo,
        shown.len()
    );
    for task in shown {
        let statement: String = task
            .problem_statement
            .chars()
            .take(120)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        println!("  {}", task.instance_id);
        println!("    {statement}...");
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_args_defaults() {
        let cli = Cli::parse_from(["skill-forge", "run", "pallets/jinja"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.repo_url, "pallets/jinja");
        assert_eq!(args.max_evals, 150);
        assert_eq!(args.concurrency, 4);
        assert_eq!(args.test_cap, 10);
        assert!(!args.no_initial_skill);
    }

    #[test]
    fn run_args_overrides() {
        let cli = Cli::parse_from([
            "skill-forge",
            "run",
            "pallets/jinja",
            "-n",
            "25",
            "--no-initial-skill",
            "-m",
            "anthropic/claude-opus-4.5",
            "--eval-timeout-secs",
            "300",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.max_evals, 25);
        assert!(args.no_initial_skill);
        assert_eq!(args.agent_model.as_deref(), Some("anthropic/claude-opus-4.5"));
        assert_eq!(args.eval_timeout_secs, 300);
    }

    #[test]
    fn tasks_args_parse() {
        let cli = Cli::parse_from(["skill-forge", "tasks", "pallets/jinja", "-l", "5"]);
        let Commands::Tasks(args) = cli.command else {
            panic!("expected tasks command");
        };
        assert_eq!(args.repo, "pallets/jinja");
        assert_eq!(args.limit, 5);
    }

    #[test]
    fn global_log_level() {
        let cli = Cli::parse_from(["skill-forge", "--log-level", "debug", "tasks", "a/b"]);
        assert_eq!(cli.log_level, "debug");
    }
}
