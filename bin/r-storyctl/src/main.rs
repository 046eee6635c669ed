//! ---
//! story_section: "04-tooling"
//! story_subsection: "binary"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Control CLI for validating and playing stories."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use r_story_common::{init_tracing, StoryConfig};
use r_story_logging as logging;

mod inspect;
mod run;

const DEFAULT_CONFIG_CANDIDATES: &[&str] = &["story.toml", "demos/story.toml"];

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "R-Story page lifecycle utility",
    long_about = None
)]
struct Cli {
    #[arg(
        long,
        value_name = "FILE",
        global = true,
        help = "Path to story configuration file (R_STORY_CONFIG takes precedence)"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Validate a story and report attribute diagnostics")]
    Validate(inspect::ValidateArgs),
    #[command(about = "Print the pages reachable in one step from each page")]
    Adjacent(inspect::AdjacentArgs),
    #[command(about = "Play the story through a simulated orchestrator")]
    Run(run::RunArgs),
}

fn config_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }
    candidates.extend(DEFAULT_CONFIG_CANDIDATES.iter().map(PathBuf::from));
    candidates
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = StoryConfig::load_with_source(&config_candidates(cli.config.as_deref()))?;

    match cli.command {
        Commands::Validate(args) => {
            logging::init();
            inspect::validate(&loaded, args)
        }
        Commands::Adjacent(args) => {
            logging::init();
            inspect::adjacent(&loaded.config, args)
        }
        Commands::Run(args) => {
            init_tracing("r-storyctl", &loaded.config.logging)?;
            run::run(loaded.config, args).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_is_tried_first() {
        let candidates = config_candidates(Some(Path::new("custom.toml")));
        assert_eq!(candidates[0], PathBuf::from("custom.toml"));
        assert_eq!(candidates.len(), DEFAULT_CONFIG_CANDIDATES.len() + 1);
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "r-storyctl",
            "--config",
            "story.toml",
            "run",
            "--dwell-ms",
            "10",
            "--max-steps",
            "3",
        ])
        .expect("arguments parse");
        assert!(matches!(cli.command, Commands::Run(_)));
        assert_eq!(cli.config, Some(PathBuf::from("story.toml")));
    }
}
