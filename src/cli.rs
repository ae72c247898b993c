use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "seedlot",
    version,
    about = "Seed-lot quality grading against configurable standards"
)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, global = true, default_value = ".cache/seedlot/seedlot.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, global = true)]
    pub policy_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Init,
    ImportStandards(ImportStandardsArgs),
    RegisterSample(RegisterSampleArgs),
    Submit(SubmitArgs),
    Recompute(RecomputeArgs),
    Report(ReportArgs),
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct ImportStandardsArgs {
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterSampleArgs {
    #[arg(long)]
    pub lot_id: i64,

    #[arg(long)]
    pub sample_id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    #[arg(long)]
    pub sample_id: i64,

    #[arg(long)]
    pub results: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RecomputeArgs {
    #[arg(long)]
    pub lot_id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long)]
    pub lot_id: i64,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_store_args_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "seedlot",
            "submit",
            "--sample-id",
            "7",
            "--results",
            "lab.json",
            "--db-path",
            "/tmp/grading.sqlite",
        ])
        .unwrap();

        assert_eq!(cli.store.db_path, PathBuf::from("/tmp/grading.sqlite"));
        match cli.command {
            Commands::Submit(args) => {
                assert_eq!(args.sample_id, 7);
                assert!(!args.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
