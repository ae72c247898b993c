use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::cli::StoreArgs;
use crate::config::GradingPolicy;
use crate::grading::GradingEngine;
use crate::store::open_database;

pub mod init;
pub mod recompute;
pub mod report;
pub mod samples;
pub mod standards;
pub mod status;
pub mod submit;

fn open_connection(args: &StoreArgs) -> Result<Connection> {
    open_database(&args.db_path)
}

fn grading_engine(args: &StoreArgs) -> Result<GradingEngine> {
    let policy = GradingPolicy::load(args.policy_path.as_deref())?;
    GradingEngine::new(policy).context("failed to build grading engine")
}
