//! Test scenarios
//!
//! Ordered step sequences over the run context. Every scenario tears its
//! worker down on all exit paths; the broker topic and store bucket are
//! run-scoped and only reset by the run driver's setup.

pub mod binary;
pub mod context;
pub mod pipeline;

pub use context::ScenarioContext;
pub use pipeline::Phase;

use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};

/// Run a scenario by name.
pub async fn run_scenario(name: &str, ctx: &mut RunContext) -> HarnessResult<()> {
    match name {
        "commit" => pipeline::run(ctx, Phase::Commit).await,
        "restart" => pipeline::run(ctx, Phase::Restart).await,
        "pipeline" => pipeline::run(ctx, Phase::Expand).await,
        "binary" => binary::run(ctx).await,

        "all" => {
            pipeline::run(ctx, Phase::Expand).await?;
            binary::run(ctx).await
        }

        _ => Err(HarnessError::Setup {
            message: format!(
                "unknown scenario '{}'; available: {}",
                name,
                available_scenarios().join(", ")
            ),
        }),
    }
}

/// Names accepted by [`run_scenario`].
pub fn available_scenarios() -> Vec<&'static str> {
    vec!["commit", "restart", "pipeline", "binary", "all"]
}
