// ABOUTME: Dry-run walk of the execution stages.
// ABOUTME: Reports every stage as simulated without creating a session or running anything.

use chrono::Utc;
use std::time::Duration;

use super::Deployment;
use super::stage::{Stage, StageObserver, StageOutcome};
use super::state::{Completed, Confirmed};

impl Deployment<Confirmed> {
    /// Rehearse the pipeline. Always succeeds.
    pub(crate) async fn simulate(
        mut self,
        step_delay: Duration,
        observer: &dyn StageObserver,
    ) -> Deployment<Completed> {
        for stage in Stage::EXECUTION {
            observer.stage_started(stage);
            if !step_delay.is_zero() {
                tokio::time::sleep(step_delay).await;
            }
            self.record(observer, stage, StageOutcome::Simulated);
        }

        self.advance(|confirmed| Completed {
            environment: confirmed.environment,
            profile: confirmed.profile,
            backup_name: None,
            completed_at: Utc::now(),
        })
    }
}
