// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports the request, the state markers, the Deployer and its report.

mod deployment;
mod error;
mod execute;
mod orchestrator;
mod prompt;
mod request;
mod simulate;
mod stage;
mod state;
mod transitions;

pub use deployment::Deployment;
pub use error::{DeployError, DeployErrorKind};
pub use execute::backup_name;
pub use orchestrator::{DEFAULT_SIMULATE_STEP_DELAY, DeployOptions, Deployer, DeploymentReport};
pub use prompt::{Answer, Prompter, TerminalPrompter};
pub use request::{DEFAULT_BRANCH, DeploymentRequest};
pub use stage::{Silent, Stage, StageObserver, StageOutcome, StageRecord, StageResult};
pub use state::{Completed, Confirmed, ProfileLoaded, RepositoryReady, Requested, Validated};
