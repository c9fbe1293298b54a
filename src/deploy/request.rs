// ABOUTME: Input to a deployment run.
// ABOUTME: Environment is kept as the raw operator string and validated by the first stage.

/// Branch deployed when none is given.
pub const DEFAULT_BRANCH: &str = "main";

/// Everything that determines one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub environment: String,
    pub target_branch: String,
    /// Skip the uncommitted-changes prompt and the final confirmation.
    pub force: bool,
    pub dry_run: bool,
}

impl DeploymentRequest {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            target_branch: DEFAULT_BRANCH.to_string(),
            force: false,
            dry_run: false,
        }
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.target_branch = branch.into();
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
