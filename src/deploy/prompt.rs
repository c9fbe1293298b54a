// ABOUTME: Operator confirmation gate injected into the pipeline.
// ABOUTME: The terminal implementation uses dialoguer; answers default to "no".

use dialoguer::Confirm;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Asks the operator a yes/no question and blocks for the answer.
pub trait Prompter: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Interactive prompt on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> bool {
        let answer = blocking(|| {
            Confirm::new()
                .with_prompt(message)
                .default(false)
                .interact()
        });
        match answer {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("prompt failed, treating as declined: {}", e);
                false
            }
        }
    }
}

/// Run `f` on the current thread, telling a multi-threaded runtime that this
/// worker is blocked. Outside a runtime, or on a current-thread runtime, `f`
/// simply runs.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Fixed answer, for non-interactive runs.
#[derive(Debug, Clone, Copy)]
pub struct Answer(pub bool);

impl Prompter for Answer {
    fn confirm(&self, message: &str) -> bool {
        tracing::debug!("auto-answering {:?} with {}", message, self.0);
        self.0
    }
}
