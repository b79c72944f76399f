//! Fail-fast step chains
//!
//! A composite command is an ordered list of named, fallible steps. Steps
//! run in order; the first failure stops the chain and is reported with the
//! name of the step, later steps never run.

use crate::error::{Error, Result};

type StepFn<'a, C> = Box<dyn FnMut(&mut C) -> Result<()> + 'a>;

struct Step<'a, C: ?Sized> {
    name: &'static str,
    done: &'static str,
    run: StepFn<'a, C>,
}

/// Ordered list of named steps operating on a shared context
pub struct StepChain<'a, C: ?Sized> {
    steps: Vec<Step<'a, C>>,
}

impl<'a, C: ?Sized> Default for StepChain<'a, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, C: ?Sized> StepChain<'a, C> {
    /// Create an empty chain
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step
    ///
    /// `done` is the confirmation logged once the step has succeeded.
    pub fn step<F>(mut self, name: &'static str, done: &'static str, run: F) -> Self
    where
        F: FnMut(&mut C) -> Result<()> + 'a,
    {
        self.steps.push(Step {
            name,
            done,
            run: Box::new(run),
        });
        self
    }

    /// Step names in execution order
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, stopping at the first failure
    pub fn run(mut self, ctx: &mut C) -> Result<()> {
        for step in &mut self.steps {
            log::debug!("Running step '{}'", step.name);
            match (step.run)(ctx) {
                Ok(()) => log::info!("{}", step.done),
                Err(e) => {
                    log::error!("Step '{}' failed: {}", step.name, e);
                    return Err(Error::ChainStepFailure {
                        step: step.name,
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(())
    }
}
