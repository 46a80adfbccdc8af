//! Pipeline executor — runs actions in order and unwinds on failure.
//!
//! The executor holds no state between runs; each `execute` call owns its
//! context for the duration of the run.

use std::fmt::Display;

use tracing::{debug, info, warn};

use crate::action::Action;

/// An ordered list of reversible actions.
pub struct Pipeline<C, E> {
    actions: Vec<Box<dyn Action<C, E>>>,
}

impl<C, E: Display> Pipeline<C, E> {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Append an action.
    pub fn then(mut self, action: impl Action<C, E> + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    /// Run every action in order.
    ///
    /// On the first forward failure, the actions that already succeeded are
    /// rolled back newest first and the forward error is returned. Rollback
    /// failures are reported as `warn` events only.
    pub fn execute(&self, ctx: &mut C) -> Result<(), E> {
        for (index, action) in self.actions.iter().enumerate() {
            debug!(step = index + 1, action = action.name(), "running forward");
            if let Err(err) = action.forward(ctx) {
                warn!(
                    step = index + 1,
                    action = action.name(),
                    error = %err,
                    "forward failed, rolling back"
                );
                self.rollback(ctx, index);
                return Err(err);
            }
        }
        info!(steps = self.actions.len(), "pipeline completed");
        Ok(())
    }

    /// Revert `actions[..completed]` in reverse order.
    fn rollback(&self, ctx: &mut C, completed: usize) {
        for action in self.actions[..completed].iter().rev() {
            debug!(action = action.name(), "running backward");
            if let Err(err) = action.backward(ctx) {
                warn!(action = action.name(), error = %err, "rollback step failed");
            }
        }
    }
}

impl<C, E: Display> Default for Pipeline<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records forward/backward calls in order.
    type Trail = Vec<String>;

    struct Step {
        name: &'static str,
        fail_forward: bool,
        fail_backward: bool,
    }

    impl Action<Trail, String> for Step {
        fn name(&self) -> &str {
            self.name
        }

        fn forward(&self, trail: &mut Trail) -> Result<(), String> {
            trail.push(format!("forward:{}", self.name));
            if self.fail_forward {
                return Err(format!("{} exploded", self.name));
            }
            Ok(())
        }

        fn backward(&self, trail: &mut Trail) -> Result<(), String> {
            trail.push(format!("backward:{}", self.name));
            if self.fail_backward {
                return Err(format!("{} could not undo", self.name));
            }
            Ok(())
        }
    }

    fn step(name: &'static str, fail_forward: bool, fail_backward: bool) -> Step {
        Step {
            name,
            fail_forward,
            fail_backward,
        }
    }

    #[test]
    fn all_steps_succeed_without_rollback() {
        let pipeline = Pipeline::new()
            .then(step("one", false, false))
            .then(step("two", false, false));
        let mut trail = Trail::new();

        pipeline.execute(&mut trail).unwrap();
        assert_eq!(trail, vec!["forward:one", "forward:two"]);
    }

    #[test]
    fn third_of_four_fails_rolls_back_in_reverse() {
        let pipeline = Pipeline::new()
            .then(step("one", false, false))
            .then(step("two", false, false))
            .then(step("three", true, false))
            .then(step("four", false, false));
        let mut trail = Trail::new();

        let err = pipeline.execute(&mut trail).unwrap_err();

        assert_eq!(err, "three exploded");
        assert_eq!(
            trail,
            vec![
                "forward:one",
                "forward:two",
                "forward:three",
                "backward:two",
                "backward:one",
            ]
        );
    }

    #[test]
    fn rollback_failure_does_not_mask_forward_error() {
        let pipeline = Pipeline::new()
            .then(step("one", false, false))
            .then(step("two", false, true))
            .then(step("three", true, false));
        let mut trail = Trail::new();

        let err = pipeline.execute(&mut trail).unwrap_err();

        assert_eq!(err, "three exploded");
        // "one" is still rolled back after "two" fails to undo.
        assert_eq!(trail.last().map(String::as_str), Some("backward:one"));
    }

    #[test]
    fn first_step_failure_runs_no_backward() {
        let pipeline = Pipeline::new()
            .then(step("one", true, false))
            .then(step("two", false, false));
        let mut trail = Trail::new();

        pipeline.execute(&mut trail).unwrap_err();
        assert_eq!(trail, vec!["forward:one"]);
    }

    #[test]
    fn empty_pipeline_succeeds() {
        let pipeline: Pipeline<Trail, String> = Pipeline::default();
        pipeline.execute(&mut Trail::new()).unwrap();
    }
}
