//! Reversible pipeline steps.

/// One reversible step of a pipeline.
///
/// `backward` undoes whatever `forward` did to the outside world. It only
/// runs for steps whose `forward` returned `Ok`.
pub trait Action<C, E>: Send + Sync {
    fn name(&self) -> &str;

    fn forward(&self, ctx: &mut C) -> Result<(), E>;

    fn backward(&self, ctx: &mut C) -> Result<(), E>;
}
