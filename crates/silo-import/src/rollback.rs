//! Best-effort compensation for partial failures.
//!
//! The launch sequence has side effects that must not outlive a failed
//! attempt, most importantly the created table. Each step that succeeds
//! pushes a compensating action; on a later failure the stack unwinds in
//! reverse order. Compensation failures are logged and never replace the
//! primary error.

use futures::future::BoxFuture;

use crate::error::Result;

type CompensationFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// A stack of compensating actions.
#[derive(Default)]
pub struct CompensationStack {
    actions: Vec<(String, CompensationFn)>,
}

impl std::fmt::Debug for CompensationStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.actions.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("CompensationStack")
            .field("actions", &names)
            .finish()
    }
}

impl CompensationStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a named compensating action.
    pub fn push<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: FnOnce() -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        self.actions.push((name.into(), Box::new(action)));
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the stack holds no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drops all actions without running them. Call on success.
    pub fn discard(mut self) {
        self.actions.clear();
    }

    /// Runs all actions in reverse push order.
    ///
    /// Failures are logged and swallowed so they cannot mask the error that
    /// triggered the unwind.
    pub async fn unwind(mut self) {
        while let Some((name, action)) = self.actions.pop() {
            match action().await {
                Ok(()) => tracing::info!(action = %name, "compensation executed"),
                Err(error) => {
                    tracing::warn!(action = %name, %error, "compensation failed");
                }
            }
        }
    }
}
