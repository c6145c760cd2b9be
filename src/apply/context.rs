use crate::scene::graph::Scene;
use crate::scene::observer::SceneObserver;

/// One level of the apply/unapply state machine.
///
/// Every context turns reference-edit recording off. Scene observers are off while a layer or
/// collection is applied and on while unapplying, so that listeners see connections being
/// restored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyContext {
    /// Whole-layer apply.
    ApplyLayer,
    /// Apply of one collection or override into an already visible layer.
    ApplyCollection,
    /// Unapply of a layer or part of it.
    Unapply,
    /// Generic mutation with an explicit observer state (connection-override updates, ...).
    Stack {
        /// Scene observers enabled while the context is on top.
        observers: bool,
    },
}

impl ApplyContext {
    /// Scene observer state while this context is on top.
    pub fn observers_enabled(self) -> bool {
        match self {
            ApplyContext::ApplyLayer | ApplyContext::ApplyCollection => false,
            ApplyContext::Unapply => true,
            ApplyContext::Stack { observers } => observers,
        }
    }
}

/// Stack of active contexts plus the switch state to restore once it empties.
#[derive(Debug, Default)]
pub(crate) struct ContextStack {
    stack: Vec<ApplyContext>,
    saved: Option<(bool, bool)>,
}

impl ContextStack {
    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Enter `ctx`, flipping the process switches to its state.
    pub(crate) fn push(
        &mut self,
        ctx: ApplyContext,
        scene: &mut Scene,
        observer: &mut SceneObserver,
    ) {
        if self.stack.is_empty() {
            self.saved = Some((scene.ignores_reference_edits(), observer.is_enabled()));
        }
        self.stack.push(ctx);
        scene.set_ignore_reference_edits(true);
        observer.set_enabled(ctx.observers_enabled());
    }

    /// Leave the top context, restoring the state below it. Returns `true` when the stack is
    /// now empty.
    pub(crate) fn pop(&mut self, scene: &mut Scene, observer: &mut SceneObserver) -> bool {
        self.stack.pop();
        match self.stack.last() {
            Some(below) => {
                scene.set_ignore_reference_edits(true);
                observer.set_enabled(below.observers_enabled());
                false
            }
            None => {
                let (ignore, observers) = self.saved.take().unwrap_or((false, true));
                scene.set_ignore_reference_edits(ignore);
                observer.set_enabled(observers);
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/apply/context.rs"]
mod tests;
