//! A small, generic finite-state-machine runtime shared by the ingress and
//! egress dispatchers.
//!
//! Stimuli are enqueued FIFO on a default queue, or on a high-priority queue
//! that always drains first; events may carry a typed parameter (the frame
//! that triggered them); a per-state action runs on entry to the *new*
//! state, before the per-transition event action, and can veto it by
//! returning `false` (the state change itself still commits regardless). A
//! transition's target can also be the pseudo-state [`Next::Revert`],
//! meaning "go back to whatever state we were in before this transition".
//!
//! Actions are plain function pointers taking an explicit `&mut Ctx`, so the
//! transition table is a single `'static` value shared across instances
//! with nothing to rebind per object.
//!
//! An event action may itself want to reclassify the stimulus it just
//! handled (used to resolve an ambiguous poll-reply-or-write-request
//! stimulus into the concrete one once bus context disambiguates it): it
//! does so by returning `Some((stimulus, parameter))` instead of calling
//! back into the FSM, which the interpreter then pushes onto the
//! high-priority queue and drains before anything already queued.

use std::collections::VecDeque;

/// A transition's event action: mutates the owning context given the event
/// parameter (if the stimulus carried one), and optionally requests that a
/// new stimulus be handled immediately, ahead of anything already queued.
pub type Action<Ctx, Stim, Param> = fn(&mut Ctx, Option<&Param>) -> Option<(Stim, Option<Param>)>;

/// A state action: runs on entry to a state, before that state's queued
/// event action. Returning `false` skips the event action (the state change
/// has already committed).
pub type StateAction<Ctx> = fn(&mut Ctx) -> bool;

/// The target of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next<S> {
    /// Move to this explicit state.
    State(S),
    /// Restore whatever state we were in immediately before this
    /// transition. Used by error/timeout rows that want to leave the FSM
    /// exactly where it was.
    Revert,
}

/// One row of a transition table: where to go, and what to run once there.
pub struct Transition<Ctx, S, Stim, Param> {
    pub next: Next<S>,
    pub action: Action<Ctx, Stim, Param>,
}

/// A stimulus, optionally carrying a typed parameter.
enum Event<Stim, Param> {
    Bare(Stim),
    WithParam(Stim, Param),
}

/// Generic FSM interpreter. `S` is the state enum, `Stim` the stimulus enum,
/// `Param` the event parameter type, `Ctx` the owning driver-side context
/// the actions mutate.
pub struct Fsm<Ctx, S, Stim, Param> {
    state: S,
    previous: Option<S>,
    default_queue: VecDeque<Event<Stim, Param>>,
    priority_queue: VecDeque<Event<Stim, Param>>,
    transition: fn(&S, &Stim) -> Transition<Ctx, S, Stim, Param>,
    state_action: fn(&S, &Stim) -> Option<StateAction<Ctx>>,
}

impl<Ctx, S, Stim, Param> Fsm<Ctx, S, Stim, Param>
where
    S: Clone + PartialEq,
{
    pub fn new(
        initial: S,
        transition: fn(&S, &Stim) -> Transition<Ctx, S, Stim, Param>,
        state_action: fn(&S, &Stim) -> Option<StateAction<Ctx>>,
    ) -> Self {
        Self {
            state: initial,
            previous: None,
            default_queue: VecDeque::new(),
            priority_queue: VecDeque::new(),
            transition,
            state_action,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Enqueues a bare stimulus on the default (low-priority) queue.
    pub fn report_event(&mut self, stim: Stim) {
        self.default_queue.push_back(Event::Bare(stim));
    }

    /// Enqueues a parameterised stimulus on the default queue.
    pub fn report_event_with(&mut self, stim: Stim, param: Param) {
        self.default_queue.push_back(Event::WithParam(stim, param));
    }

    /// Enqueues then runs the interpreter until both queues are empty.
    pub fn handle_event(&mut self, ctx: &mut Ctx, stim: Stim) {
        self.report_event(stim);
        self.interpret(ctx);
    }

    pub fn handle_event_with(&mut self, ctx: &mut Ctx, stim: Stim, param: Param) {
        self.report_event_with(stim, param);
        self.interpret(ctx);
    }

    /// Drains the high-priority queue, then the default queue, one event at
    /// a time, until both are empty. An action that returns a reclassified
    /// stimulus pushes it onto the high-priority queue, so it is handled
    /// before anything already waiting in either queue.
    pub fn interpret(&mut self, ctx: &mut Ctx) {
        loop {
            let event = self
                .priority_queue
                .pop_front()
                .or_else(|| self.default_queue.pop_front());
            let Some(event) = event else {
                return;
            };
            let (stim, param) = match event {
                Event::Bare(stim) => (stim, None),
                Event::WithParam(stim, param) => (stim, Some(param)),
            };

            let row = (self.transition)(&self.state, &stim);
            let new_state = match row.next {
                Next::State(s) => s,
                Next::Revert => self
                    .previous
                    .clone()
                    .expect("Revert transition with no previous state"),
            };

            self.previous = Some(self.state.clone());
            self.state = new_state;

            let run_event_action = match (self.state_action)(&self.state, &stim) {
                Some(action) => action(ctx),
                None => true,
            };
            if run_event_action {
                if let Some((reclass_stim, reclass_param)) = (row.action)(ctx, param.as_ref()) {
                    match reclass_param {
                        Some(p) => self.priority_queue.push_front(Event::WithParam(reclass_stim, p)),
                        None => self.priority_queue.push_front(Event::Bare(reclass_stim)),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    enum S {
        Off,
        On,
    }

    #[derive(Debug)]
    enum Stim {
        Flip,
        Relabel,
    }

    struct Ctx {
        flips: u32,
        relabels: u32,
    }

    fn transition(state: &S, stim: &Stim) -> Transition<Ctx, S, Stim, ()> {
        match (state, stim) {
            (S::Off, Stim::Flip) => Transition {
                next: Next::State(S::On),
                action: |ctx: &mut Ctx, _| {
                    ctx.flips += 1;
                    None
                },
            },
            (S::On, Stim::Flip) => Transition {
                next: Next::State(S::Off),
                action: |ctx: &mut Ctx, _| {
                    ctx.flips += 1;
                    Some((Stim::Relabel, None))
                },
            },
            (_, Stim::Relabel) => Transition {
                next: Next::Revert,
                action: |ctx: &mut Ctx, _| {
                    ctx.relabels += 1;
                    None
                },
            },
        }
    }

    fn state_action(_state: &S, _stim: &Stim) -> Option<StateAction<Ctx>> {
        None
    }

    #[test]
    fn basic_transition_runs_action_and_commits_state() {
        let mut fsm = Fsm::new(S::Off, transition, state_action);
        let mut ctx = Ctx { flips: 0, relabels: 0 };
        fsm.handle_event(&mut ctx, Stim::Flip);
        assert_eq!(*fsm.state(), S::On);
        assert_eq!(ctx.flips, 1);
    }

    #[test]
    fn reclassification_runs_before_anything_queued_after_it() {
        let mut fsm = Fsm::new(S::Off, transition, state_action);
        let mut ctx = Ctx { flips: 0, relabels: 0 };
        fsm.handle_event(&mut ctx, Stim::Flip);
        // Flipping again triggers a same-turn reclassification to Relabel,
        // which reverts to the prior state (On).
        fsm.handle_event(&mut ctx, Stim::Flip);
        assert_eq!(*fsm.state(), S::On);
        assert_eq!(ctx.flips, 2);
        assert_eq!(ctx.relabels, 1);
    }
}
