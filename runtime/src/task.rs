/*!
One-shot task: a value that becomes available later, on the simulation thread.

Used for asset readiness (e.g. a scene's mesh finishing its load). Semantics:
- A task resolves at most once. Later `resolve` calls fail.
- Any number of continuations may be attached. They run synchronously inside `resolve`,
  in attach order, each receiving a reference to the value.
- Attaching to an already resolved task runs the continuation immediately.
- A [`Continuation`] handle can detach its own callback before it runs.
- [`Task::cancel`] drops every pending continuation and refuses later resolution.

Notes
- Single-threaded by construction (`Rc`/`RefCell`). Nothing here blocks.
*/

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task already resolved")]
    AlreadyResolved,
    #[error("task was cancelled")]
    Cancelled,
}

type Callback<T> = Box<dyn FnOnce(&T)>;

enum State<T> {
    Pending {
        continuations: Vec<(u64, Callback<T>)>,
        next_id: u64,
    },
    Resolved(Rc<T>),
    Cancelled,
}

pub struct Task<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> Default for Task<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            State::Pending { continuations, .. } => format!("pending ({} waiting)", continuations.len()),
            State::Resolved(_) => "resolved".to_string(),
            State::Cancelled => "cancelled".to_string(),
        };
        write!(f, "Task({state})")
    }
}

impl<T: 'static> Task<T> {
    /// A task that already holds its value.
    pub fn resolved(value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Resolved(Rc::new(value)))),
        }
    }

    /// Run `f` once the value is available. Runs immediately if it already is.
    ///
    /// On a cancelled task `f` is dropped without running.
    pub fn then(&self, f: impl FnOnce(&T) + 'static) -> Continuation {
        if let Some(value) = self.value() {
            f(&value);
            return Continuation { detach: None };
        }

        let mut state = self.state.borrow_mut();
        match &mut *state {
            State::Pending {
                continuations,
                next_id,
            } => {
                let id = *next_id;
                *next_id += 1;
                continuations.push((id, Box::new(f)));
                let weak = Rc::downgrade(&self.state);
                Continuation {
                    detach: Some(Box::new(move || detach(&weak, id))),
                }
            }
            State::Resolved(_) | State::Cancelled => Continuation { detach: None },
        }
    }

    /// Store the value and run every attached continuation.
    pub fn resolve(&self, value: T) -> Result<(), TaskError> {
        let value = Rc::new(value);
        let continuations = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                State::Pending { continuations, .. } => {
                    let continuations = std::mem::take(continuations);
                    *state = State::Resolved(Rc::clone(&value));
                    continuations
                }
                State::Resolved(_) => return Err(TaskError::AlreadyResolved),
                State::Cancelled => return Err(TaskError::Cancelled),
            }
        };
        // State is released, so continuations may attach to this task again.
        for (_, f) in continuations {
            f(&value);
        }
        Ok(())
    }
}

impl<T> Task<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Pending {
                continuations: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Drop all pending continuations. The task can no longer resolve.
    pub fn cancel(&self) {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), State::Cancelled);
        drop(previous);
    }

    pub fn is_pending(&self) -> bool {
        matches!(&*self.state.borrow(), State::Pending { .. })
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.state.borrow(), State::Resolved(_))
    }

    pub fn value(&self) -> Option<Rc<T>> {
        match &*self.state.borrow() {
            State::Resolved(value) => Some(Rc::clone(value)),
            _ => None,
        }
    }

    /// Continuations still waiting for the value.
    pub fn waiting(&self) -> usize {
        match &*self.state.borrow() {
            State::Pending { continuations, .. } => continuations.len(),
            _ => 0,
        }
    }
}

fn detach<T>(state: &Weak<RefCell<State<T>>>, id: u64) -> bool {
    let Some(state) = state.upgrade() else {
        return false;
    };
    let removed = match &mut *state.borrow_mut() {
        State::Pending { continuations, .. } => {
            let before = continuations.len();
            continuations.retain(|(cid, _)| *cid != id);
            before != continuations.len()
        }
        _ => false,
    };
    removed
}

/// Handle to one attached continuation.
///
/// Dropping the handle does not detach anything; call [`Continuation::cancel`].
pub struct Continuation {
    detach: Option<Box<dyn FnOnce() -> bool>>,
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

impl Continuation {
    /// Detach the callback if it hasn't run yet. Returns whether it was detached.
    pub fn cancel(mut self) -> bool {
        self.detach.take().is_some_and(|f| f())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn continuations_run_once_in_attach_order() {
        let task = Task::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b"] {
            let log = Rc::clone(&log);
            task.then(move |v: &u32| log.borrow_mut().push(format!("{tag}{v}")));
        }
        assert_eq!(task.waiting(), 2);

        task.resolve(7).unwrap();
        assert_eq!(*log.borrow(), vec!["a7".to_string(), "b7".to_string()]);
        assert_eq!(task.resolve(8), Err(TaskError::AlreadyResolved));
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(task.value().as_deref(), Some(&7));
    }

    #[test]
    fn then_on_resolved_task_runs_immediately() {
        let task = Task::resolved(3);
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        task.then(move |v| s.set(*v));
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn cancelled_continuation_never_runs() {
        let task = Task::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let first = task.then(move |_: &()| h.set(h.get() + 1));
        let h = Rc::clone(&hits);
        task.then(move |_| h.set(h.get() + 10));

        assert!(first.cancel());
        task.resolve(()).unwrap();
        assert_eq!(hits.get(), 10);
    }

    #[test]
    fn cancelling_after_resolution_is_a_no_op() {
        let task = Task::new();
        let c = task.then(|_: &()| {});
        task.resolve(()).unwrap();
        assert!(!c.cancel());
    }

    #[test]
    fn cancelled_task_refuses_resolution() {
        let task = Task::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        task.then(move |_: &()| h.set(1));

        task.cancel();
        assert_eq!(task.resolve(()), Err(TaskError::Cancelled));
        assert_eq!(hits.get(), 0);
        assert!(!task.is_pending() && !task.is_resolved());
    }

    #[test]
    fn continuation_may_reattach_during_resolve() {
        let task: Task<u8> = Task::new();
        let seen = Rc::new(Cell::new(0));
        let (t, s) = (task.clone(), Rc::clone(&seen));
        task.then(move |_| {
            let s = Rc::clone(&s);
            t.then(move |v| s.set(*v));
        });
        task.resolve(5).unwrap();
        assert_eq!(seen.get(), 5);
    }
}
