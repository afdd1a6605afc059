// session/runner.rs - Generic driver for suspendable session tasks

use tracing::{trace, warn};

use crate::session::events::{ControlSignal, SessionEvent};
use crate::session::join;
use crate::session::task::{SessionDescriptor, SessionTask, Step, TaskOutput};

/// A suspended computation plus its completion hook.
///
/// The hook is how a join redirects a child's terminal output into its
/// slot; plain sessions have none. It fires exactly once, at the first
/// `Done` step or when the session is discarded.
pub struct Session {
    task: Box<dyn SessionTask>,
    on_done: Option<Box<dyn FnOnce(TaskOutput)>>,
}

impl Session {
    pub fn new(task: impl SessionTask + 'static) -> Self {
        Self::from_boxed(Box::new(task))
    }

    pub fn from_boxed(task: Box<dyn SessionTask>) -> Self {
        Self {
            task,
            on_done: None,
        }
    }

    /// Attach a completion hook receiving the task's terminal output.
    pub fn with_on_done(mut self, hook: impl FnOnce(TaskOutput) + 'static) -> Self {
        self.on_done = Some(Box::new(hook));
        self
    }

    fn finish(&mut self, output: TaskOutput) {
        if let Some(hook) = self.on_done.take() {
            hook(output);
        }
    }
}

/// What the owning engine should do with a session after an in-place
/// resume.
pub enum Resumption {
    /// Still suspended; put it back in the table.
    Keep(Session),
    /// Finished (or re-homed); the engine holds nothing anymore.
    Released,
}

/// Start a computation: advance it to its first suspension point and
/// register whatever descriptor it produces.
pub fn run(task: impl SessionTask + 'static) {
    start(Session::new(task));
}

/// Like [`run`], for a session that already carries a completion hook.
pub fn start(mut session: Session) {
    let step = session.task.start();
    dispatch(session, step);
}

/// Inject a value or event at the current suspension point.
///
/// Used by engines for mid-session resumes: the session stays registered
/// where it is, so a `Suspend` or `Join` produced here has nowhere to go
/// and is discarded. Only [`complete`] honours follow-up registrations.
pub fn resume(mut session: Session, event: SessionEvent) -> Resumption {
    match session.task.resume(event) {
        Step::Pending => Resumption::Keep(session),
        Step::Done(output) => {
            session.finish(output);
            Resumption::Released
        }
        Step::Suspend(_) | Step::Join(_) => {
            trace!("mid-session yield discarded; task stays registered");
            Resumption::Keep(session)
        }
    }
}

/// Inject the terminal protocol-complete signal.
///
/// Called when a session's table entry is destroyed, so finalization code
/// after the task's last suspension point still runs. A descriptor or join
/// produced by that finalization is registered immediately, chaining a
/// follow-up session without caller-side recursion.
pub fn complete(mut session: Session) {
    let step = session
        .task
        .resume(SessionEvent::Signal(ControlSignal::ProtocolComplete));
    dispatch(session, step);
}

/// Resume with full dispatch rights. Used when a join's results become
/// available: the parent holds no table entry, so any step it produces is
/// routed like a fresh start.
pub(crate) fn resume_dispatch(mut session: Session, event: SessionEvent) {
    let step = session.task.resume(event);
    dispatch(session, step);
}

/// Route a step produced outside an open-session table entry.
fn dispatch(mut session: Session, step: Step) {
    match step {
        Step::Suspend(SessionDescriptor { engine, message }) => {
            engine.register_session(message, session);
        }
        Step::Join(children) => join::register(children, session),
        Step::Done(output) => session.finish(output),
        Step::Pending => {
            // Nothing to wait on and nowhere to park the task. Dropping it
            // counts as finishing with no output, so a join parent is not
            // left hanging on a misbehaving child.
            warn!("task suspended with no descriptor; discarding");
            session.finish(None);
        }
    }
}
