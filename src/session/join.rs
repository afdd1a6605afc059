// session/join.rs - Fan-out/fan-in combinator

//! Aggregates N independently suspended computations into one virtual
//! session. The parent yields [`gather`] and is resumed exactly once, with
//! results ordered by input position rather than completion order.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::session::events::SessionEvent;
use crate::session::runner::{self, Session};
use crate::session::task::{SessionTask, Step, TaskOutput};

/// Build a join step over independently suspendable tasks.
///
/// Consumable exactly like a session descriptor, but targeting the
/// combinator instead of a protocol engine.
pub fn gather(children: Vec<Box<dyn SessionTask>>) -> Step {
    Step::Join(children)
}

/// Counter plus fixed-slot results buffer; destroyed after the last slot
/// fills and the parent has been resumed.
struct JoinNode {
    parent: Option<Session>,
    slots: Vec<TaskOutput>,
    remaining: usize,
}

pub(crate) fn register(children: Vec<Box<dyn SessionTask>>, parent: Session) {
    let count = children.len();
    if count == 0 {
        runner::resume_dispatch(parent, SessionEvent::Gathered(Vec::new()));
        return;
    }

    debug!(children = count, "join registered");
    let node = Rc::new(RefCell::new(JoinNode {
        parent: Some(parent),
        slots: vec![None; count],
        remaining: count,
    }));

    for (index, task) in children.into_iter().enumerate() {
        let node = Rc::clone(&node);
        let child = Session::from_boxed(task).with_on_done(move |output| {
            let last = {
                let mut node = node.borrow_mut();
                node.slots[index] = output;
                node.remaining -= 1;
                node.remaining == 0
            };
            if last {
                let (parent, slots) = {
                    let mut node = node.borrow_mut();
                    (node.parent.take(), std::mem::take(&mut node.slots))
                };
                if let Some(parent) = parent {
                    runner::resume_dispatch(parent, SessionEvent::Gathered(slots));
                }
            }
        });
        runner::start(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl_message::{AclMessage, AgentId, Performative};

    struct CollectingParent {
        children: Option<Vec<Box<dyn SessionTask>>>,
        results: Rc<RefCell<Vec<Vec<TaskOutput>>>>,
    }

    impl SessionTask for CollectingParent {
        fn start(&mut self) -> Step {
            gather(self.children.take().unwrap_or_default())
        }

        fn resume(&mut self, event: SessionEvent) -> Step {
            if let SessionEvent::Gathered(results) = event {
                self.results.borrow_mut().push(results);
            }
            Step::Done(None)
        }
    }

    struct Finished {
        output: Option<AclMessage>,
    }

    impl SessionTask for Finished {
        fn start(&mut self) -> Step {
            Step::Done(self.output.take())
        }

        fn resume(&mut self, _event: SessionEvent) -> Step {
            Step::Done(None)
        }
    }

    #[test]
    fn test_empty_join_resumes_immediately() {
        let results = Rc::new(RefCell::new(Vec::new()));
        runner::run(CollectingParent {
            children: Some(Vec::new()),
            results: Rc::clone(&results),
        });
        assert_eq!(results.borrow().len(), 1);
        assert!(results.borrow()[0].is_empty());
    }

    #[test]
    fn test_results_keep_input_positions() {
        let results = Rc::new(RefCell::new(Vec::new()));
        let children: Vec<Box<dyn SessionTask>> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                Box::new(Finished {
                    output: Some(AclMessage::new(
                        Performative::Inform,
                        AgentId::new(*name),
                    )),
                }) as Box<dyn SessionTask>
            })
            .collect();

        runner::run(CollectingParent {
            children: Some(children),
            results: Rc::clone(&results),
        });

        let results = results.borrow();
        assert_eq!(results.len(), 1);
        let senders: Vec<_> = results[0]
            .iter()
            .map(|slot| slot.as_ref().unwrap().sender.name.clone())
            .collect();
        assert_eq!(senders, ["a", "b", "c"]);
    }
}
