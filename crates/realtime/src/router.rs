//! Inbound frame routing.
//!
//! The router turns one raw text frame into listener invocations:
//!
//! 1. parse the frame as JSON (malformed -> logged, dropped)
//! 2. read the `type` key (missing -> dropped silently)
//! 3. invoke every listener registered for that type, in order
//!
//! Each invocation is isolated: an `Err` return or a panic is logged and the
//! remaining listeners still run.

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use tracing::{debug, error, trace, warn};

use super::{
    message::{message_types, InboundMessage},
    registry::ListenerRegistry,
};

/// What happened to a frame handed to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Listeners ran; `failed` of them returned an error or panicked.
    Delivered { listeners: usize, failed: usize },

    /// Parsed, but nobody listens to this type (or it had none).
    Unrouted,

    /// Not JSON.
    Malformed,
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<ListenerRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self { registry }
    }

    pub fn route(&self, raw: &str) -> RouteOutcome {
        match InboundMessage::parse(raw) {
            Ok(Some(message)) => self.dispatch(&message),
            Ok(None) => {
                trace!("Dropping frame without a message type");
                RouteOutcome::Unrouted
            }
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                RouteOutcome::Malformed
            }
        }
    }

    pub fn dispatch(&self, message: &InboundMessage) -> RouteOutcome {
        let listeners = self.registry.listeners_for(&message.message_type);
        if listeners.is_empty() {
            if is_server_reply(&message.message_type) {
                trace!(message_type = %message.message_type, "Server reply");
            } else {
                debug!(message_type = %message.message_type, "No listeners, message dropped");
            }
            return RouteOutcome::Unrouted;
        }

        let mut failed = 0;
        for (index, listener) in listeners.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener(&message.payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(
                        message_type = %message.message_type,
                        index,
                        "Listener failed: {}", e
                    );
                }
                Err(panic) => {
                    failed += 1;
                    error!(
                        message_type = %message.message_type,
                        index,
                        "Listener panicked: {}", panic_message(panic.as_ref())
                    );
                }
            }
        }

        RouteOutcome::Delivered {
            listeners: listeners.len(),
            failed,
        }
    }
}

/// Acknowledgements of our own control frames.
pub fn is_server_reply(message_type: &str) -> bool {
    matches!(
        message_type,
        message_types::SUBSCRIBED | message_types::UNSUBSCRIBED | message_types::PONG
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;
    use crate::registry::{Listener, ListenerResult};

    fn capture(seen: &Arc<Mutex<Vec<Value>>>) -> Listener {
        let seen = seen.clone();
        Arc::new(move |payload: &Value| -> ListenerResult {
            seen.lock().unwrap().push(payload.clone());
            Ok(())
        })
    }

    #[test]
    fn test_route_delivers_payload() {
        let registry = Arc::new(ListenerRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        registry.register("stats_update", capture(&seen));

        let outcome = router.route(r#"{"type":"stats_update","data":{"alertsToday":3}}"#);
        assert_eq!(
            outcome,
            RouteOutcome::Delivered {
                listeners: 1,
                failed: 0
            }
        );
        assert_eq!(*seen.lock().unwrap(), vec![json!({"alertsToday": 3})]);
    }

    #[test]
    fn test_failing_listener_does_not_block_the_next() {
        let registry = Arc::new(ListenerRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        registry.register(
            "stats",
            Arc::new(|_: &Value| -> ListenerResult { Err("listener exploded".into()) }),
        );
        registry.register("stats", capture(&seen));

        let outcome = router.route(r#"{"type":"stats","data":1}"#);
        assert_eq!(
            outcome,
            RouteOutcome::Delivered {
                listeners: 2,
                failed: 1
            }
        );
        assert_eq!(*seen.lock().unwrap(), vec![json!(1)]);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let registry = Arc::new(ListenerRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        registry.register(
            "stats",
            Arc::new(|_: &Value| -> ListenerResult { panic!("boom") }),
        );
        registry.register("stats", capture(&seen));

        let outcome = router.route(r#"{"type":"stats","data":"x"}"#);
        assert_eq!(
            outcome,
            RouteOutcome::Delivered {
                listeners: 2,
                failed: 1
            }
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unmatched_and_untyped_frames_are_dropped() {
        let registry = Arc::new(ListenerRegistry::new());
        let router = MessageRouter::new(registry);

        assert_eq!(router.route(r#"{"type":"ping"}"#), RouteOutcome::Unrouted);
        assert_eq!(router.route(r#"{"data":{}}"#), RouteOutcome::Unrouted);
        assert_eq!(router.route("<html>"), RouteOutcome::Malformed);
    }

    #[test]
    fn test_listener_may_cancel_itself_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let handle_slot = Arc::new(Mutex::new(None));

        let handle = {
            let registry = registry.clone();
            let handle_slot = handle_slot.clone();
            registry.clone().register(
                "once",
                Arc::new(move |_: &Value| -> ListenerResult {
                    if let Some(handle) = handle_slot.lock().unwrap().take() {
                        registry.cancel(&handle);
                    }
                    Ok(())
                }),
            )
        };
        *handle_slot.lock().unwrap() = Some(handle);

        assert!(matches!(
            router.route(r#"{"type":"once"}"#),
            RouteOutcome::Delivered { .. }
        ));
        assert_eq!(router.route(r#"{"type":"once"}"#), RouteOutcome::Unrouted);
    }

    #[test]
    fn test_server_replies_reach_listeners_that_ask() {
        let registry = Arc::new(ListenerRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        assert!(is_server_reply("subscribed"));
        assert!(is_server_reply("pong"));
        assert!(!is_server_reply("alert"));

        assert_eq!(router.route(r#"{"type":"pong"}"#), RouteOutcome::Unrouted);

        registry.register(message_types::SUBSCRIBED, capture(&seen));
        router.route(r#"{"type":"subscribed","topic":"stats"}"#);
        router.route(r#"{"type":"unsubscribed","topic":"stats"}"#);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![json!({"type": "subscribed", "topic": "stats"})]
        );
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic payload");
    }
}
