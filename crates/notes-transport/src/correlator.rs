//! Matching inbound frames to pending requests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
};

use notes_core::{Action, CorrelationStrategy, RequestId, ServerMessage, Status};
use tokio::sync::oneshot;

use crate::TransportError;

/// Outcome delivered to a waiting request.
pub type Reply = Result<ServerMessage, TransportError>;

struct Pending {
    action: Action,
    tx: oneshot::Sender<Reply>,
}

#[derive(Default)]
struct Inner {
    by_id: HashMap<RequestId, Pending>,
    // Issue order, oldest first.
    order: VecDeque<RequestId>,
}

impl Inner {
    fn take(&mut self, id: &RequestId) -> Option<Pending> {
        let pending = self.by_id.remove(id)?;
        self.order.retain(|queued| queued != id);
        Some(pending)
    }

    fn take_oldest(&mut self) -> Option<(RequestId, Pending)> {
        while let Some(id) = self.order.pop_front() {
            if let Some(pending) = self.by_id.remove(&id) {
                return Some((id, pending));
            }
        }
        None
    }
}

/// One-shot list of requests waiting for a reply.
///
/// Kept apart from the broadcast list: resolving a request here never stops
/// the same frame from reaching push subscribers.
pub struct Correlator {
    strategy: CorrelationStrategy,
    inner: Mutex<Inner>,
}

impl Correlator {
    #[must_use]
    pub fn new(strategy: CorrelationStrategy) -> Self {
        Self {
            strategy,
            inner: Mutex::new(Inner::default()),
        }
    }

    #[must_use]
    pub const fn strategy(&self) -> CorrelationStrategy {
        self.strategy
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new pending request.
    pub fn register(&self, action: Action) -> (RequestId, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner();
        let mut id = RequestId::generate();
        while inner.by_id.contains_key(&id) {
            id = RequestId::generate();
        }
        inner.order.push_back(id.clone());
        inner.by_id.insert(id.clone(), Pending { action, tx });
        (id, rx)
    }

    /// Drop a pending request without resolving it.
    pub fn cancel(&self, id: &RequestId) {
        self.inner().take(id);
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner().by_id.len()
    }

    /// Resolve the pending request `msg` answers, if any.
    ///
    /// The resolved request's action and id are copied into `msg` where it
    /// has none, so later subscribers can route the reply. Returns whether a
    /// request was resolved.
    pub fn resolve(&self, msg: &mut ServerMessage) -> bool {
        let taken = {
            let mut inner = self.inner();
            match self.strategy {
                CorrelationStrategy::ById => match msg.request_id.clone() {
                    Some(id) => inner.take(&id).map(|pending| (id, pending)),
                    None if msg.status == Status::Connected => None,
                    None => inner.take_oldest(),
                },
                CorrelationStrategy::NextMessage => inner.take_oldest(),
            }
        };

        let Some((id, pending)) = taken else {
            return false;
        };

        if msg.action.is_none() {
            msg.action = Some(pending.action);
        }
        if msg.request_id.is_none() {
            msg.request_id = Some(id.clone());
        }
        if pending.tx.send(Ok(msg.clone())).is_err() {
            tracing::debug!(request_id = %id, "requester went away before its reply");
        }
        true
    }

    /// Handle a frame that could not be parsed.
    ///
    /// The request it answers, found by any `request_id` still readable in
    /// the frame or else the oldest one, is resolved with an error-status
    /// reply. That reply is returned stamped for broadcast. Leaving the
    /// request queued would hand its slot to the next id-less reply.
    pub fn reject_unparseable(&self, raw: &str) -> Option<ServerMessage> {
        let taken = {
            let mut inner = self.inner();
            match (self.strategy, recover_request_id(raw)) {
                (CorrelationStrategy::ById, Some(id)) => {
                    inner.take(&id).map(|pending| (id, pending))
                }
                _ => inner.take_oldest(),
            }
        };
        let (id, pending) = taken?;

        let mut msg = ServerMessage::error("Invalid server response");
        msg.action = Some(pending.action);
        msg.request_id = Some(id);
        let _ = pending.tx.send(Ok(msg.clone()));
        Some(msg)
    }

    /// Fail every pending request with `ConnectionLost`.
    pub fn fail_all(&self) {
        let drained: Vec<Pending> = {
            let mut inner = self.inner();
            inner.order.clear();
            inner.by_id.drain().map(|(_, pending)| pending).collect()
        };
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "failing requests left pending by closed connection");
        }
        for pending in drained {
            let _ = pending.tx.send(Err(TransportError::ConnectionLost));
        }
    }
}

/// `request_id` of a frame whose other fields failed to parse.
fn recover_request_id(raw: &str) -> Option<RequestId> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let id = value.get("request_id")?.as_str()?;
    Some(RequestId::from(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(body: &str) -> ServerMessage {
        ServerMessage {
            status: Status::Success,
            message: Some(body.to_string()),
            ..ServerMessage::default()
        }
    }

    fn reply_to(id: &RequestId, body: &str) -> ServerMessage {
        ServerMessage {
            request_id: Some(id.clone()),
            ..reply(body)
        }
    }

    #[tokio::test]
    async fn test_next_message_misroutes_reordered_replies() {
        let correlator = Correlator::new(CorrelationStrategy::NextMessage);
        let (login_id, login_rx) = correlator.register(Action::Login);
        let (notes_id, notes_rx) = correlator.register(Action::GetNotes);

        // Server answers the second request first.
        assert!(correlator.resolve(&mut reply_to(&notes_id, "notes")));
        assert!(correlator.resolve(&mut reply_to(&login_id, "login")));

        let login = login_rx.await.unwrap().unwrap();
        let notes = notes_rx.await.unwrap().unwrap();
        assert_eq!(login.message.as_deref(), Some("notes"));
        assert_eq!(login.request_id.as_ref(), Some(&notes_id));
        assert_eq!(notes.message.as_deref(), Some("login"));
    }

    #[tokio::test]
    async fn test_by_id_routes_reordered_replies() {
        let correlator = Correlator::new(CorrelationStrategy::ById);
        let (login_id, login_rx) = correlator.register(Action::Login);
        let (notes_id, notes_rx) = correlator.register(Action::GetNotes);

        assert!(correlator.resolve(&mut reply_to(&notes_id, "notes")));
        assert!(correlator.resolve(&mut reply_to(&login_id, "login")));

        assert_eq!(login_rx.await.unwrap().unwrap().message.as_deref(), Some("login"));
        assert_eq!(notes_rx.await.unwrap().unwrap().message.as_deref(), Some("notes"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_by_id_ignores_unknown_ids_and_connected_pushes() {
        let correlator = Correlator::new(CorrelationStrategy::ById);
        let (_id, _rx) = correlator.register(Action::GetNotes);

        let stranger = RequestId::from("req_stranger".to_string());
        assert!(!correlator.resolve(&mut reply_to(&stranger, "x")));

        let mut connected = ServerMessage {
            status: Status::Connected,
            ..ServerMessage::default()
        };
        assert!(!correlator.resolve(&mut connected));
        assert_eq!(correlator.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_reply_without_id_goes_to_oldest_and_is_stamped() {
        let correlator = Correlator::new(CorrelationStrategy::ById);
        let (first_id, first_rx) = correlator.register(Action::CreateNote);
        let (_second_id, _second_rx) = correlator.register(Action::GetNotes);

        let mut msg = reply("created");
        assert!(correlator.resolve(&mut msg));
        assert_eq!(msg.action, Some(Action::CreateNote));
        assert_eq!(msg.request_id.as_ref(), Some(&first_id));

        let got = first_rx.await.unwrap().unwrap();
        assert_eq!(got, msg);
        assert_eq!(correlator.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_all_and_cancel() {
        let correlator = Correlator::new(CorrelationStrategy::ById);
        let (a, _a_rx) = correlator.register(Action::Login);
        let (_b, b_rx) = correlator.register(Action::Logout);

        correlator.cancel(&a);
        assert_eq!(correlator.pending_count(), 1);

        correlator.fail_all();
        assert!(matches!(b_rx.await.unwrap(), Err(TransportError::ConnectionLost)));
        assert_eq!(correlator.pending_count(), 0);
        assert!(!correlator.resolve(&mut reply("late")));
    }

    #[tokio::test]
    async fn test_unparseable_frame_consumes_oldest_in_legacy_mode() {
        let legacy = Correlator::new(CorrelationStrategy::NextMessage);
        let (_id, rx) = legacy.register(Action::Login);
        let stamped = legacy.reject_unparseable("<html>").unwrap();
        assert_eq!(stamped.action, Some(Action::Login));
        let got = rx.await.unwrap().unwrap();
        assert_eq!(got.status, Status::Error);
        assert_eq!(got.message.as_deref(), Some("Invalid server response"));
        assert!(legacy.reject_unparseable("<html>").is_none());
    }

    #[tokio::test]
    async fn test_unparseable_frame_keeps_id_less_replies_aligned() {
        let correlator = Correlator::new(CorrelationStrategy::ById);
        let (_notes_id, notes_rx) = correlator.register(Action::GetNotes);
        let (create_id, create_rx) = correlator.register(Action::CreateNote);

        let failed = correlator.reject_unparseable("{not json").unwrap();
        assert_eq!(failed.action, Some(Action::GetNotes));

        let mut created = reply("Note created successfully");
        assert!(correlator.resolve(&mut created));
        assert_eq!(created.action, Some(Action::CreateNote));
        assert_eq!(created.request_id.as_ref(), Some(&create_id));

        let notes = notes_rx.await.unwrap().unwrap();
        assert_eq!(notes.status, Status::Error);
        assert_eq!(notes.message.as_deref(), Some("Invalid server response"));
        assert_eq!(
            create_rx.await.unwrap().unwrap().message.as_deref(),
            Some("Note created successfully")
        );
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_frame_with_readable_id_fails_that_request() {
        let correlator = Correlator::new(CorrelationStrategy::ById);
        let (_login_id, _login_rx) = correlator.register(Action::Login);
        let (notes_id, notes_rx) = correlator.register(Action::GetNotes);

        let raw = format!(r#"{{"status":7,"request_id":"{notes_id}"}}"#);
        let failed = correlator.reject_unparseable(&raw).unwrap();
        assert_eq!(failed.request_id.as_ref(), Some(&notes_id));
        assert_eq!(notes_rx.await.unwrap().unwrap().status, Status::Error);
        assert_eq!(correlator.pending_count(), 1);

        let stranger = r#"{"status":7,"request_id":"req_stranger"}"#;
        assert!(correlator.reject_unparseable(stranger).is_none());
        assert_eq!(correlator.pending_count(), 1);
    }
}
