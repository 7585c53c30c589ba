// Session lifecycle coordinator.
//
// `Coordinator` is the single owner of every piece of shared relay state: the
// connection registry, the wait queue and the partner map. `server.rs` runs
// it on one thread and feeds it events over a channel, so each connect,
// queue-join, relay request or disconnect is handled to completion before the
// next one starts. No locks are needed and a disconnect can never interleave
// with a match in progress.
//
// Per-endpoint lifecycle: Connected → Queued → Paired → (Queued | gone).
// - connect:     register, send `welcome` with the assigned id.
// - queue-join:  dissolve any current pairing, enqueue (idempotent), match.
// - disconnect:  unregister, leave the queue, notify per `DisconnectNotice`.
//
// Routing never consults the partner map: chat and signals go wherever the
// client says, provided the destination is connected. The map only decides
// who hears about a departure.

use pairchat_protocol::{EndpointId, ServerMessage};
use tracing::{debug, info};

use crate::config::{DisconnectNotice, RelayConfig, SurvivorPolicy};
use crate::matchmaker::run_matching;
use crate::partners::Partners;
use crate::queue::WaitQueue;
use crate::registry::{ConnectionRegistry, Outbox};
use crate::relay::{self, Forwarded, Payload};

/// Where an endpoint currently sits in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointState {
    /// Connected, neither waiting nor paired.
    Connected,
    /// Waiting in the queue.
    Queued,
    /// Matched with a partner.
    Paired,
}

pub struct Coordinator {
    registry: ConnectionRegistry,
    queue: WaitQueue,
    partners: Partners,
    disconnect_notice: DisconnectNotice,
    survivor: SurvivorPolicy,
}

impl Coordinator {
    pub fn new(disconnect_notice: DisconnectNotice, survivor: SurvivorPolicy) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            queue: WaitQueue::new(),
            partners: Partners::new(),
            disconnect_notice,
            survivor,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.disconnect_notice, config.survivor)
    }

    /// Register a new connection and greet it with its id.
    pub fn connect(&mut self, outbox: Outbox) -> EndpointId {
        let mut id = EndpointId::random();
        while self.registry.is_active(id) {
            id = EndpointId::random();
        }
        self.registry.register(id, outbox);
        self.registry.send_to(id, ServerMessage::Welcome { id });
        info!(%id, connections = self.registry.len(), "connected");
        id
    }

    /// Put `id` in the wait queue and run matching. Returns the pairs made.
    ///
    /// A client that is still paired when it asks to queue again is leaving
    /// its partner; the pairing is dissolved before it is queued.
    pub fn queue_join(&mut self, id: EndpointId) -> Vec<(EndpointId, EndpointId)> {
        if !self.registry.is_active(id) {
            debug!(%id, "queue-join from unknown endpoint ignored");
            return Vec::new();
        }

        if let Some(former) = self.partners.dissolve(id) {
            debug!(%id, %former, "left pairing to requeue");
            if self.disconnect_notice == DisconnectNotice::Partner {
                self.registry
                    .send_to(former, ServerMessage::PeerDisconnected { id: Some(id) });
            }
        }

        if !self.queue.enqueue(id) {
            debug!(%id, "already queued");
            return Vec::new();
        }
        info!(%id, waiting = self.queue.len(), "joined queue");

        run_matching(
            &self.registry,
            &mut self.queue,
            &mut self.partners,
            self.survivor,
        )
    }

    /// Relay chat text from `from` to `to`.
    pub fn chat(&mut self, from: EndpointId, to: Option<EndpointId>, message: String) -> Forwarded {
        relay::forward(&self.registry, from, to, Payload::Chat(message))
    }

    /// Relay an opaque signaling blob from `from` to `to`.
    pub fn signal(
        &mut self,
        from: EndpointId,
        to: Option<EndpointId>,
        signal: serde_json::Value,
    ) -> Forwarded {
        relay::forward(&self.registry, from, to, Payload::Signal(signal))
    }

    /// Tear down `id`. Returns `false` if it was already gone.
    pub fn disconnect(&mut self, id: EndpointId) -> bool {
        if !self.registry.unregister(id) {
            return false;
        }
        let was_queued = self.queue.remove(id);
        let partner = self.partners.dissolve(id);

        let notice = ServerMessage::PeerDisconnected { id: Some(id) };
        let notified = match self.disconnect_notice {
            DisconnectNotice::Partner => partner
                .map(|p| usize::from(self.registry.send_to(p, notice)))
                .unwrap_or(0),
            DisconnectNotice::Broadcast => self.registry.broadcast_except(id, &notice),
        };

        info!(
            %id,
            was_queued,
            ?partner,
            notified,
            connections = self.registry.len(),
            "disconnected"
        );
        true
    }

    pub fn state_of(&self, id: EndpointId) -> Option<EndpointState> {
        if !self.registry.is_active(id) {
            None
        } else if self.queue.contains(id) {
            Some(EndpointState::Queued)
        } else if self.partners.partner_of(id).is_some() {
            Some(EndpointState::Paired)
        } else {
            Some(EndpointState::Connected)
        }
    }

    pub fn is_active(&self, id: EndpointId) -> bool {
        self.registry.is_active(id)
    }

    pub fn partner_of(&self, id: EndpointId) -> Option<EndpointId> {
        self.partners.partner_of(id)
    }

    /// Ids in the wait queue, longest-waiting first.
    pub fn waiting(&self) -> Vec<EndpointId> {
        self.queue.iter().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};

    use serde_json::json;

    use super::*;
    use crate::registry::OUTBOX_CAPACITY;

    /// A connected test endpoint: its id and everything sent to it.
    struct Client {
        id: EndpointId,
        inbox: Receiver<ServerMessage>,
    }

    impl Client {
        fn connect(coordinator: &mut Coordinator) -> Self {
            let (tx, inbox) = mpsc::sync_channel(OUTBOX_CAPACITY);
            let id = coordinator.connect(tx);
            let client = Self { id, inbox };
            assert_eq!(client.next(), ServerMessage::Welcome { id });
            client
        }

        fn next(&self) -> ServerMessage {
            self.inbox.try_recv().expect("expected a message")
        }

        fn assert_silent(&self) {
            if let Ok(msg) = self.inbox.try_recv() {
                panic!("expected no message, got {msg:?}");
            }
        }
    }

    fn targeted() -> Coordinator {
        Coordinator::new(DisconnectNotice::Partner, SurvivorPolicy::Requeue)
    }

    fn broadcasting() -> Coordinator {
        Coordinator::new(DisconnectNotice::Broadcast, SurvivorPolicy::Requeue)
    }

    #[test]
    fn connect_assigns_distinct_ids() {
        let mut coordinator = targeted();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);

        assert_ne!(a.id, b.id);
        assert_eq!(coordinator.connection_count(), 2);
        assert_eq!(coordinator.state_of(a.id), Some(EndpointState::Connected));
    }

    #[test]
    fn two_joins_make_a_pair() {
        let mut coordinator = targeted();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);

        assert!(coordinator.queue_join(a.id).is_empty());
        assert_eq!(coordinator.state_of(a.id), Some(EndpointState::Queued));
        assert_eq!(coordinator.queue_join(b.id), vec![(a.id, b.id)]);

        assert_eq!(a.next(), ServerMessage::UserMatched { partner: b.id });
        assert_eq!(b.next(), ServerMessage::UserMatched { partner: a.id });
        assert!(coordinator.waiting().is_empty());
        assert_eq!(coordinator.state_of(a.id), Some(EndpointState::Paired));
        assert_eq!(coordinator.partner_of(b.id), Some(a.id));
    }

    #[test]
    fn repeated_join_is_absorbed() {
        let mut coordinator = targeted();
        let a = Client::connect(&mut coordinator);

        coordinator.queue_join(a.id);
        coordinator.queue_join(a.id);
        coordinator.queue_join(a.id);

        assert_eq!(coordinator.waiting(), vec![a.id]);
        a.assert_silent();
    }

    #[test]
    fn join_from_unknown_endpoint_is_ignored() {
        let mut coordinator = targeted();
        let stranger = EndpointId::random();

        assert!(coordinator.queue_join(stranger).is_empty());
        assert!(coordinator.waiting().is_empty());
        assert_eq!(coordinator.state_of(stranger), None);
    }

    #[test]
    fn disconnect_clears_registry_and_queue() {
        let mut coordinator = targeted();
        let a = Client::connect(&mut coordinator);
        coordinator.queue_join(a.id);

        assert!(coordinator.disconnect(a.id));
        assert!(!coordinator.is_active(a.id));
        assert!(coordinator.waiting().is_empty());
        assert_eq!(coordinator.state_of(a.id), None);
        // Duplicate teardown events are harmless.
        assert!(!coordinator.disconnect(a.id));
    }

    #[test]
    fn partner_hears_about_disconnect_and_nobody_else_does() {
        let mut coordinator = targeted();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);
        let c = Client::connect(&mut coordinator);
        coordinator.queue_join(a.id);
        coordinator.queue_join(b.id);
        let _ = (a.next(), b.next());

        coordinator.disconnect(b.id);

        assert_eq!(a.next(), ServerMessage::PeerDisconnected { id: Some(b.id) });
        c.assert_silent();
        assert_eq!(coordinator.state_of(a.id), Some(EndpointState::Connected));
    }

    #[test]
    fn broadcast_mode_tells_everyone() {
        let mut coordinator = broadcasting();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);
        let c = Client::connect(&mut coordinator);

        coordinator.disconnect(a.id);

        let notice = ServerMessage::PeerDisconnected { id: Some(a.id) };
        assert_eq!(b.next(), notice);
        assert_eq!(c.next(), notice);
    }

    #[test]
    fn three_clients_scenario() {
        let mut coordinator = broadcasting();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);
        let c = Client::connect(&mut coordinator);

        coordinator.queue_join(a.id);
        coordinator.queue_join(b.id);
        assert_eq!(a.next(), ServerMessage::UserMatched { partner: b.id });
        assert_eq!(b.next(), ServerMessage::UserMatched { partner: a.id });

        coordinator.queue_join(c.id);
        assert_eq!(coordinator.waiting(), vec![c.id]);

        coordinator.disconnect(b.id);
        let notice = ServerMessage::PeerDisconnected { id: Some(b.id) };
        assert_eq!(a.next(), notice);
        assert_eq!(c.next(), notice);
        assert_eq!(coordinator.waiting(), vec![c.id]);

        let d = Client::connect(&mut coordinator);
        assert_eq!(coordinator.queue_join(d.id), vec![(c.id, d.id)]);
        assert_eq!(c.next(), ServerMessage::UserMatched { partner: d.id });
    }

    #[test]
    fn requeue_while_paired_frees_the_partner() {
        let mut coordinator = targeted();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);
        coordinator.queue_join(a.id);
        coordinator.queue_join(b.id);
        let _ = (a.next(), b.next());

        // A skips to the next stranger.
        coordinator.queue_join(a.id);

        assert_eq!(b.next(), ServerMessage::PeerDisconnected { id: Some(a.id) });
        assert_eq!(coordinator.state_of(a.id), Some(EndpointState::Queued));
        assert_eq!(coordinator.state_of(b.id), Some(EndpointState::Connected));

        // B's later departure no longer concerns A.
        coordinator.disconnect(b.id);
        a.assert_silent();
    }

    #[test]
    fn requeue_while_paired_is_quiet_in_broadcast_mode() {
        let mut coordinator = broadcasting();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);
        coordinator.queue_join(a.id);
        coordinator.queue_join(b.id);
        let _ = (a.next(), b.next());

        coordinator.queue_join(a.id);

        b.assert_silent();
        assert_eq!(coordinator.waiting(), vec![a.id]);
    }

    #[test]
    fn signal_to_departed_partner_bounces() {
        let mut coordinator = targeted();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);
        let c = Client::connect(&mut coordinator);
        coordinator.disconnect(b.id);

        let outcome = coordinator.signal(a.id, Some(b.id), json!({"type": "offer"}));

        assert_eq!(outcome, Forwarded::BouncedToSender);
        assert_eq!(a.next(), ServerMessage::PeerDisconnected { id: Some(b.id) });
        a.assert_silent();
        c.assert_silent();
    }

    #[test]
    fn chat_to_departed_partner_is_dropped() {
        let mut coordinator = targeted();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);
        let c = Client::connect(&mut coordinator);
        coordinator.disconnect(b.id);

        assert_eq!(coordinator.chat(a.id, Some(b.id), "still there?".into()), Forwarded::Dropped);
        a.assert_silent();
        c.assert_silent();
    }

    #[test]
    fn chat_between_partners() {
        let mut coordinator = targeted();
        let a = Client::connect(&mut coordinator);
        let b = Client::connect(&mut coordinator);
        coordinator.queue_join(a.id);
        coordinator.queue_join(b.id);
        let _ = (a.next(), b.next());

        coordinator.chat(a.id, Some(b.id), "hello".into());

        assert_eq!(
            b.next(),
            ServerMessage::ChatMessage {
                from: a.id,
                message: "hello".into(),
            }
        );
        a.assert_silent();
    }
}
