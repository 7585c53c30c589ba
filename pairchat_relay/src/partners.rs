// Server-side record of who is currently paired with whom.
//
// Clients still name their partner explicitly on every send, and the relay
// routes on that name alone. This map exists so a disconnect can be reported
// to the one endpoint that cares instead of to everybody.

use std::collections::HashMap;

use pairchat_protocol::EndpointId;

#[derive(Debug, Default)]
pub struct Partners {
    links: HashMap<EndpointId, EndpointId>,
}

impl Partners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `a` and `b` as partners. Any earlier pairing of either side is
    /// dissolved first.
    pub fn link(&mut self, a: EndpointId, b: EndpointId) {
        self.dissolve(a);
        self.dissolve(b);
        self.links.insert(a, b);
        self.links.insert(b, a);
    }

    /// Forget `id`'s pairing on both sides. Returns the former partner.
    pub fn dissolve(&mut self, id: EndpointId) -> Option<EndpointId> {
        let partner = self.links.remove(&id)?;
        if self.links.get(&partner) == Some(&id) {
            self.links.remove(&partner);
        }
        Some(partner)
    }

    pub fn partner_of(&self, id: EndpointId) -> Option<EndpointId> {
        self.links.get(&id).copied()
    }

    /// Number of live pairings.
    pub fn len(&self) -> usize {
        self.links.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
