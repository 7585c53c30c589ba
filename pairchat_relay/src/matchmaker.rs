// Pairs waiting endpoints two at a time.
//
// `run_matching` drains the wait queue pair by pair. Each pair is popped and
// validated against the registry in one step; only when both ends are still
// connected does either side hear about the match. The coordinator runs this
// on its own thread between events, so a disconnect can never land between
// the pop and the notification.
//
// A pair with a missing member is dropped. The surviving member goes back to
// the head of the queue or is stranded, per `SurvivorPolicy`. Each dropped
// pair removes at least one dead id for good, so the loop always ends.

use pairchat_protocol::{EndpointId, ServerMessage};
use tracing::{debug, info};

use crate::config::SurvivorPolicy;
use crate::partners::Partners;
use crate::queue::WaitQueue;
use crate::registry::ConnectionRegistry;

/// Match everyone the queue allows. Returns the pairs that were established,
/// in the order they were made. With an odd number of live entries the
/// last one stays queued.
pub fn run_matching(
    registry: &ConnectionRegistry,
    queue: &mut WaitQueue,
    partners: &mut Partners,
    survivor: SurvivorPolicy,
) -> Vec<(EndpointId, EndpointId)> {
    let mut matched = Vec::new();

    while let Some((first, second)) = queue.pop_pair() {
        let first_active = registry.is_active(first);
        let second_active = registry.is_active(second);

        if first_active && second_active {
            registry.send_to(first, ServerMessage::UserMatched { partner: second });
            registry.send_to(second, ServerMessage::UserMatched { partner: first });
            partners.link(first, second);
            info!(%first, %second, "matched");
            matched.push((first, second));
            continue;
        }

        let remaining = match (first_active, second_active) {
            (true, false) => Some(first),
            (false, true) => Some(second),
            _ => None,
        };
        debug!(%first, %second, ?remaining, "dropped pair with a disconnected member");

        if let (Some(id), SurvivorPolicy::Requeue) = (remaining, survivor) {
            queue.push_front(id);
        }
    }

    matched
}
