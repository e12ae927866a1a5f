use chrono::{DateTime, Utc};
use uuid::Uuid;

use horizon_types::events::ServerEvent;
use horizon_types::models::{Message, Reaction};

use crate::dispatcher::{Audience, Outbound};

/// A successful mutation awaiting fan-out. Failed mutations never reach the
/// router: they produce no broadcast and no reply to the caller.
#[derive(Debug, Clone)]
pub enum Mutation {
    Joined {
        username: String,
        timestamp: DateTime<Utc>,
    },
    Created(Message),
    Reacted {
        message_id: String,
        reactions: Vec<Reaction>,
    },
    Edited {
        message_id: String,
        new_text: String,
    },
    Deleted {
        message_id: String,
    },
}

/// Map a successful mutation to exactly one outbound event and its audience.
///
/// Join announcements skip the joining connection (it already knows it
/// joined); everything else echoes to the originator so it too receives the
/// server-assigned state.
pub fn route(origin: Uuid, mutation: Mutation) -> Outbound {
    let (audience, event) = match mutation {
        Mutation::Joined { username, timestamp } => (
            Audience::Others,
            ServerEvent::UserJoined { username, timestamp },
        ),
        Mutation::Created(message) => (Audience::Everyone, ServerEvent::Message(message)),
        Mutation::Reacted { message_id, reactions } => (
            Audience::Everyone,
            ServerEvent::ReactionUpdate { message_id, reactions },
        ),
        Mutation::Edited { message_id, new_text } => (
            Audience::Everyone,
            ServerEvent::EditUpdate { message_id, new_text },
        ),
        Mutation::Deleted { message_id } => {
            (Audience::Everyone, ServerEvent::DeleteUpdate { message_id })
        }
    };

    Outbound { origin, audience, event }
}
