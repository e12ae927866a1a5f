use chrono::Utc;
use tracing::debug;

use horizon_types::models::{Message, Reaction};

use crate::{MessageStore, StoreError};

impl MessageStore {
    // -- Mutations --

    /// Store a new message. The server stamps its own clock; any timestamp
    /// the client sent is already discarded by this point (clock skew across
    /// clients would otherwise leak into the room's ordering).
    ///
    /// A colliding id silently overwrites the prior record, last-write-wins.
    pub fn create_message(
        &self,
        id: &str,
        username: &str,
        text: &str,
    ) -> Result<Message, StoreError> {
        self.require(id, "message id")?;
        self.require(username, "username")?;
        self.require(text, "message text")?;

        let message = Message {
            id: id.to_string(),
            username: username.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            edited: false,
            reactions: Vec::new(),
        };

        if self.lock().insert(id.to_string(), message.clone()).is_some() {
            debug!(id, "existing message overwritten");
        }
        Ok(message)
    }

    /// Toggle `username`'s reaction: present in the emoji's group, remove it
    /// (dropping the group once empty); absent, add it; no group yet, create
    /// one at the end of the list. Returns the updated reaction groups.
    pub fn toggle_reaction(
        &self,
        message_id: &str,
        emoji: &str,
        username: &str,
    ) -> Result<Vec<Reaction>, StoreError> {
        self.require(message_id, "message id")?;
        self.require(emoji, "emoji")?;
        self.require(username, "username")?;

        let mut messages = self.lock();
        let Some(message) = messages.get_mut(message_id) else {
            return Err(self.reject(StoreError::NotFound));
        };

        match message.reactions.iter().position(|r| r.emoji == emoji) {
            Some(idx) => {
                let group = &mut message.reactions[idx];
                if let Some(pos) = group.users.iter().position(|u| u == username) {
                    group.users.remove(pos);
                    if group.users.is_empty() {
                        message.reactions.remove(idx);
                    }
                } else {
                    group.users.push(username.to_string());
                }
            }
            None => message.reactions.push(Reaction {
                emoji: emoji.to_string(),
                users: vec![username.to_string()],
            }),
        }

        Ok(message.reactions.clone())
    }

    /// Replace a message's text. Only the author may edit; `edited` flips to
    /// true on the first successful edit and never reverts.
    pub fn edit_message(
        &self,
        message_id: &str,
        new_text: &str,
        username: &str,
    ) -> Result<Message, StoreError> {
        self.require(message_id, "message id")?;
        self.require(new_text, "message text")?;
        self.require(username, "username")?;

        let mut messages = self.lock();
        let Some(message) = messages.get_mut(message_id) else {
            return Err(self.reject(StoreError::NotFound));
        };
        self.authorize(message, username)?;

        message.text = new_text.to_string();
        message.edited = true;
        Ok(message.clone())
    }

    /// Hard-remove a message. Only the author may delete; there is no
    /// tombstone, every later reference to the id reports not-found.
    pub fn delete_message(&self, message_id: &str, username: &str) -> Result<(), StoreError> {
        self.require(message_id, "message id")?;
        self.require(username, "username")?;

        let mut messages = self.lock();
        let Some(message) = messages.get(message_id) else {
            return Err(self.reject(StoreError::NotFound));
        };
        self.authorize(message, username)?;

        messages.remove(message_id);
        Ok(())
    }

    // -- Checks --

    /// Ownership is plain string equality against the self-reported username.
    /// That is the protocol's trust model, not authentication; a real
    /// identity check slots in here without touching the mutations above.
    fn authorize(&self, message: &Message, username: &str) -> Result<(), StoreError> {
        if message.username == username {
            Ok(())
        } else {
            Err(self.reject(StoreError::Unauthorized))
        }
    }

    fn require(&self, value: &str, field: &'static str) -> Result<(), StoreError> {
        if value.trim().is_empty() {
            Err(self.reject(StoreError::Malformed(field)))
        } else {
            Ok(())
        }
    }
}
