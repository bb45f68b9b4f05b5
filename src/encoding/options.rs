use crate::ActorId;

/// Settings for [`Document::save_with`](crate::Document::save_with) and friends.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Compress the change records with lz4, if that makes them smaller. Ignored without the
    /// `lz4` feature.
    pub(crate) compress_content: bool,

    /// Store the local actor id in the file, so [`ActorPolicy::Reuse`] can pick it back up.
    pub(crate) store_actor: bool,
}

pub const ENCODE_FULL: EncodeOptions = EncodeOptions {
    compress_content: true,
    store_actor: true,
};

impl Default for EncodeOptions {
    fn default() -> Self {
        ENCODE_FULL
    }
}

impl EncodeOptions {
    pub fn compress_content(mut self, compress_content: bool) -> Self {
        self.compress_content = compress_content;
        self
    }

    pub fn store_actor(mut self, store_actor: bool) -> Self {
        self.store_actor = store_actor;
        self
    }
}

/// Which actor a loaded document edits as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActorPolicy {
    /// Use the actor stored in the file, or a fresh one if there isn't one.
    #[default]
    Reuse,
    /// Always mint a new actor. Use this when the same file may be opened by more than one
    /// replica.
    Fresh,
    Explicit(ActorId),
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub actor: ActorPolicy,

    /// Check the CRC trailer. Turning this off is only useful for debugging damaged files.
    pub verify_checksum: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            actor: ActorPolicy::Reuse,
            verify_checksum: true,
        }
    }
}

impl LoadOptions {
    pub fn actor(mut self, actor: ActorPolicy) -> Self {
        self.actor = actor;
        self
    }

    pub fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub(crate) fn resolve_actor(&self, stored: Option<ActorId>) -> ActorId {
        match self.actor {
            ActorPolicy::Reuse => stored.unwrap_or_else(ActorId::random),
            ActorPolicy::Fresh => ActorId::random(),
            ActorPolicy::Explicit(actor) => actor,
        }
    }
}
