//! Channel registry: maps (name, kind) pairs to opaque tokens.
//!
//! Renderers resolve channel names once per cycle, outside the instance loop,
//! and then read per-target values by token. Names are case-sensitive and
//! opaque to the protocol. A name may be registered under several kinds; each
//! (name, kind) pair is its own channel.
//!
//! Tokens are allocated monotonically over the registry's lifetime, so a token
//! is never handed out again for a different kind. A channel that disappears
//! for a cycle and comes back keeps its token.

use indexmap::{Equivalent, IndexMap};
use serde::{Deserialize, Serialize};

use rti_api_core::ChannelKind;

use crate::ids::IdAllocator;

/// Opaque channel handle. [`ChannelToken::NONE`] is the "no channel" sentinel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelToken(pub i32);

impl ChannelToken {
    pub const NONE: ChannelToken = ChannelToken(-1);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 < 0
    }
}

impl Default for ChannelToken {
    fn default() -> Self {
        ChannelToken::NONE
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub kind: ChannelKind,
    pub token: ChannelToken,
    /// Only meaningful for [`ChannelKind::CustomBlob`].
    pub byte_size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ChannelKey {
    name: String,
    kind: ChannelKind,
}

// Field order matches `ChannelKey` so both hash identically.
#[derive(Hash)]
struct ChannelKeyRef<'a> {
    name: &'a str,
    kind: ChannelKind,
}

impl Equivalent<ChannelKey> for ChannelKeyRef<'_> {
    fn equivalent(&self, key: &ChannelKey) -> bool {
        self.kind == key.kind && self.name == key.name
    }
}

#[derive(Debug)]
struct Entry {
    desc: ChannelDescriptor,
    active: bool,
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    entries: IndexMap<ChannelKey, Entry>,
    by_token: hashbrown::HashMap<ChannelToken, usize>,
    ids: IdAllocator,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active channels in first-registration order.
    pub fn list_channels(&self) -> impl Iterator<Item = &ChannelDescriptor> + '_ {
        self.entries.values().filter(|e| e.active).map(|e| &e.desc)
    }

    /// Names of the active channels of one kind.
    pub fn channel_names(&self, kind: ChannelKind) -> Vec<&str> {
        self.list_channels()
            .filter(|d| d.kind == kind)
            .map(|d| d.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.active).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Token for an exact (name, kind) pair, or [`ChannelToken::NONE`].
    pub fn resolve(&self, name: &str, kind: ChannelKind) -> ChannelToken {
        match self.entries.get(&ChannelKeyRef { name, kind }) {
            Some(e) if e.active => e.desc.token,
            _ => ChannelToken::NONE,
        }
    }

    pub fn descriptor(&self, token: ChannelToken) -> Option<&ChannelDescriptor> {
        let idx = *self.by_token.get(&token)?;
        let (_, entry) = self.entries.get_index(idx)?;
        entry.active.then_some(&entry.desc)
    }

    /// Declared kind of an active token.
    #[inline]
    pub fn kind_of(&self, token: ChannelToken) -> Option<ChannelKind> {
        self.descriptor(token).map(|d| d.kind)
    }

    /// Register (or re-activate) a channel and return its token.
    pub fn register(&mut self, name: &str, kind: ChannelKind) -> ChannelToken {
        self.register_sized(name, kind, 0)
    }

    /// Register a custom-blob channel carrying `byte_size` bytes per target.
    pub fn register_blob(&mut self, name: &str, byte_size: usize) -> ChannelToken {
        self.register_sized(name, ChannelKind::CustomBlob, byte_size)
    }

    fn register_sized(&mut self, name: &str, kind: ChannelKind, byte_size: usize) -> ChannelToken {
        let byte_size = if kind == ChannelKind::CustomBlob { byte_size } else { 0 };
        if let Some(entry) = self.entries.get_mut(&ChannelKeyRef { name, kind }) {
            entry.active = true;
            entry.desc.byte_size = byte_size;
            return entry.desc.token;
        }
        let token = self.ids.alloc_token();
        let key = ChannelKey {
            name: name.to_string(),
            kind,
        };
        let desc = ChannelDescriptor {
            name: name.to_string(),
            kind,
            token,
            byte_size,
        };
        let (idx, _) = self.entries.insert_full(key, Entry { desc, active: true });
        self.by_token.insert(token, idx);
        log::trace!("channel '{}' ({}) registered as {:?}", name, kind.name(), token);
        token
    }

    /// Deactivate every channel; the next cycle re-registers what it publishes.
    pub fn begin_cycle(&mut self) {
        for entry in self.entries.values_mut() {
            entry.active = false;
        }
    }
}
