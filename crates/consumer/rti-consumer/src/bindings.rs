//! Channel tokens resolved once per cycle, then used for every instance.

use hashbrown::HashMap;

use rti_api_core::ChannelKind;
use rti_core::{ChannelRegistry, ChannelToken};

use crate::config::ChannelRequest;

#[derive(Debug, Clone, Default)]
pub struct ChannelBindings {
    names: Vec<String>,
    pairs: Vec<(ChannelToken, ChannelKind)>,
    index: HashMap<String, usize>,
}

impl ChannelBindings {
    /// Bind `wanted` against `registry`; an empty list binds every active
    /// channel in registration order. Unpublished channels bind to the
    /// sentinel token and read as zero.
    pub fn resolve(registry: &ChannelRegistry, wanted: &[ChannelRequest]) -> Self {
        let mut out = ChannelBindings::default();
        if wanted.is_empty() {
            for desc in registry.list_channels() {
                out.push(&desc.name, desc.kind, desc.token);
            }
        } else {
            for req in wanted {
                let token = registry.resolve(&req.name, req.kind);
                if token.is_none() {
                    log::debug!("channel '{}' ({}) not published", req.name, req.kind.name());
                }
                out.push(&req.name, req.kind, token);
            }
        }
        out
    }

    fn push(&mut self, name: &str, kind: ChannelKind, token: ChannelToken) {
        self.index.insert(name.to_string(), self.pairs.len());
        self.names.push(name.to_string());
        self.pairs.push((token, kind));
    }

    /// `(token, kind)` pairs in binding order, as a `FrameReader` takes them.
    #[inline]
    pub fn pairs(&self) -> &[(ChannelToken, ChannelKind)] {
        &self.pairs
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of `name` in each instance's value list.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Names that resolved to the sentinel token.
    pub fn missing(&self) -> impl Iterator<Item = &str> + '_ {
        self.names
            .iter()
            .zip(self.pairs.iter())
            .filter(|(_, (token, _))| token.is_none())
            .map(|(name, _)| name.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
