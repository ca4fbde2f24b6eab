//! Identifier allocators owned by a provider for its whole lifetime.

use crate::channels::ChannelToken;

/// Monotonic allocator for channel tokens and fallback birth IDs.
/// Tokens are dense from 0; generated birth IDs count down from -1 so they
/// stay clear of the non-negative IDs generators usually supply.
#[derive(Debug)]
pub struct IdAllocator {
    next_token: i32,
    next_birth: i64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next_token: 0,
            next_birth: -1,
        }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_token(&mut self) -> ChannelToken {
        let token = ChannelToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1).max(0);
        token
    }

    #[inline]
    pub fn alloc_birth_id(&mut self) -> i64 {
        let id = self.next_birth;
        self.next_birth = self.next_birth.wrapping_sub(1);
        id
    }
}
