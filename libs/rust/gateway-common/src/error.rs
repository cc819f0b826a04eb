//! Error cause-chain utilities.
//!
//! Wrapper errors (circuit-breaker wrappers, domain wrappers) bury the
//! interesting failure several levels deep. `source_chain` walks the
//! `std::error::Error::source` chain with a hop bound so that handlers can
//! dispatch on the first recognized cause without looping on a
//! self-referential chain.

use std::error::Error;

/// Upper bound on cause-chain hops. A chain deeper than this is either a
/// bug or a cycle; iteration stops instead of spinning.
pub const MAX_SOURCE_HOPS: usize = 32;

/// Iterate over an error and its transitive causes, outermost first.
///
/// The iterator always terminates: it yields at most [`MAX_SOURCE_HOPS`]
/// entries even when an error reports itself as its own source.
pub fn source_chain<'a>(err: &'a (dyn Error + 'static)) -> SourceChain<'a> {
    SourceChain {
        current: Some(err),
        hops: 0,
    }
}

/// Iterator returned by [`source_chain`].
pub struct SourceChain<'a> {
    current: Option<&'a (dyn Error + 'static)>,
    hops: usize,
}

impl<'a> Iterator for SourceChain<'a> {
    type Item = &'a (dyn Error + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        if self.hops >= MAX_SOURCE_HOPS {
            return None;
        }
        let current = self.current.take()?;
        self.hops += 1;
        self.current = current.source();
        Some(current)
    }
}
