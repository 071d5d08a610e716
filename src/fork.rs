//! Fork context and block-numbering helpers
//!
//! The simulator distinguishes *forked history* (served by the remote
//! chain) from *simulated history* (synthesized locally). External
//! block numbers are expressed as `forkBlockNumber + internalCounter`;
//! `resolve`/`reverse` below translate between the two spaces and must
//! be exact inverses of one another.

use crate::types::ForkContext;

/// `true` when `block_number` names a block this simulator synthesized
/// (strictly above the fork height).
pub fn is_simulated(ctx: &ForkContext, block_number: u64) -> bool {
    block_number > ctx.fork_block_number
}

/// Translate an internal delta (0 = the fork block itself, 1 = the
/// first synthesized block, ...) into an external block number.
pub fn resolve(ctx: &ForkContext, internal_counter: u64) -> u64 {
    ctx.fork_block_number + internal_counter
}

/// Inverse of `resolve`: translate an external block number back into
/// an internal delta.
///
/// Panics if `block_number < ctx.fork_block_number` — callers must
/// route such numbers to the "fall back to remote" path (see
/// `errors::FALLBACK_TO_REMOTE_SENTINEL`) before calling this.
pub fn reverse(ctx: &ForkContext, block_number: u64) -> u64 {
    block_number - ctx.fork_block_number
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(fork_block_number: u64) -> ForkContext {
        ForkContext {
            chain_url: "http://localhost".to_string(),
            fork_block_number,
            chain_id: 1,
        }
    }

    #[test]
    fn resolve_reverse_are_inverses() {
        let c = ctx(18_000_000);
        for k in [0u64, 1, 2, 500] {
            let external = resolve(&c, k);
            assert_eq!(reverse(&c, external), k);
            assert!(external >= c.fork_block_number);
        }
    }

    #[test]
    fn simulated_iff_strictly_above_fork_block() {
        let c = ctx(100);
        assert!(!is_simulated(&c, 100));
        assert!(!is_simulated(&c, 99));
        assert!(is_simulated(&c, 101));
    }
}
