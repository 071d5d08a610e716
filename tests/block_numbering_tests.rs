//! Block-numbering invariants (spec §8): every reported block number is
//! at or above the fork block, simulated blocks are strictly above it,
//! and `resolve`/`reverse` are exact inverses.

use fork_sim::ForkContext;

fn ctx(fork_block_number: u64) -> ForkContext {
    ForkContext {
        chain_url: "http://localhost".to_string(),
        fork_block_number,
        chain_id: 1,
    }
}

#[test]
fn resolve_and_reverse_round_trip() {
    let c = ctx(18_500_000);
    for k in [0u64, 1, 2, 10, 999] {
        let external = fork_sim::fork::resolve(&c, k);
        assert!(external >= c.fork_block_number);
        assert_eq!(fork_sim::fork::reverse(&c, external), k);
    }
}

#[test]
fn simulated_blocks_are_strictly_above_fork_block() {
    let c = ctx(1_000);
    assert!(!fork_sim::fork::is_simulated(&c, 1_000));
    assert!(fork_sim::fork::is_simulated(&c, 1_001));
}
