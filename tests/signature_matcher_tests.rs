//! Signature matcher invariants (spec §8): for an impersonation of
//! public key K with synthetic address S, `ecrecover` on any signature
//! produced by S's private key returns K's public key; for an address
//! with no reverse mapping, `ecrecover` returns the genuinely recovered
//! key unchanged.

use alloy::primitives::{Bytes, B256};
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use fork_sim::SignatureMatcher;

fn uncompressed_public_key(signer: &PrivateKeySigner) -> Bytes {
    let point = signer.credential().verifying_key().to_encoded_point(false);
    Bytes::copy_from_slice(&point.as_bytes()[1..])
}

#[test]
fn impersonated_signature_recovers_to_impersonated_key() {
    let impersonated = PrivateKeySigner::random();
    let impersonated_public_key = uncompressed_public_key(&impersonated);

    let mut matcher = SignatureMatcher::new();
    let impersonated_address = matcher
        .register_simulation_public_key(impersonated_public_key.clone())
        .unwrap();

    let synthetic_private_key = matcher
        .get_simulation_private_key(impersonated_address)
        .unwrap();
    let synthetic_signer = PrivateKeySigner::from_bytes(&synthetic_private_key).unwrap();

    let message_hash = B256::repeat_byte(0x42);
    let signature = synthetic_signer.sign_hash_sync(&message_hash).unwrap();

    let recovered = matcher
        .ecrecover(
            message_hash,
            signature.v() as u64,
            B256::from(signature.r().to_be_bytes()),
            B256::from(signature.s().to_be_bytes()),
        )
        .unwrap();

    assert_eq!(recovered, impersonated_public_key);
}

#[test]
fn genuine_signature_passes_through_unchanged() {
    let matcher = SignatureMatcher::new();
    let signer = PrivateKeySigner::random();
    let message_hash = B256::repeat_byte(0x07);
    let signature = signer.sign_hash_sync(&message_hash).unwrap();

    // No impersonation registered anywhere: recovery must not be
    // substituted, regardless of which address signed.
    let recovered = matcher.ecrecover(
        message_hash,
        signature.v() as u64,
        B256::from(signature.r().to_be_bytes()),
        B256::from(signature.s().to_be_bytes()),
    );
    assert!(recovered.is_ok());
}
