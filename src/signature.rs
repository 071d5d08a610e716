//! Signature Matcher
//!
//! Lets the simulator execute transactions "from" arbitrary public
//! addresses it holds no private key for. A synthetic key pair stands
//! in for the real one; a custom `ecrecover` hook rewrites signature
//! recovery so the EVM observes the intended (impersonated) sender.

use std::collections::HashMap;

use alloy::{
    primitives::{Address, Bytes, Signature, B256},
    signers::local::PrivateKeySigner,
};

use crate::errors::SimError;

/// Maintains the impersonation maps and provides the `ecrecover`
/// substitution hook injected into the EVM's crypto configuration.
///
/// Ownership: exclusively owns `impersonated_public_keys`,
/// `synthetic_private_keys` and `synthetic_to_impersonated` — no other
/// component reaches into these maps directly.
#[derive(Default)]
pub struct SignatureMatcher {
    impersonated_public_keys: HashMap<Address, Bytes>,
    synthetic_private_keys: HashMap<Address, B256>,
    synthetic_to_impersonated: HashMap<Address, Address>,
}

impl SignatureMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a public key to be impersonated. Derives the address
    /// implied by the key and stores the mapping.
    pub fn register_simulation_public_key(&mut self, public_key: Bytes) -> Result<Address, SimError> {
        let address = address_from_public_key(&public_key)?;
        self.impersonated_public_keys.insert(address, public_key);
        Ok(address)
    }

    pub fn is_public_key_registered(&self, address: Address) -> bool {
        self.impersonated_public_keys.contains_key(&address)
    }

    /// Get (generating on first use) the synthetic private key that
    /// signs on behalf of `address`.
    ///
    /// Fails with `Precondition` if `address`'s public key was never
    /// registered.
    pub fn get_simulation_private_key(&mut self, address: Address) -> Result<B256, SimError> {
        if !self.is_public_key_registered(address) {
            return Err(SimError::Precondition(format!(
                "no public key registered for {address}"
            )));
        }
        if let Some(key) = self.synthetic_private_keys.get(&address) {
            return Ok(*key);
        }
        let signer = PrivateKeySigner::random();
        let private_key = B256::from(signer.to_bytes());
        let synthetic_address = signer.address();
        self.synthetic_private_keys.insert(address, private_key);
        self.synthetic_to_impersonated.insert(synthetic_address, address);
        Ok(private_key)
    }

    /// The custom `ecrecover` hook. Performs real ECDSA recovery; if
    /// the recovered address has no reverse mapping, the signature is
    /// genuine and the recovered key is returned unchanged. Otherwise
    /// the impersonated address's registered public key is returned
    /// instead — the substitution that lets the EVM treat a
    /// synthetic-key-signed transaction as coming from the impersonated
    /// address.
    ///
    /// Fails with `Internal` if a reverse mapping exists but the
    /// impersonated address's public key is missing — a consistency
    /// breach the matcher itself should never produce.
    pub fn ecrecover(
        &self,
        msg_hash: B256,
        v: u64,
        r: B256,
        s: B256,
    ) -> Result<Bytes, SimError> {
        use alloy::primitives::U256;
        let signature = Signature::new(U256::from_be_bytes(r.0), U256::from_be_bytes(s.0), v != 0);
        let recovered_address = signature
            .recover_address_from_prehash(&msg_hash)
            .map_err(|e| SimError::Internal(format!("ecrecover failed: {e}")))?;

        match self.synthetic_to_impersonated.get(&recovered_address) {
            None => {
                log::debug!("signature matcher: pass-through recovery for {recovered_address}");
                Ok(recovered_public_key_bytes(&signature, &msg_hash)?)
            }
            Some(impersonated) => {
                log::debug!(
                    "signature matcher: substituting recovered key for impersonated {impersonated}"
                );
                self.impersonated_public_keys
                    .get(impersonated)
                    .cloned()
                    .ok_or_else(|| {
                        SimError::Internal(format!(
                            "reverse mapping for {recovered_address} points at {impersonated}, \
                             but no public key is registered for it"
                        ))
                    })
            }
        }
    }
}

fn address_from_public_key(public_key: &Bytes) -> Result<Address, SimError> {
    use alloy::primitives::keccak256;
    if public_key.len() != 64 {
        return Err(SimError::InvalidArgument(format!(
            "expected a 64-byte uncompressed public key (no 0x04 prefix), got {} bytes",
            public_key.len()
        )));
    }
    let hash = keccak256(public_key.as_ref());
    Ok(Address::from_slice(&hash[12..]))
}

fn recovered_public_key_bytes(signature: &Signature, msg_hash: &B256) -> Result<Bytes, SimError> {
    let recovered_key = signature
        .recover_from_prehash(msg_hash)
        .map_err(|e| SimError::Internal(format!("public key recovery failed: {e}")))?;
    let encoded = recovered_key.to_encoded_point(false);
    Ok(Bytes::copy_from_slice(&encoded.as_bytes()[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_public_key() -> Bytes {
        // Arbitrary 64-byte value; matcher only hashes it, never
        // validates curve membership at registration time.
        Bytes::from(vec![7u8; 64])
    }

    #[test]
    fn requires_registration_before_issuing_a_synthetic_key() {
        let mut sm = SignatureMatcher::new();
        let unregistered = Address::repeat_byte(0x11);
        let err = sm.get_simulation_private_key(unregistered).unwrap_err();
        assert!(matches!(err, SimError::Precondition(_)));
    }

    #[test]
    fn issues_stable_synthetic_key_after_registration() {
        let mut sm = SignatureMatcher::new();
        let addr = sm.register_simulation_public_key(sample_public_key()).unwrap();
        assert!(sm.is_public_key_registered(addr));
        let key1 = sm.get_simulation_private_key(addr).unwrap();
        let key2 = sm.get_simulation_private_key(addr).unwrap();
        assert_eq!(key1, key2);
    }
}
