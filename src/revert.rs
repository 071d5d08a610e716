//! Revert-Reason Decoder
//!
//! Turns a failed execution's raw return data into a human-readable
//! message. Generalizes the teacher's `utils::error_utils::parse_custom_error`
//! (same selector table, same `alloy::dyn_abi` decode calls) to cover
//! the zero-length and not-a-multiple-of-32 cases and the full set of
//! named panic codes.

use alloy::dyn_abi::{DynSolType, DynSolValue};

const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
const PANIC_UINT256_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Decode a failed call's return data into a human-readable reason.
pub fn decode_revert_reason(output: &[u8]) -> String {
    if output.is_empty() {
        return "require(false)".to_string();
    }
    if output.len() % 32 != 4 {
        return "could not decode reason; invalid data length".to_string();
    }

    let selector = &output[0..4];
    if selector == ERROR_STRING_SELECTOR {
        return match DynSolType::String.abi_decode(&output[4..]) {
            Ok(DynSolValue::String(reason)) => reason,
            _ => "could not decode reason; invalid data length".to_string(),
        };
    }
    if selector == PANIC_UINT256_SELECTOR {
        return match DynSolType::Uint(256).abi_decode(&output[4..]) {
            Ok(DynSolValue::Uint(code, _)) => panic_code_name(code.to::<u64>()).to_string(),
            _ => "could not decode reason; invalid data length".to_string(),
        };
    }
    "unknown custom error".to_string()
}

fn panic_code_name(code: u64) -> &'static str {
    match code {
        0x00 => "GENERIC_PANIC",
        0x01 => "ASSERT_FALSE",
        0x11 => "OVERFLOW",
        0x12 => "DIVIDE_BY_ZERO",
        0x21 => "ENUM_RANGE_ERROR",
        0x22 => "BAD_STORAGE_DATA",
        0x31 => "STACK_UNDERFLOW",
        0x32 => "ARRAY_RANGE_ERROR",
        0x41 => "OUT_OF_MEMORY",
        0x51 => "UNINITIALIZED_FUNCTION_CALL",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::hex::decode;

    #[test]
    fn empty_output_is_require_false() {
        assert_eq!(decode_revert_reason(&[]), "require(false)");
    }

    #[test]
    fn bad_length_is_reported() {
        assert_eq!(
            decode_revert_reason(&[0x08, 0xc3, 0x79]),
            "could not decode reason; invalid data length"
        );
    }

    #[test]
    fn unknown_selector_is_reported() {
        assert_eq!(
            decode_revert_reason(&[0x00, 0x00, 0x00, 0x00]),
            "unknown custom error"
        );
    }

    #[test]
    fn decodes_error_string() {
        let bytes = decode(
            "08c379a0\
             0000000000000000000000000000000000000000000000000000000000000020\
             0000000000000000000000000000000000000000000000000000000000000014\
             496e73756666696369656e742062616c616e636500000000000000000000000000",
        )
        .unwrap();
        assert_eq!(decode_revert_reason(&bytes), "Insufficient balance");
    }

    #[test]
    fn decodes_every_named_panic_code() {
        let cases = [
            (0x00u8, "GENERIC_PANIC"),
            (0x01, "ASSERT_FALSE"),
            (0x11, "OVERFLOW"),
            (0x12, "DIVIDE_BY_ZERO"),
            (0x21, "ENUM_RANGE_ERROR"),
            (0x22, "BAD_STORAGE_DATA"),
            (0x31, "STACK_UNDERFLOW"),
            (0x32, "ARRAY_RANGE_ERROR"),
            (0x41, "OUT_OF_MEMORY"),
            (0x51, "UNINITIALIZED_FUNCTION_CALL"),
            (0xff, "UNKNOWN"),
        ];
        for (code, expected) in cases {
            let mut bytes = vec![0x4e, 0x48, 0x7b, 0x71];
            bytes.extend_from_slice(&[0u8; 31]);
            bytes.push(code);
            assert_eq!(decode_revert_reason(&bytes), expected);
        }
    }
}
