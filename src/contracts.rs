//! Bridge contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the source
//! deposit event and the destination mint call.

use alloy::sol;

sol! {
    /// Source-chain bridge that locks tokens and emits deposits
    contract SourceBridge {
        event TokensDeposited(
            address indexed sender,
            address indexed recipient,
            uint256 amount,
            uint256 destinationChainId,
            uint256 nonce
        );
    }
}

sol! {
    /// Destination-chain token that mints against a source deposit
    contract BridgedToken {
        function mintBridgedTokens(
            address recipient,
            uint256 amount,
            bytes32 sourceTxHash
        ) external;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{keccak256, Address, B256, U256};
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn test_deposit_event_signature() {
        assert_eq!(
            SourceBridge::TokensDeposited::SIGNATURE_HASH,
            keccak256(b"TokensDeposited(address,address,uint256,uint256,uint256)")
        );
    }

    #[test]
    fn test_mint_call_encoding() {
        let call = BridgedToken::mintBridgedTokensCall {
            recipient: Address::repeat_byte(0x22),
            amount: U256::from(50u64),
            sourceTxHash: B256::repeat_byte(0xaa),
        };
        let data = call.abi_encode();

        // selector + 3 words
        assert_eq!(data.len(), 4 + 3 * 32);
        assert_eq!(
            &data[..4],
            &keccak256(b"mintBridgedTokens(address,uint256,bytes32)")[..4]
        );
        assert_eq!(&data[4 + 64..4 + 96], B256::repeat_byte(0xaa).as_slice());
    }
}
