//! Solidity interface definitions for token interactions.
//!
//! Contains the minimal ERC-20 surface needed to settle fees in a token and
//! to run the in-process token used by the ledger.

use alloy_sol_types::sol;

sol! {
    /// Minimal ERC-20 interface.
    ///
    /// `transfer` is called with a gas cap taken from the request's `tokenGas`.
    /// Tokens that return nothing are treated as successful transfers.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}
