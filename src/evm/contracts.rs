//! HRO contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the asset
//! token (canonical and remote share one interface) and the token linker.

use alloy::sol;

sol! {
    /// HRO asset token (ERC721 with AccessControl roles)
    #[sol(rpc)]
    contract HeroesToken {
        // ========================================================================
        // Ownership
        // ========================================================================

        /// Owner of a token; reverts if the token does not exist here
        function ownerOf(uint256 tokenId) external view returns (address);

        /// Approve `to` to transfer `tokenId`
        function approve(address to, uint256 tokenId) external;

        // ========================================================================
        // Roles
        // ========================================================================

        function grantRole(bytes32 role, address account) external;

        function hasRole(bytes32 role, address account) external view returns (bool);
    }

    /// Per-chain linker that locks/burns on send and unlocks/mints on receive
    #[sol(rpc)]
    contract HeroesTokenLinker {
        /// Hand `tokenId` to the relay for delivery to `to` on `destinationChain`.
        /// `msg.value` prepays destination gas; leftovers go to `refundAddress`.
        function sendNft(
            string calldata destinationChain,
            address to,
            uint256 tokenId,
            address refundAddress
        ) external payable;

        function chainName() external view returns (string memory);

        function gateway() external view returns (address);

        function gasService() external view returns (address);

        function tokenAddress() external view returns (address);
    }
}
