//! Contract ABI surfaces used by the payment engine
//!
//! One place of truth for the fragments of the USDFC token and the storage
//! payments contract that the source reads and the executor writes.

use ethers::abi::parse_abi;
use ethers::contract::BaseContract;
use std::sync::LazyLock;

static ERC20: LazyLock<BaseContract> = LazyLock::new(|| {
    BaseContract::from(
        parse_abi(&[
            "function balanceOf(address owner) view returns (uint256)",
            "function allowance(address owner, address spender) view returns (uint256)",
            "function approve(address spender, uint256 amount) returns (bool)",
        ])
        .expect("static erc20 abi parses"),
    )
});

static PAYMENTS: LazyLock<BaseContract> = LazyLock::new(|| {
    BaseContract::from(
        parse_abi(&[
            // escrow account: funds, lockupCurrent, lockupRate, lockupLastSettledAt
            "function accounts(address token, address owner) view returns (uint256,uint256,uint256,uint256)",
            // approval record: approved, rateAllowance, lockupAllowance, rateUsage, lockupUsage, maxLockupPeriod
            "function operatorApprovals(address token, address client, address operator) view returns (bool,uint256,uint256,uint256,uint256,uint256)",
            "function deposit(address token, address to, uint256 amount)",
            "function setOperatorApproval(address token, address operator, bool approved, uint256 rateAllowance, uint256 lockupAllowance, uint256 maxLockupPeriod)",
        ])
        .expect("static payments abi parses"),
    )
});

/// Shared ERC-20 fragment for the USDFC token
pub(crate) fn erc20() -> &'static BaseContract {
    &ERC20
}

/// Shared fragment for the storage payments contract
pub(crate) fn payments() -> &'static BaseContract {
    &PAYMENTS
}
