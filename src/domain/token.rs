//! Token identity type.

use super::{Address, Decimals};

/// The canonical identity of a pool asset.
///
/// Combines an [`Address`] with its native [`Decimals`]. Two tokens are
/// considered equal only if both address and decimals match.
///
/// # Examples
///
/// ```
/// use tidepool::domain::{Address, Decimals, Token};
///
/// let addr = Address::from_bytes([1u8; 32]);
/// let dec  = Decimals::new(6).expect("valid");
/// let tok  = Token::new(addr, dec);
///
/// assert_eq!(tok.address(), addr);
/// assert_eq!(tok.decimals(), dec);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    address: Address,
    decimals: Decimals,
}

impl Token {
    /// Creates a new `Token`.
    ///
    /// Construction is infallible because both components are already
    /// validated at their own construction site.
    #[must_use]
    pub const fn new(address: Address, decimals: Decimals) -> Self {
        Self { address, decimals }
    }

    /// Returns the token address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns the token's native decimals.
    #[must_use]
    pub const fn decimals(&self) -> Decimals {
        self.decimals
    }

    /// Returns `10^(18 - decimals)`, the factor normalizing a native
    /// amount of this token into the 18-decimal common unit.
    #[must_use]
    pub const fn precision_factor(&self) -> u128 {
        self.decimals.precision_factor()
    }
}
