//! # Ticket Ledger Testing
//!
//! Test doubles for the ticket lifecycle engine.
//!
//! This crate provides:
//! - [`FixedClock`] and [`test_clock`]: deterministic time
//! - [`LocalSigner`]: a signer that only knows its address
//! - [`InMemoryLedger`]: a simulated ticketing contract implementing
//!   `LedgerRpc`, with injectable faults
//! - proptest strategies for domain values
//!
//! ## Example
//!
//! ```
//! use ticket_ledger_core::ledger::{RevertReason, Signer};
//! use ticket_ledger_testing::{Fault, InMemoryLedger, LocalSigner};
//!
//! let ledger = InMemoryLedger::new().shared();
//! ledger.inject(Fault::Revert(RevertReason::Unauthorized));
//! assert_eq!(ledger.call_count(), 0);
//!
//! let buyer = LocalSigner::shared("0xBuyer");
//! assert_eq!(buyer.address().as_str(), "0xbuyer");
//! ```

use chrono::{DateTime, Utc};
use ticket_ledger_core::environment::Clock;

pub mod ledger;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::Arc;
    use ticket_ledger_core::ledger::Signer;
    use ticket_ledger_core::types::Address;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_ledger_testing::mocks::FixedClock;
    /// use ticket_ledger_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Wallet stand-in that knows only its address.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LocalSigner {
        address: Address,
    }

    impl LocalSigner {
        /// Creates a signer for `address`
        #[must_use]
        pub fn new(address: impl AsRef<str>) -> Self {
            Self { address: Address::new(address) }
        }

        /// Creates an Arc-wrapped signer for sharing
        #[must_use]
        pub fn shared(address: impl AsRef<str>) -> Arc<dyn Signer> {
            Arc::new(Self::new(address))
        }
    }

    impl Signer for LocalSigner {
        fn address(&self) -> &Address {
            &self.address
        }
    }
}

/// Property-based testing strategies.
pub mod properties {
    use proptest::prelude::*;
    use ticket_ledger_core::types::{Price, UNITS_PER_WHOLE};

    /// Prices between 0.001 and `max_whole` whole units, in thousandths.
    pub fn price_up_to(max_whole: u32) -> impl Strategy<Value = Price> {
        (1..=u128::from(max_whole) * 1_000).prop_map(|thousandths| Price::from_units(thousandths * (UNITS_PER_WHOLE / 1_000)))
    }

    /// A primary price and a ceiling at or above it.
    pub fn price_and_ceiling() -> impl Strategy<Value = (Price, Price)> {
        (price_up_to(10), 0..=10_000u128).prop_map(|(price, markup)| {
            (price, Price::from_units(price.units() + markup * (UNITS_PER_WHOLE / 1_000)))
        })
    }
}

// Re-export commonly used items
pub use ledger::{DEFAULT_CONTRACT, Fault, InMemoryLedger};
pub use mocks::{FixedClock, LocalSigner, test_clock};
