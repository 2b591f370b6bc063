//! Arithmetic over the Goldilocks prime field `p = 2^64 - 2^32 + 1`.

use core::ops::{Add, AddAssign, Mul};

/// The Goldilocks prime.
pub const MODULUS: u64 = 0xffff_ffff_0000_0001;

/// A field element, kept reduced below [`MODULUS`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Felt(u64);

impl Felt {
    pub const ZERO: Felt = Felt(0);
    pub const ONE: Felt = Felt(1);

    pub fn new(value: u64) -> Self {
        Felt(value % MODULUS)
    }

    pub fn as_int(self) -> u64 {
        self.0
    }

    /// `self^5`, the round function exponent of the sponge.
    pub fn exp5(self) -> Self {
        let square = self * self;
        square * square * self
    }
}

impl Add for Felt {
    type Output = Felt;

    fn add(self, rhs: Felt) -> Felt {
        Felt(((self.0 as u128 + rhs.0 as u128) % MODULUS as u128) as u64)
    }
}

impl AddAssign for Felt {
    fn add_assign(&mut self, rhs: Felt) {
        *self = *self + rhs;
    }
}

impl Mul for Felt {
    type Output = Felt;

    fn mul(self, rhs: Felt) -> Felt {
        Felt(((self.0 as u128 * rhs.0 as u128) % MODULUS as u128) as u64)
    }
}
