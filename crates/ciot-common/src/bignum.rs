//! Fixed-width 256-bit unsigned integers and modular arithmetic.
//!
//! [`U256`] is four little-endian 64-bit limbs. [`Modulus`] carries the
//! Montgomery constants for one odd modulus above 2^255 (the P-256 field
//! prime and group order both qualify) and performs `add`, `sub`, `mul` and
//! `inv` modulo that value. Every result handed out is fully reduced.
//!
//! The modular paths run a fixed number of limb iterations and pick results
//! with masks instead of branches, so their shape does not depend on the
//! values being processed.

use zeroize::Zeroize;

/// Number of 64-bit limbs in a [`U256`].
pub const LIMBS: usize = 4;

/// Number of bytes in the big-endian encoding of a [`U256`].
pub const BYTES: usize = 32;

/// A 256-bit unsigned integer stored as little-endian 64-bit limbs.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct U256(pub(crate) [u64; LIMBS]);

#[inline]
const fn adc(a: u64, b: u64, carry: u64) -> (u64, u64) {
    let t = a as u128 + b as u128 + carry as u128;
    (t as u64, (t >> 64) as u64)
}

#[inline]
const fn sbb(a: u64, b: u64, borrow: u64) -> (u64, u64) {
    let t = (a as u128).wrapping_sub(b as u128 + borrow as u128);
    (t as u64, (t >> 127) as u64)
}

#[inline]
const fn mac(acc: u64, a: u64, b: u64, carry: u64) -> (u64, u64) {
    let t = acc as u128 + (a as u128) * (b as u128) + carry as u128;
    (t as u64, (t >> 64) as u64)
}

impl U256 {
    /// The value 0.
    pub const ZERO: Self = Self([0; LIMBS]);
    /// The value 1.
    pub const ONE: Self = Self([1, 0, 0, 0]);

    /// Builds a value from little-endian limbs.
    #[must_use]
    pub const fn from_words(words: [u64; LIMBS]) -> Self {
        Self(words)
    }

    /// Returns the little-endian limbs.
    #[must_use]
    pub const fn words(&self) -> [u64; LIMBS] {
        self.0
    }

    /// Decodes a big-endian byte string, most-significant limb first.
    #[must_use]
    pub fn from_be_bytes(bytes: &[u8; BYTES]) -> Self {
        let mut words = [0u64; LIMBS];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            words[LIMBS - 1 - i] = u64::from_be_bytes(word);
        }
        Self(words)
    }

    /// Encodes as 32 big-endian bytes.
    #[must_use]
    pub fn to_be_bytes(&self) -> [u8; BYTES] {
        let mut out = [0u8; BYTES];
        for (i, chunk) in out.chunks_exact_mut(8).enumerate() {
            chunk.copy_from_slice(&self.0[LIMBS - 1 - i].to_be_bytes());
        }
        out
    }

    /// `self + rhs` modulo 2^256, together with the carry out (0 or 1).
    #[must_use]
    pub const fn overflowing_add(&self, rhs: &Self) -> (Self, u64) {
        let mut out = [0u64; LIMBS];
        let mut carry = 0;
        let mut i = 0;
        while i < LIMBS {
            let (w, c) = adc(self.0[i], rhs.0[i], carry);
            out[i] = w;
            carry = c;
            i += 1;
        }
        (Self(out), carry)
    }

    /// `self - rhs` modulo 2^256, together with the borrow out (0 or 1).
    #[must_use]
    pub const fn overflowing_sub(&self, rhs: &Self) -> (Self, u64) {
        let mut out = [0u64; LIMBS];
        let mut borrow = 0;
        let mut i = 0;
        while i < LIMBS {
            let (w, b) = sbb(self.0[i], rhs.0[i], borrow);
            out[i] = w;
            borrow = b;
            i += 1;
        }
        (Self(out), borrow)
    }

    /// Returns `a` where `mask` is all ones and `b` where it is all zeros.
    #[must_use]
    pub const fn ct_select(mask: u64, a: &Self, b: &Self) -> Self {
        let mut out = [0u64; LIMBS];
        let mut i = 0;
        while i < LIMBS {
            out[i] = (a.0[i] & mask) | (b.0[i] & !mask);
            i += 1;
        }
        Self(out)
    }

    /// All-ones mask when the value is zero, zero otherwise.
    #[must_use]
    pub const fn ct_zero_mask(&self) -> u64 {
        let or = self.0[0] | self.0[1] | self.0[2] | self.0[3];
        let nonzero = (or | or.wrapping_neg()) >> 63;
        (nonzero ^ 1).wrapping_neg()
    }

    /// `true` when the value is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.ct_zero_mask() != 0
    }

    /// `self < rhs`.
    #[must_use]
    pub const fn lt(&self, rhs: &Self) -> bool {
        self.overflowing_sub(rhs).1 == 1
    }

    /// Bit `index` (0 = least significant) as 0 or 1.
    #[must_use]
    pub const fn bit(&self, index: usize) -> u64 {
        (self.0[index / 64] >> (index % 64)) & 1
    }
}

impl core::fmt::Debug for U256 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "U256(0x")?;
        for word in self.0.iter().rev() {
            write!(f, "{word:016x}")?;
        }
        write!(f, ")")
    }
}

impl Zeroize for U256 {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// An odd modulus `m` with `2^255 < m < 2^256` and its Montgomery constants.
#[derive(Clone, Copy, Debug)]
pub struct Modulus {
    m: U256,
    /// `-m^-1 mod 2^64`
    m_inv: u64,
    /// `2^512 mod m`
    r2: U256,
}

impl Modulus {
    /// Precomputes the Montgomery constants for `m`.
    ///
    /// `m` must be odd and have its top bit set.
    #[must_use]
    pub const fn new(m: U256) -> Self {
        // Newton iteration doubles the correct low bits each round: 1 -> 64.
        let mut inv: u64 = 1;
        let mut i = 0;
        while i < 6 {
            inv = inv.wrapping_mul(2u64.wrapping_sub(m.0[0].wrapping_mul(inv)));
            i += 1;
        }

        let mut this = Self {
            m,
            m_inv: inv.wrapping_neg(),
            r2: U256::ZERO,
        };

        // 2^256 mod m is 2^256 - m since m > 2^255; double it 256 more times.
        let mut r = U256::ZERO.overflowing_sub(&m).0;
        let mut i = 0;
        while i < 256 {
            r = this.add_mod(&r, &r);
            i += 1;
        }
        this.r2 = r;
        this
    }

    /// The modulus itself.
    #[must_use]
    pub const fn value(&self) -> &U256 {
        &self.m
    }

    /// `true` when `a < m`.
    #[must_use]
    pub const fn contains(&self, a: &U256) -> bool {
        a.lt(&self.m)
    }

    /// Reduces any 256-bit value into `[0, m)`.
    #[must_use]
    pub const fn reduce(&self, a: &U256) -> U256 {
        let (d, borrow) = a.overflowing_sub(&self.m);
        U256::ct_select((borrow ^ 1).wrapping_neg(), &d, a)
    }

    /// `(a + b) mod m` for reduced inputs.
    #[must_use]
    pub const fn add_mod(&self, a: &U256, b: &U256) -> U256 {
        let (sum, carry) = a.overflowing_add(b);
        let (d, borrow) = sum.overflowing_sub(&self.m);
        let use_d = (carry | (borrow ^ 1)) & 1;
        U256::ct_select(use_d.wrapping_neg(), &d, &sum)
    }

    /// `(a - b) mod m` for reduced inputs.
    #[must_use]
    pub const fn sub_mod(&self, a: &U256, b: &U256) -> U256 {
        let (d, borrow) = a.overflowing_sub(b);
        let fix = U256::ct_select(borrow.wrapping_neg(), &self.m, &U256::ZERO);
        d.overflowing_add(&fix).0
    }

    /// `-a mod m` for a reduced input.
    #[must_use]
    pub const fn neg_mod(&self, a: &U256) -> U256 {
        self.sub_mod(&U256::ZERO, a)
    }

    /// Montgomery product `a * b * 2^-256 mod m` (CIOS).
    const fn mont_mul(&self, a: &U256, b: &U256) -> U256 {
        let m = &self.m.0;
        let mut t = [0u64; LIMBS + 2];
        let mut i = 0;
        while i < LIMBS {
            let mut carry = 0;
            let mut j = 0;
            while j < LIMBS {
                let (lo, hi) = mac(t[j], a.0[j], b.0[i], carry);
                t[j] = lo;
                carry = hi;
                j += 1;
            }
            let (lo, hi) = adc(t[LIMBS], carry, 0);
            t[LIMBS] = lo;
            t[LIMBS + 1] = hi;

            let u = t[0].wrapping_mul(self.m_inv);
            let (_, mut carry) = mac(t[0], u, m[0], 0);
            let mut j = 1;
            while j < LIMBS {
                let (lo, hi) = mac(t[j], u, m[j], carry);
                t[j - 1] = lo;
                carry = hi;
                j += 1;
            }
            let (lo, hi) = adc(t[LIMBS], carry, 0);
            t[LIMBS - 1] = lo;
            t[LIMBS] = t[LIMBS + 1] + hi;
            t[LIMBS + 1] = 0;
            i += 1;
        }

        // t < 2m here; one conditional subtraction finishes the reduction.
        let r = U256([t[0], t[1], t[2], t[3]]);
        let (d, borrow) = r.overflowing_sub(&self.m);
        let use_d = (t[LIMBS] | (borrow ^ 1)) & 1;
        U256::ct_select(use_d.wrapping_neg(), &d, &r)
    }

    /// `(a * b) mod m` for reduced inputs.
    #[must_use]
    pub const fn mul_mod(&self, a: &U256, b: &U256) -> U256 {
        self.mont_mul(&self.mont_mul(a, b), &self.r2)
    }

    /// `a^2 mod m`.
    #[must_use]
    pub const fn square_mod(&self, a: &U256) -> U256 {
        self.mul_mod(a, a)
    }

    /// `base^exp mod m`, always walking all 256 exponent bits.
    #[must_use]
    pub fn pow_mod(&self, base: &U256, exp: &U256) -> U256 {
        let mut acc = self.reduce(&U256::ONE);
        for index in (0..256).rev() {
            acc = self.square_mod(&acc);
            let product = self.mul_mod(&acc, base);
            acc = U256::ct_select(exp.bit(index).wrapping_neg(), &product, &acc);
        }
        acc
    }

    /// `a^-1 mod m` by Fermat's little theorem (`m` must be prime).
    ///
    /// The exponentiation runs for every input; `None` is only decided
    /// afterwards, for `a == 0`.
    #[must_use]
    pub fn inv_mod(&self, a: &U256) -> Option<U256> {
        let exp = self.m.overflowing_sub(&U256::from_words([2, 0, 0, 0])).0;
        let inv = self.pow_mod(a, &exp);
        if a.is_zero() {
            None
        } else {
            Some(inv)
        }
    }
}
