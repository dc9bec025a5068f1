//! NIST P-256 curve arithmetic.
//!
//! Points are kept in Jacobian coordinates `(X, Y, Z)` representing the
//! affine point `(X/Z^2, Y/Z^3)`; `Z = 0` is the point at infinity. Point
//! addition is made complete by computing the doubling and the infinity
//! fallbacks unconditionally and selecting with masks, which lets scalar
//! multiplication run a fixed double-and-add-always ladder.

use crate::bignum::{Modulus, U256};

/// The field prime `p = 2^256 - 2^224 + 2^192 + 2^96 - 1`.
pub const P: U256 = U256::from_words([
    0xFFFF_FFFF_FFFF_FFFF,
    0x0000_0000_FFFF_FFFF,
    0x0000_0000_0000_0000,
    0xFFFF_FFFF_0000_0001,
]);

/// The group order `n`.
pub const N: U256 = U256::from_words([
    0xF3B9_CAC2_FC63_2551,
    0xBCE6_FAAD_A717_9E84,
    0xFFFF_FFFF_FFFF_FFFF,
    0xFFFF_FFFF_0000_0000,
]);

/// Curve coefficient `b` in `y^2 = x^3 - 3x + b`.
pub const B: U256 = U256::from_words([
    0x3BCE_3C3E_27D2_604B,
    0x651D_06B0_CC53_B0F6,
    0xB3EB_BD55_7698_86BC,
    0x5AC6_35D8_AA3A_93E7,
]);

/// Generator x-coordinate.
pub const GX: U256 = U256::from_words([
    0xF4A1_3945_D898_C296,
    0x7703_7D81_2DEB_33A0,
    0xF8BC_E6E5_63A4_40F2,
    0x6B17_D1F2_E12C_4247,
]);

/// Generator y-coordinate.
pub const GY: U256 = U256::from_words([
    0xCBB6_4068_37BF_51F5,
    0x2BCE_3357_6B31_5ECE,
    0x8EE7_EB4A_7C0F_9E16,
    0x4FE3_42E2_FE1A_7F9B,
]);

/// Arithmetic modulo the field prime.
pub const FIELD: Modulus = Modulus::new(P);

/// Arithmetic modulo the group order.
pub const ORDER: Modulus = Modulus::new(N);

const THREE: U256 = U256::from_words([3, 0, 0, 0]);

#[inline]
fn add(a: &U256, b: &U256) -> U256 {
    FIELD.add_mod(a, b)
}

#[inline]
fn sub(a: &U256, b: &U256) -> U256 {
    FIELD.sub_mod(a, b)
}

#[inline]
fn mul(a: &U256, b: &U256) -> U256 {
    FIELD.mul_mod(a, b)
}

#[inline]
fn sqr(a: &U256) -> U256 {
    FIELD.square_mod(a)
}

#[inline]
fn dbl(a: &U256) -> U256 {
    FIELD.add_mod(a, a)
}

/// A point in affine coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AffinePoint {
    /// x-coordinate (zero for the point at infinity).
    pub x: U256,
    /// y-coordinate (zero for the point at infinity).
    pub y: U256,
    /// Whether this is the point at infinity.
    pub infinity: bool,
}

impl AffinePoint {
    /// The standard base point `G`.
    #[must_use]
    pub const fn generator() -> Self {
        Self {
            x: GX,
            y: GY,
            infinity: false,
        }
    }

    /// The point at infinity.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            x: U256::ZERO,
            y: U256::ZERO,
            infinity: true,
        }
    }

    /// Checks `y^2 = x^3 - 3x + b` with both coordinates reduced.
    #[must_use]
    pub fn is_on_curve(&self) -> bool {
        if self.infinity {
            return true;
        }
        if !FIELD.contains(&self.x) || !FIELD.contains(&self.y) {
            return false;
        }
        let rhs = add(&sub(&mul(&sqr(&self.x), &self.x), &mul(&THREE, &self.x)), &B);
        sqr(&self.y) == rhs
    }

    /// Lifts into Jacobian coordinates.
    #[must_use]
    pub fn to_jacobian(&self) -> JacobianPoint {
        if self.infinity {
            JacobianPoint::IDENTITY
        } else {
            JacobianPoint {
                x: self.x,
                y: self.y,
                z: U256::ONE,
            }
        }
    }
}

/// A point in Jacobian coordinates.
#[derive(Clone, Copy, Debug)]
pub struct JacobianPoint {
    x: U256,
    y: U256,
    z: U256,
}

impl JacobianPoint {
    /// The point at infinity, `(1, 1, 0)`.
    pub const IDENTITY: Self = Self {
        x: U256::ONE,
        y: U256::ONE,
        z: U256::ZERO,
    };

    /// `true` for the point at infinity.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.z.is_zero()
    }

    fn ct_select(mask: u64, a: &Self, b: &Self) -> Self {
        Self {
            x: U256::ct_select(mask, &a.x, &b.x),
            y: U256::ct_select(mask, &a.y, &b.y),
            z: U256::ct_select(mask, &a.z, &b.z),
        }
    }

    /// `2P` ("dbl-2001-b", a = -3). Maps infinity to infinity.
    #[must_use]
    pub fn double(&self) -> Self {
        let delta = sqr(&self.z);
        let gamma = sqr(&self.y);
        let beta = mul(&self.x, &gamma);
        let alpha = mul(&THREE, &mul(&sub(&self.x, &delta), &add(&self.x, &delta)));

        let beta4 = dbl(&dbl(&beta));
        let x3 = sub(&sqr(&alpha), &dbl(&beta4));
        let z3 = sub(&sub(&sqr(&add(&self.y, &self.z)), &gamma), &delta);
        let gamma_sq8 = dbl(&dbl(&dbl(&sqr(&gamma))));
        let y3 = sub(&mul(&alpha, &sub(&beta4, &x3)), &gamma_sq8);

        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    /// `P + Q` for any pair of points, including equal and infinite ones.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        // "add-2007-bl"
        let z1z1 = sqr(&self.z);
        let z2z2 = sqr(&other.z);
        let u1 = mul(&self.x, &z2z2);
        let u2 = mul(&other.x, &z1z1);
        let s1 = mul(&mul(&self.y, &other.z), &z2z2);
        let s2 = mul(&mul(&other.y, &self.z), &z1z1);
        let h = sub(&u2, &u1);
        let i = sqr(&dbl(&h));
        let j = mul(&h, &i);
        let r = dbl(&sub(&s2, &s1));
        let v = mul(&u1, &i);
        let x3 = sub(&sub(&sqr(&r), &j), &dbl(&v));
        let y3 = sub(&mul(&r, &sub(&v, &x3)), &dbl(&mul(&s1, &j)));
        let z3 = mul(&sub(&sub(&sqr(&add(&self.z, &other.z)), &z1z1), &z2z2), &h);
        let sum = Self {
            x: x3,
            y: y3,
            z: z3,
        };

        // h == 0 && r == 0 means the inputs are the same point.
        let doubled = self.double();
        let same = h.ct_zero_mask() & r.ct_zero_mask();
        let result = Self::ct_select(same, &doubled, &sum);
        let result = Self::ct_select(self.z.ct_zero_mask(), other, &result);
        Self::ct_select(other.z.ct_zero_mask(), self, &result)
    }

    /// `-P`.
    #[must_use]
    pub fn negate(&self) -> Self {
        Self {
            x: self.x,
            y: FIELD.neg_mod(&self.y),
            z: self.z,
        }
    }

    /// `k·P`, walking all 256 bits of `k` with one doubling and one
    /// addition per bit.
    #[must_use]
    pub fn mul(&self, k: &U256) -> Self {
        let mut acc = Self::IDENTITY;
        for index in (0..256).rev() {
            acc = acc.double();
            let sum = acc.add(self);
            acc = Self::ct_select(k.bit(index).wrapping_neg(), &sum, &acc);
        }
        acc
    }

    /// Normalizes to affine coordinates.
    #[must_use]
    pub fn to_affine(&self) -> AffinePoint {
        let Some(z_inv) = FIELD.inv_mod(&self.z) else {
            return AffinePoint::identity();
        };
        let z_inv2 = sqr(&z_inv);
        let z_inv3 = mul(&z_inv2, &z_inv);
        AffinePoint {
            x: mul(&self.x, &z_inv2),
            y: mul(&self.y, &z_inv3),
            infinity: false,
        }
    }
}

/// `k·G`.
#[must_use]
pub fn mul_generator(k: &U256) -> JacobianPoint {
    AffinePoint::generator().to_jacobian().mul(k)
}
