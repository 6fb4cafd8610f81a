//! Safe 256-bit arithmetic helpers - no unwrap, no panics

use alloy_primitives::{U256, U512};

/// Add U256 with saturation at MAX
pub fn add_u256(a: U256, b: U256) -> U256 {
    a.saturating_add(b)
}

/// Compute floor(a * b / d) without intermediate overflow
///
/// The product is widened to 512 bits before dividing, so the only way the
/// result can exceed U256 is when `a * b / d` itself does; that case
/// saturates at `U256::MAX`. Returns 0 when `d` is 0.
pub fn mul_div_floor(a: U256, b: U256, d: U256) -> U256 {
    if d.is_zero() {
        return U256::ZERO;
    }

    // Fast path: product fits in 256 bits
    if let Some(product) = a.checked_mul(b) {
        return product / d;
    }

    let wide = U512::from(a) * U512::from(b);
    let quotient = wide / U512::from(d);
    U256::saturating_from(quotient)
}
