//! Sortable fixed-width numeric encoding.
//!
//! Numeric field values are indexed as order-preserving `u64` keys so range
//! queries compare encoded integers instead of re-parsing strings. Integer
//! and float values of a field share one key space through their `f64`
//! value.
//!
//! The transform is the IEEE-754 total-order trick: negative doubles have
//! all bits flipped, non-negative doubles have the sign bit flipped. The
//! result compares as an unsigned integer exactly like the source doubles
//! compare as numbers.

/// Encode an `f64` into an order-preserving `u64` key.
pub fn encode_f64(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits ^ (1 << 63)
    }
}

/// Decode a key produced by [`encode_f64`] back into its `f64`.
pub fn decode_f64(encoded: u64) -> f64 {
    let bits = if encoded & (1 << 63) != 0 {
        encoded ^ (1 << 63)
    } else {
        !encoded
    };
    f64::from_bits(bits)
}

/// The encoded lower bound for a range over `min`.
///
/// An exclusive bound moves one key up: encoded keys are dense over the
/// representable doubles, so `+1` is exactly "the next larger value".
pub fn lower_bound(min: Option<f64>, inclusive: bool) -> u64 {
    match min {
        None => 0,
        Some(value) => {
            let encoded = encode_f64(value);
            if inclusive { encoded } else { encoded.saturating_add(1) }
        }
    }
}

/// The encoded upper bound for a range up to `max`.
pub fn upper_bound(max: Option<f64>, inclusive: bool) -> u64 {
    match max {
        None => u64::MAX,
        Some(value) => {
            let encoded = encode_f64(value);
            if inclusive { encoded } else { encoded.saturating_sub(1) }
        }
    }
}
