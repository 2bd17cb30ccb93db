//! Cents-based money values and their MDB wire encoding.
//!
//! The wire format is a 16-bit unsigned integer, scaled down from cents by a peripheral-declared
//! `scaling_factor` (reported in READER_CONFIG_DATA). `0xFFFF` is reserved to mean "unknown" and
//! is never a valid encoded amount.

/// Wire value reserved to mean "amount unknown".
pub const UNKNOWN_WIRE: u16 = 0xFFFF;

/// Largest value that can be represented on the wire without being clamped to [`UNKNOWN_WIRE`].
pub const MAX_WIRE_VALUE: u16 = 0xFFFE;

/// A monetary amount, held in whole cents, together with the scaling factor used to put it on
/// the wire.
///
/// `to_wire` clamps values too large to represent to [`UNKNOWN_WIRE`] but never touches `cents`
/// itself - the original amount is always available for logging or display even if the VMC was
/// told "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    cents: u32,
    scaling_factor: u8,
}

impl Money {
    pub fn new(cents: u32, scaling_factor: u8) -> Self {
        Self {
            cents,
            scaling_factor: scaling_factor.max(1),
        }
    }

    pub fn cents(&self) -> u32 {
        self.cents
    }

    pub fn scaling_factor(&self) -> u8 {
        self.scaling_factor
    }

    /// Encode to the 16-bit wire value, clamping to [`UNKNOWN_WIRE`] when the scaled amount
    /// would not fit. The in-memory `cents` value is never altered by this call.
    pub fn to_wire(&self) -> u16 {
        let scaled = self.cents / self.scaling_factor as u32;
        if scaled > MAX_WIRE_VALUE as u32 {
            log::error!(
                "money value of {} cents (scale {}) exceeds wire range, sending 'unknown'",
                self.cents,
                self.scaling_factor
            );
            UNKNOWN_WIRE
        } else {
            scaled as u16
        }
    }

    /// Decode a 16-bit wire value into a `Money`, returning `None` when the VMC (or peripheral)
    /// sent the reserved "unknown" sentinel.
    pub fn from_wire(raw: u16, scaling_factor: u8) -> Option<Self> {
        if raw == UNKNOWN_WIRE {
            None
        } else {
            Some(Self::new(raw as u32 * scaling_factor.max(1) as u32, scaling_factor))
        }
    }

    pub fn to_be_bytes(&self) -> [u8; 2] {
        self.to_wire().to_be_bytes()
    }

    /// A `Money` that always encodes to [`UNKNOWN_WIRE`], for callers (e.g. `start_session` with
    /// no known balance) that need to report "unknown" rather than a real amount. Constructed
    /// from a cents value guaranteed to clamp rather than by special-casing the wire encoder.
    pub fn unknown(scaling_factor: u8) -> Self {
        let scaling_factor = scaling_factor.max(1);
        Self {
            cents: scaling_factor as u32 * (MAX_WIRE_VALUE as u32 + 1),
            scaling_factor,
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.2}", self.cents as f64 / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_within_range() {
        let m = Money::new(65534, 1);
        assert_eq!(Money::from_wire(m.to_wire(), 1), Some(m));
    }

    #[test]
    fn round_trips_with_scaling() {
        let m = Money::new(500, 10);
        assert_eq!(m.to_wire(), 50);
        assert_eq!(Money::from_wire(50, 10), Some(m));
    }

    #[test]
    fn clamps_out_of_range_to_unknown() {
        let m = Money::new(1_000_000, 1);
        assert_eq!(m.to_wire(), UNKNOWN_WIRE);
        assert_eq!(m.cents(), 1_000_000);
    }

    #[test]
    fn unknown_wire_value_decodes_to_none() {
        assert_eq!(Money::from_wire(UNKNOWN_WIRE, 1), None);
    }

    #[test]
    fn boundary_fffe_decodes() {
        assert_eq!(Money::from_wire(0xFFFE, 1), Some(Money::new(65534, 1)));
    }

    #[test]
    fn unknown_always_clamps() {
        assert_eq!(Money::unknown(1).to_wire(), UNKNOWN_WIRE);
        assert_eq!(Money::unknown(10).to_wire(), UNKNOWN_WIRE);
    }
}
