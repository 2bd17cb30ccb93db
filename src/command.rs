//! Decoding of inbound MDB packets into typed commands.
//!
//! Matching is purely on the address byte plus, where the table calls for it, a leading data
//! byte - never on formatted hex strings - so an address/sub-opcode pair this table does not
//! recognise falls out as [`Command::Unknown`] rather than panicking or silently mismatching.

use crate::money::Money;

/// Secondary cashless addresses sit exactly 0x50 above their primary counterpart
/// (`0x60` vs `0x10`, `0x61` vs `0x11`, ... `0x67` vs `0x17`).
const SECONDARY_OFFSET: u8 = 0x50;

fn normalize(address: u8) -> u8 {
    if address >= 0x60 {
        address - SECONDARY_OFFSET
    } else {
        address
    }
}

/// A decoded expansion sub-opcode the peripheral recognises but does not substantively answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionOpcode(pub u8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub manufacturer: [u8; 3],
    pub serial: [u8; 12],
    pub model: [u8; 12],
    pub software_version: [u8; 2],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reset,
    SetupConfigData {
        feature_level: u8,
        display_columns: u8,
        display_rows: u8,
        display_type: u8,
    },
    SetupPriceData {
        max_price: Money,
        min_price: Money,
    },
    Poll,
    VendRequest {
        item_price: Money,
        item_number: Option<u16>,
    },
    VendCancel,
    VendSuccess {
        item_number: Option<u16>,
    },
    VendFailure,
    VendSessionComplete,
    CashSale {
        item_price: Money,
        item_number: Option<u16>,
    },
    NegativeVendRequest,
    ReaderDisable,
    ReaderEnable,
    ReaderCancel,
    DataEntryResponse,
    RevalueRequest,
    RevalueLimitRequest,
    ExpansionRequestId(Identity),
    ExpansionOther(ExpansionOpcode),
    /// An address/payload combination matching no entry in the command table. The raw bytes
    /// (address byte included) are preserved so the caller can log or surface them.
    Unknown(Vec<u8>),
}

fn be16(hi: u8, lo: u8) -> u16 {
    u16::from_be_bytes([hi, lo])
}

fn item_number(raw: u16) -> Option<u16> {
    if raw == 0xFFFF {
        None
    } else {
        Some(raw)
    }
}

fn fixed<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let n = data.len().min(N);
    out[..n].copy_from_slice(&data[..n]);
    out
}

impl Command {
    /// Decode a packet already split into its address byte and trailing data bytes (as yielded
    /// by [`crate::frame::Frame::Packet`]). `scaling_factor` is this peripheral's currently
    /// configured money scale, needed to interpret `Money` fields on the wire.
    pub fn decode(address: u8, data: &[u8], scaling_factor: u8) -> Command {
        let raw = || {
            let mut v = vec![address];
            v.extend_from_slice(data);
            v
        };

        match normalize(address) {
            0x10 if data.is_empty() => Command::Reset,
            0x11 => match data {
                [0x00, feature_level, display_columns, display_rows, display_type] => {
                    Command::SetupConfigData {
                        feature_level: *feature_level,
                        display_columns: *display_columns,
                        display_rows: *display_rows,
                        display_type: *display_type,
                    }
                }
                [0x01, max_hi, max_lo, min_hi, min_lo] => Command::SetupPriceData {
                    max_price: Money::from_wire(be16(*max_hi, *max_lo), scaling_factor)
                        .unwrap_or_else(|| Money::unknown(scaling_factor)),
                    min_price: Money::from_wire(be16(*min_hi, *min_lo), scaling_factor)
                        .unwrap_or_else(|| Money::unknown(scaling_factor)),
                },
                _ => Command::Unknown(raw()),
            },
            0x12 if data.is_empty() => Command::Poll,
            0x13 => match data {
                [0x00, price_hi, price_lo, item_hi, item_lo] => Command::VendRequest {
                    item_price: Money::from_wire(be16(*price_hi, *price_lo), scaling_factor)
                        .unwrap_or_else(|| Money::unknown(scaling_factor)),
                    item_number: item_number(be16(*item_hi, *item_lo)),
                },
                [0x01] => Command::VendCancel,
                [0x02, item_hi, item_lo] => Command::VendSuccess {
                    item_number: item_number(be16(*item_hi, *item_lo)),
                },
                [0x03] => Command::VendFailure,
                [0x04] => Command::VendSessionComplete,
                [0x05, price_hi, price_lo, item_hi, item_lo] => Command::CashSale {
                    item_price: Money::from_wire(be16(*price_hi, *price_lo), scaling_factor)
                        .unwrap_or_else(|| Money::unknown(scaling_factor)),
                    item_number: item_number(be16(*item_hi, *item_lo)),
                },
                [0x06, ..] => Command::NegativeVendRequest,
                _ => Command::Unknown(raw()),
            },
            0x14 => match data {
                [0x00] => Command::ReaderDisable,
                [0x01] => Command::ReaderEnable,
                [0x02] => Command::ReaderCancel,
                [0x03, ..] => Command::DataEntryResponse,
                _ => Command::Unknown(raw()),
            },
            0x15 => match data {
                [0x00, ..] => Command::RevalueRequest,
                [0x01, ..] => Command::RevalueLimitRequest,
                _ => Command::Unknown(raw()),
            },
            0x17 => match data.first() {
                Some(0x00) => Command::ExpansionRequestId(Identity {
                    manufacturer: fixed(&data[1..4.min(data.len())]),
                    serial: fixed(data.get(4..16).unwrap_or(&[])),
                    model: fixed(data.get(16..28).unwrap_or(&[])),
                    software_version: fixed(data.get(28..30).unwrap_or(&[])),
                }),
                Some(sub @ (0x01..=0x04 | 0xFA..=0xFF)) => Command::ExpansionOther(ExpansionOpcode(*sub)),
                _ => Command::Unknown(raw()),
            },
            _ => Command::Unknown(raw()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_reset() {
        assert_eq!(Command::decode(0x10, &[], 1), Command::Reset);
        assert_eq!(Command::decode(0x60, &[], 1), Command::Reset);
    }

    #[test]
    fn decodes_poll() {
        assert_eq!(Command::decode(0x12, &[], 1), Command::Poll);
        assert_eq!(Command::decode(0x62, &[], 1), Command::Poll);
    }

    #[test]
    fn decodes_setup_config_data() {
        assert_eq!(
            Command::decode(0x11, &[0x00, 0x01, 0x14, 0x02, 0x01], 1),
            Command::SetupConfigData {
                feature_level: 1,
                display_columns: 20,
                display_rows: 2,
                display_type: 1,
            }
        );
    }

    #[test]
    fn decodes_vend_request_with_unknown_item_number() {
        let cmd = Command::decode(0x13, &[0x00, 0x00, 0x0A, 0xFF, 0xFF], 1);
        assert_eq!(
            cmd,
            Command::VendRequest {
                item_price: Money::new(10, 1),
                item_number: None,
            }
        );
    }

    #[test]
    fn decodes_vend_request_with_unknown_price_distinct_from_free() {
        let cmd = Command::decode(0x13, &[0x00, 0xFF, 0xFF, 0x00, 0x01], 1);
        assert_eq!(
            cmd,
            Command::VendRequest {
                item_price: Money::unknown(1),
                item_number: Some(1),
            }
        );
    }

    #[test]
    fn resolves_1304_1305_without_ambiguity() {
        assert_eq!(Command::decode(0x13, &[0x04], 1), Command::VendSessionComplete);
        assert_eq!(
            Command::decode(0x13, &[0x05, 0x00, 0x0A, 0x00, 0x01], 1),
            Command::CashSale {
                item_price: Money::new(10, 1),
                item_number: Some(1),
            }
        );
    }

    #[test]
    fn unrecognised_prefix_is_unknown_not_fatal() {
        match Command::decode(0x11, &[0x09], 1) {
            Command::Unknown(bytes) => assert_eq!(bytes, vec![0x11, 0x09]),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn decodes_expansion_request_id() {
        let mut data = vec![0x00];
        data.extend_from_slice(b"ABC");
        data.extend_from_slice(b"123456789012");
        data.extend_from_slice(b"MODEL-NUM-01");
        data.extend_from_slice(&[0x01, 0x00]);
        match Command::decode(0x17, &data, 1) {
            Command::ExpansionRequestId(id) => {
                assert_eq!(&id.manufacturer, b"ABC");
                assert_eq!(&id.serial, b"123456789012");
            }
            other => panic!("expected ExpansionRequestId, got {other:?}"),
        }
    }
}
