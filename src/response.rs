//! Response encoding: one free function per opcode, not a shared polymorphic `build`, so that
//! opcodes which carry no payload are simply not passed any arguments to get wrong.

use crate::identity::{Identity, ReaderConfig};
use crate::money::Money;

pub fn just_reset() -> Vec<u8> {
    vec![0x00]
}

pub fn reader_config_data(config: &ReaderConfig) -> Vec<u8> {
    let country = config.country_code.to_be_bytes();
    vec![
        0x01,
        config.feature_level,
        country[0],
        country[1],
        config.scale_factor,
        config.decimal_places,
        config.max_response_time_secs,
        config.misc_options,
    ]
}

pub fn begin_session(balance: Money) -> Vec<u8> {
    let wire = balance.to_be_bytes();
    vec![0x03, wire[0], wire[1]]
}

pub fn approve_vend(amount: Money) -> Vec<u8> {
    let wire = amount.to_be_bytes();
    vec![0x05, wire[0], wire[1]]
}

pub fn deny_vend() -> Vec<u8> {
    vec![0x06]
}

pub fn end_session() -> Vec<u8> {
    vec![0x07]
}

pub fn cancelled() -> Vec<u8> {
    vec![0x08]
}

pub fn peripheral_id(identity: &Identity) -> Vec<u8> {
    let mut out = Vec::with_capacity(30);
    out.push(0x09);
    out.extend_from_slice(&identity.manufacturer_wire());
    out.extend_from_slice(&identity.serial_wire());
    out.extend_from_slice(&identity.model_wire());
    out.extend_from_slice(&identity.software_version);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::checksum;

    #[test]
    fn begin_session_encodes_big_endian_wire_value() {
        let data = begin_session(Money::new(500, 1));
        assert_eq!(data, vec![0x03, 0x00, 0x32]);
        assert_eq!(checksum(&data), 0x35);
    }

    #[test]
    fn approve_vend_matches_worked_example() {
        let data = approve_vend(Money::new(10, 1));
        assert_eq!(data, vec![0x05, 0x00, 0x0A]);
        assert_eq!(checksum(&data), 0x0F);
    }

    #[test]
    fn deny_vend_has_no_payload() {
        assert_eq!(deny_vend(), vec![0x06]);
        assert_eq!(checksum(&deny_vend()), 0x06);
    }

    #[test]
    fn reader_config_data_reflects_configured_fields() {
        let cfg = ReaderConfig::default();
        let data = reader_config_data(&cfg);
        assert_eq!(data[0], 0x01);
        assert_eq!(data.len(), 8);
    }

    #[test]
    fn peripheral_id_pads_identity_to_wire_width() {
        let identity = crate::identity::Identity::new("GE", "1", "MODEL", [0x01, 0x00]);
        let data = peripheral_id(&identity);
        assert_eq!(data.len(), 1 + 3 + 12 + 12 + 2);
        assert_eq!(data[0], 0x09);
        assert_eq!(&data[1..4], b"GE ");
    }
}
