//! Protocol version negotiation and downgrade (§4.G step 2).

/// A CQL protocol version, with an independent DSE bit (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub number: u8,
    pub dse: bool,
}

impl ProtocolVersion {
    pub const fn cassandra(number: u8) -> Self {
        Self { number, dse: false }
    }
    pub const fn dse(number: u8) -> Self {
        Self { number, dse: true }
    }
}

/// Decrements the protocol version the way §4.G step 2 describes: DSE
/// variants downgrade first within DSE, then cross over to the highest
/// supported Cassandra version, then decrement Cassandra versions down to
/// the floor. Returns `None` once the lowest supported version has also
/// failed.
pub fn downgrade(
    current: ProtocolVersion,
    lowest_cassandra: u8,
    highest_cassandra: u8,
    lowest_dse: u8,
) -> Option<ProtocolVersion> {
    if current.dse {
        if current.number > lowest_dse {
            return Some(ProtocolVersion::dse(current.number - 1));
        }
        return Some(ProtocolVersion::cassandra(highest_cassandra));
    }

    if current.number > lowest_cassandra {
        Some(ProtocolVersion::cassandra(current.number - 1))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dse_versions_downgrade_within_dse_before_crossing() {
        let v = ProtocolVersion::dse(2);
        let next = downgrade(v, 3, 4, 1).unwrap();
        assert_eq!(next, ProtocolVersion::dse(1));
    }

    #[test]
    fn dse_floor_crosses_to_highest_cassandra() {
        let v = ProtocolVersion::dse(1);
        let next = downgrade(v, 3, 4, 1).unwrap();
        assert_eq!(next, ProtocolVersion::cassandra(4));
    }

    #[test]
    fn cassandra_floor_exhausts_to_none() {
        let v = ProtocolVersion::cassandra(3);
        assert_eq!(downgrade(v, 3, 4, 1), None);
    }

    #[test]
    fn cassandra_decrements_one_step_at_a_time() {
        let v = ProtocolVersion::cassandra(4);
        let next = downgrade(v, 3, 4, 1).unwrap();
        assert_eq!(next, ProtocolVersion::cassandra(3));
    }
}
