//! LoRaWAN MAC and regional PHY version identifiers as the registry spells
//! them, plus which PHY revisions a MAC version may be paired with.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MacVersion {
    V1_0,
    V1_0_1,
    V1_0_2,
    V1_0_3,
    V1_0_4,
    V1_1,
}

impl MacVersion {
    pub const ALL: [MacVersion; 6] = [
        MacVersion::V1_0,
        MacVersion::V1_0_1,
        MacVersion::V1_0_2,
        MacVersion::V1_0_3,
        MacVersion::V1_0_4,
        MacVersion::V1_1,
    ];

    pub fn code(self) -> &'static str {
        match self {
            MacVersion::V1_0 => "MAC_V1_0",
            MacVersion::V1_0_1 => "MAC_V1_0_1",
            MacVersion::V1_0_2 => "MAC_V1_0_2",
            MacVersion::V1_0_3 => "MAC_V1_0_3",
            MacVersion::V1_0_4 => "MAC_V1_0_4",
            MacVersion::V1_1 => "MAC_V1_1",
        }
    }

    /// Regional parameter revisions a device of this MAC version may use.
    pub fn compatible_phy_versions(self) -> &'static [PhyVersion] {
        use PhyVersion::*;
        match self {
            MacVersion::V1_0 => &[V1_0],
            MacVersion::V1_0_1 => &[V1_0_1],
            MacVersion::V1_0_2 => &[V1_0_2RevA, V1_0_2RevB],
            MacVersion::V1_0_3 => &[V1_0_3RevA],
            MacVersion::V1_0_4 => &[
                V1_0_3RevA,
                Rp002V1_0_0,
                Rp002V1_0_1,
                Rp002V1_0_2,
                Rp002V1_0_3,
                Rp002V1_0_4,
            ],
            MacVersion::V1_1 => &[
                V1_1RevA,
                V1_1RevB,
                Rp002V1_0_0,
                Rp002V1_0_1,
                Rp002V1_0_2,
                Rp002V1_0_3,
                Rp002V1_0_4,
            ],
        }
    }

    pub fn supports(self, phy: PhyVersion) -> bool {
        self.compatible_phy_versions().contains(&phy)
    }
}

impl FromStr for MacVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MacVersion::ALL
            .into_iter()
            .find(|version| version.code() == s)
            .ok_or(())
    }
}

impl fmt::Display for MacVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PhyVersion {
    V1_0,
    V1_0_1,
    V1_0_2RevA,
    V1_0_2RevB,
    V1_0_3RevA,
    V1_1RevA,
    V1_1RevB,
    Rp002V1_0_0,
    Rp002V1_0_1,
    Rp002V1_0_2,
    Rp002V1_0_3,
    Rp002V1_0_4,
}

impl PhyVersion {
    pub const ALL: [PhyVersion; 12] = [
        PhyVersion::V1_0,
        PhyVersion::V1_0_1,
        PhyVersion::V1_0_2RevA,
        PhyVersion::V1_0_2RevB,
        PhyVersion::V1_0_3RevA,
        PhyVersion::V1_1RevA,
        PhyVersion::V1_1RevB,
        PhyVersion::Rp002V1_0_0,
        PhyVersion::Rp002V1_0_1,
        PhyVersion::Rp002V1_0_2,
        PhyVersion::Rp002V1_0_3,
        PhyVersion::Rp002V1_0_4,
    ];

    pub fn code(self) -> &'static str {
        match self {
            PhyVersion::V1_0 => "PHY_V1_0",
            PhyVersion::V1_0_1 => "PHY_V1_0_1",
            PhyVersion::V1_0_2RevA => "PHY_V1_0_2_REV_A",
            PhyVersion::V1_0_2RevB => "PHY_V1_0_2_REV_B",
            PhyVersion::V1_0_3RevA => "PHY_V1_0_3_REV_A",
            PhyVersion::V1_1RevA => "PHY_V1_1_REV_A",
            PhyVersion::V1_1RevB => "PHY_V1_1_REV_B",
            PhyVersion::Rp002V1_0_0 => "RP002_V1_0_0",
            PhyVersion::Rp002V1_0_1 => "RP002_V1_0_1",
            PhyVersion::Rp002V1_0_2 => "RP002_V1_0_2",
            PhyVersion::Rp002V1_0_3 => "RP002_V1_0_3",
            PhyVersion::Rp002V1_0_4 => "RP002_V1_0_4",
        }
    }

    /// Alternate spellings the registry accepts for the same revision.
    fn alias(s: &str) -> Option<PhyVersion> {
        match s {
            "TS001_V1_0" => Some(PhyVersion::V1_0),
            "TS001_V1_0_1" => Some(PhyVersion::V1_0_1),
            "RP001_V1_0_2" => Some(PhyVersion::V1_0_2RevA),
            "RP001_V1_0_2_REV_B" => Some(PhyVersion::V1_0_2RevB),
            "RP001_V1_0_3_REV_A" => Some(PhyVersion::V1_0_3RevA),
            "RP001_V1_1_REV_A" => Some(PhyVersion::V1_1RevA),
            "RP001_V1_1_REV_B" => Some(PhyVersion::V1_1RevB),
            _ => None,
        }
    }
}

impl FromStr for PhyVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhyVersion::ALL
            .into_iter()
            .find(|version| version.code() == s)
            .or_else(|| PhyVersion::alias(s))
            .ok_or(())
    }
}

impl fmt::Display for PhyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_aliases() {
        assert_eq!("MAC_V1_0_3".parse::<MacVersion>(), Ok(MacVersion::V1_0_3));
        assert_eq!("PHY_V1_1_REV_B".parse::<PhyVersion>(), Ok(PhyVersion::V1_1RevB));
        assert_eq!("RP001_V1_0_3_REV_A".parse::<PhyVersion>(), Ok(PhyVersion::V1_0_3RevA));
        assert!("MAC_V2".parse::<MacVersion>().is_err());
        assert!("mac_v1_0_3".parse::<MacVersion>().is_err());
    }

    #[test]
    fn every_mac_version_has_a_compatible_phy() {
        for mac in MacVersion::ALL {
            assert!(!mac.compatible_phy_versions().is_empty(), "{mac}");
        }
    }

    #[test]
    fn compatibility_follows_regional_parameter_revisions() {
        assert!(MacVersion::V1_0_3.supports(PhyVersion::V1_0_3RevA));
        assert!(!MacVersion::V1_0_3.supports(PhyVersion::V1_1RevB));
        assert!(MacVersion::V1_0_4.supports(PhyVersion::Rp002V1_0_2));
        assert!(!MacVersion::V1_0_2.supports(PhyVersion::Rp002V1_0_2));
        assert!(MacVersion::V1_1.supports(PhyVersion::V1_1RevA));
    }
}
