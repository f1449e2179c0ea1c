//! Coordinate reference systems understood by the boundary loader.

/// A supported coordinate reference system, identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSystem {
    /// WGS 84 geographic longitude/latitude (EPSG:4326, OGC CRS84).
    Wgs84,
    /// NAD83 geographic longitude/latitude (EPSG:4269).
    Nad83,
    /// WGS 84 / Pseudo-Mercator (EPSG:3857).
    WebMercator,
    /// Universal Transverse Mercator zone on WGS 84 (EPSG:326zz/327zz) or
    /// NAD83 (EPSG:269zz).
    Utm {
        /// EPSG code as declared.
        epsg: u32,
        /// Zone number, 1 to 60.
        zone: u8,
        /// `true` for the northern hemisphere.
        north: bool,
    },
    /// NAD83 / BC Environment Albers (EPSG:3005).
    BcAlbers,
    /// NAD83 / Alaska Albers (EPSG:3338).
    AlaskaAlbers,
}

impl ReferenceSystem {
    /// Returns the EPSG code.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
            Self::Nad83 => 4269,
            Self::WebMercator => 3857,
            Self::Utm { epsg, .. } => epsg,
            Self::BcAlbers => 3005,
            Self::AlaskaAlbers => 3338,
        }
    }

    /// Returns `true` for longitude/latitude systems.
    #[must_use]
    pub const fn is_geographic(self) -> bool {
        matches!(self, Self::Wgs84 | Self::Nad83)
    }

    /// Looks up a system by EPSG code.
    #[must_use]
    pub fn from_epsg(code: u32) -> Option<Self> {
        #[allow(clippy::cast_possible_truncation)]
        let utm = |base: u32, north: bool| Self::Utm {
            epsg: code,
            zone: (code - base) as u8,
            north,
        };

        match code {
            4326 => Some(Self::Wgs84),
            4269 => Some(Self::Nad83),
            3857 | 900_913 | 3785 => Some(Self::WebMercator),
            3005 => Some(Self::BcAlbers),
            3338 => Some(Self::AlaskaAlbers),
            32601..=32660 => Some(utm(32600, true)),
            32701..=32760 => Some(utm(32700, false)),
            26901..=26923 => Some(utm(26900, true)),
            _ => None,
        }
    }

    /// Parses a reference system identifier.
    ///
    /// Accepts `EPSG:3005`, `urn:ogc:def:crs:EPSG::3005`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`, `CRS84`, and a bare code.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let upper = s.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Some(Self::Wgs84);
        }

        let code = upper
            .rsplit(':')
            .next()
            .filter(|_| upper.contains("EPSG") || !upper.contains(':'))?;

        code.parse::<u32>().ok().and_then(Self::from_epsg)
    }
}

impl std::fmt::Display for ReferenceSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_spellings() {
        assert_eq!(ReferenceSystem::parse("EPSG:4326"), Some(ReferenceSystem::Wgs84));
        assert_eq!(
            ReferenceSystem::parse("urn:ogc:def:crs:EPSG::3005"),
            Some(ReferenceSystem::BcAlbers)
        );
        assert_eq!(
            ReferenceSystem::parse("urn:ogc:def:crs:OGC:1.3:CRS84"),
            Some(ReferenceSystem::Wgs84)
        );
        assert_eq!(ReferenceSystem::parse("3857"), Some(ReferenceSystem::WebMercator));
        assert_eq!(ReferenceSystem::parse("epsg:4269"), Some(ReferenceSystem::Nad83));
        assert_eq!(
            ReferenceSystem::parse("EPSG:3338"),
            Some(ReferenceSystem::AlaskaAlbers)
        );
    }

    #[test]
    fn parses_utm_zones() {
        assert_eq!(
            ReferenceSystem::parse("EPSG:32610"),
            Some(ReferenceSystem::Utm {
                epsg: 32610,
                zone: 10,
                north: true
            })
        );
        assert_eq!(
            ReferenceSystem::parse("EPSG:32733"),
            Some(ReferenceSystem::Utm {
                epsg: 32733,
                zone: 33,
                north: false
            })
        );
        assert_eq!(
            ReferenceSystem::parse("EPSG:26909"),
            Some(ReferenceSystem::Utm {
                epsg: 26909,
                zone: 9,
                north: true
            })
        );
    }

    #[test]
    fn rejects_unknown_systems() {
        assert_eq!(ReferenceSystem::parse("EPSG:2056"), None);
        assert_eq!(ReferenceSystem::parse("ESRI:102001"), None);
        assert_eq!(ReferenceSystem::parse(""), None);
    }

    #[test]
    fn displays_as_epsg() {
        assert_eq!(ReferenceSystem::BcAlbers.to_string(), "EPSG:3005");
        assert_eq!(ReferenceSystem::AlaskaAlbers.to_string(), "EPSG:3338");
    }
}
