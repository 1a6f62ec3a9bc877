//! LINK attributes — distance and elevation of one directed path segment.

use serde::{Deserialize, Serialize};

use super::{PropertyMap, Relationship, Value};
use crate::{Error, Result};

/// Relationship type of a path segment between two huts.
pub const LINK_TYPE: &str = "LINK";

/// Longest segment the loader accepts, in kilometres.
pub const MAX_LINK_DISTANCE_KM: f64 = 100.0;

pub const DISTANCE_KM: &str = "distance_km";
pub const DPLUS_M: &str = "dplus_m";
pub const DMINUS_M: &str = "dminus_m";
pub const GEOMETRY_POLYLINE: &str = "geometry_polyline";

/// Attributes of a directed `LINK`, measured along the edge direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAttributes {
    pub distance_km: f64,
    /// Cumulative ascent in metres.
    pub dplus_m: f64,
    /// Cumulative descent in metres.
    pub dminus_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_polyline: Option<String>,
}

impl LinkAttributes {
    pub fn new(distance_km: f64, dplus_m: f64, dminus_m: f64) -> Self {
        Self { distance_km, dplus_m, dminus_m, geometry_polyline: None }
    }

    pub fn with_polyline(mut self, polyline: impl Into<String>) -> Self {
        self.geometry_polyline = Some(polyline.into());
        self
    }

    /// The same segment walked the other way: ascent and descent swap,
    /// distance and geometry stay.
    pub fn reversed(&self) -> Self {
        Self {
            distance_km: self.distance_km,
            dplus_m: self.dminus_m,
            dminus_m: self.dplus_m,
            geometry_polyline: self.geometry_polyline.clone(),
        }
    }

    /// Reject non-finite or negative values and over-long segments.
    pub fn validate(&self, max_distance_km: f64) -> Result<()> {
        for (key, v) in [
            (DISTANCE_KM, self.distance_km),
            (DPLUS_M, self.dplus_m),
            (DMINUS_M, self.dminus_m),
        ] {
            if !v.is_finite() {
                return Err(Error::InvalidLink(format!("{key} must be a finite number, got {v}")));
            }
            if v < 0.0 {
                return Err(Error::InvalidLink(format!("{key} must be >= 0, got {v}")));
            }
        }
        if self.distance_km > max_distance_km {
            return Err(Error::InvalidLink(format!(
                "distance_km {} exceeds the {max_distance_km} km limit",
                self.distance_km
            )));
        }
        Ok(())
    }

    pub fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(DISTANCE_KM.into(), Value::Float(self.distance_km));
        props.insert(DPLUS_M.into(), Value::Float(self.dplus_m));
        props.insert(DMINUS_M.into(), Value::Float(self.dminus_m));
        if let Some(poly) = &self.geometry_polyline {
            props.insert(GEOMETRY_POLYLINE.into(), Value::from(poly.as_str()));
        }
        props
    }

    /// Read the attributes off a stored `LINK`. Missing numbers yield `None`.
    pub fn from_relationship(rel: &Relationship) -> Option<Self> {
        Some(Self {
            distance_km: rel.get(DISTANCE_KM)?.as_float()?,
            dplus_m: rel.get(DPLUS_M)?.as_float()?,
            dminus_m: rel.get(DMINUS_M)?.as_float()?,
            geometry_polyline: rel.get(GEOMETRY_POLYLINE).and_then(Value::as_str).map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_swaps_elevation() {
        let fwd = LinkAttributes::new(30.0, 556.0, 757.0).with_polyline("abc");
        let back = fwd.reversed();
        assert_eq!(back.distance_km, 30.0);
        assert_eq!(back.dplus_m, 757.0);
        assert_eq!(back.dminus_m, 556.0);
        assert_eq!(back.geometry_polyline.as_deref(), Some("abc"));
        assert_eq!(back.reversed(), fwd);
    }

    #[test]
    fn test_validate() {
        assert!(LinkAttributes::new(0.0, 0.0, 0.0).validate(MAX_LINK_DISTANCE_KM).is_ok());
        assert!(LinkAttributes::new(100.0, 1.0, 1.0).validate(MAX_LINK_DISTANCE_KM).is_ok());
        assert!(LinkAttributes::new(100.5, 1.0, 1.0).validate(MAX_LINK_DISTANCE_KM).is_err());
        assert!(LinkAttributes::new(-1.0, 1.0, 1.0).validate(MAX_LINK_DISTANCE_KM).is_err());
        assert!(LinkAttributes::new(1.0, -0.5, 1.0).validate(MAX_LINK_DISTANCE_KM).is_err());
        assert!(LinkAttributes::new(1.0, 1.0, f64::NAN).validate(MAX_LINK_DISTANCE_KM).is_err());
        assert!(LinkAttributes::new(f64::INFINITY, 1.0, 1.0).validate(f64::INFINITY).is_err());
    }

    #[test]
    fn test_properties_roundtrip_through_relationship() {
        use crate::model::{NodeId, RelId};

        let attrs = LinkAttributes::new(12.5, 300.0, 120.0);
        let mut rel = Relationship::new(RelId(1), NodeId(1), NodeId(2), LINK_TYPE);
        rel.properties = attrs.to_properties();
        assert!(!rel.properties.contains_key(GEOMETRY_POLYLINE));
        assert_eq!(LinkAttributes::from_relationship(&rel), Some(attrs));
    }
}
