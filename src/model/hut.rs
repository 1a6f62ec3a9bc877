//! Hut — the typed view of a `:Hut` node.

use serde::{Deserialize, Serialize};

use super::{Node, PropertyMap, Value};
use crate::{Error, Result};

/// Label carried by every hut node.
pub const HUT_LABEL: &str = "Hut";

/// A lodging location in the hut network.
///
/// Only `name` is required; it is the key the link loader resolves by.
/// The remaining fields mirror what the hut catalogue stores when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hut {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hut_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,

    // OpenStreetMap provenance, set when a hut is imported from OSM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tourism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelter_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// The full OSM tag set as a JSON object string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags_json: Option<String>,
}

impl Hut {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hut_id: None,
            latitude: None,
            longitude: None,
            country_code: None,
            osm_id: None,
            tourism: None,
            amenity: None,
            shelter_type: None,
            operator: None,
            tags_json: None,
        }
    }

    pub fn with_id(mut self, hut_id: i64) -> Self {
        self.hut_id = Some(hut_id);
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_country(mut self, code: impl Into<String>) -> Self {
        self.country_code = Some(code.into());
        self
    }

    /// Attach OSM provenance. `tourism`, `amenity`, `shelter_type` and
    /// `operator` are lifted out of `tags`; the whole tag set is kept as
    /// `tags_json` unless it is empty.
    pub fn with_osm(mut self, osm_id: Option<i64>, tags: &serde_json::Map<String, serde_json::Value>) -> Self {
        let tag = |key: &str| tags.get(key).and_then(serde_json::Value::as_str).map(str::to_string);
        self.osm_id = osm_id;
        self.tourism = tag("tourism");
        self.amenity = tag("amenity");
        self.shelter_type = tag("shelter_type");
        self.operator = tag("operator");
        self.tags_json = (!tags.is_empty()).then(|| serde_json::Value::Object(tags.clone()).to_string());
        self
    }

    /// Check the catalogue constraints on a hut before it is stored.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidHut("hut name must not be empty".into()));
        }
        if let Some(lat) = self.latitude
            && !(-90.0..=90.0).contains(&lat)
        {
            return Err(Error::InvalidHut(format!("{}: latitude {lat} out of range", self.name)));
        }
        if let Some(lon) = self.longitude
            && !(-180.0..=180.0).contains(&lon)
        {
            return Err(Error::InvalidHut(format!("{}: longitude {lon} out of range", self.name)));
        }
        if let Some(code) = &self.country_code
            && code.chars().count() > 2
        {
            return Err(Error::InvalidHut(format!("{}: country code '{code}' longer than 2", self.name)));
        }
        Ok(())
    }

    /// Properties written on the `:Hut` node. Absent fields are omitted.
    pub fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::from(self.name.as_str()));
        if let Some(id) = self.hut_id {
            props.insert("hut_id".into(), Value::Int(id));
        }
        if let Some(lat) = self.latitude {
            props.insert("latitude".into(), Value::Float(lat));
        }
        if let Some(lon) = self.longitude {
            props.insert("longitude".into(), Value::Float(lon));
        }
        if let Some(osm_id) = self.osm_id {
            props.insert("osm_id".into(), Value::Int(osm_id));
        }
        let strings = [
            ("country_code", &self.country_code),
            ("tourism", &self.tourism),
            ("amenity", &self.amenity),
            ("shelter_type", &self.shelter_type),
            ("operator", &self.operator),
            ("tags_json", &self.tags_json),
        ];
        for (key, val) in strings {
            if let Some(s) = val {
                props.insert(key.into(), Value::from(s.as_str()));
            }
        }
        props
    }

    /// Read a hut back from a node. Returns `None` for non-hut nodes.
    pub fn from_node(node: &Node) -> Option<Self> {
        if !node.has_label(HUT_LABEL) {
            return None;
        }
        let name = node.get("name")?.as_str()?.to_string();
        let text = |key: &str| node.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            name,
            hut_id: node.get("hut_id").and_then(Value::as_int),
            latitude: node.get("latitude").and_then(Value::as_float),
            longitude: node.get("longitude").and_then(Value::as_float),
            country_code: text("country_code"),
            osm_id: node.get("osm_id").and_then(Value::as_int),
            tourism: text("tourism"),
            amenity: text("amenity"),
            shelter_type: text("shelter_type"),
            operator: text("operator"),
            tags_json: text("tags_json"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    #[test]
    fn test_hut_node_roundtrip() {
        let hut = Hut::new("Abiskojaure").with_id(12).with_location(68.29, 18.6).with_country("SE");
        let node = Node::new(NodeId(1)).with_labels([HUT_LABEL]);
        let node = hut.to_properties().into_iter().fold(node, |n, (k, v)| n.with_property(k, v));
        assert_eq!(Hut::from_node(&node), Some(hut));
    }

    #[test]
    fn test_osm_tags_are_lifted_and_kept() {
        let tags = serde_json::json!({"tourism": "wilderness_hut", "operator": "STF", "beds": "20"});
        let tags = tags.as_object().unwrap();
        let hut = Hut::new("Kårsavagge").with_location(68.36, 18.33).with_osm(Some(123456), tags);

        assert_eq!(hut.osm_id, Some(123456));
        assert_eq!(hut.tourism.as_deref(), Some("wilderness_hut"));
        assert_eq!(hut.operator.as_deref(), Some("STF"));
        assert_eq!(hut.amenity, None);
        let stored: serde_json::Value = serde_json::from_str(hut.tags_json.as_deref().unwrap()).unwrap();
        assert_eq!(stored["beds"], "20");

        let node = Node::new(NodeId(1)).with_labels([HUT_LABEL]);
        let node = hut.to_properties().into_iter().fold(node, |n, (k, v)| n.with_property(k, v));
        assert_eq!(Hut::from_node(&node), Some(hut));
    }

    #[test]
    fn test_empty_osm_tags_store_no_json() {
        let hut = Hut::new("Vistas").with_osm(None, &serde_json::Map::new());
        assert_eq!(hut.tags_json, None);
        assert!(!hut.to_properties().contains_key("tags_json"));
    }

    #[test]
    fn test_non_hut_node_is_ignored() {
        let node = Node::new(NodeId(1)).with_labels(["Shelter"]).with_property("name", "Kieron");
        assert!(Hut::from_node(&node).is_none());
    }

    #[test]
    fn test_validate_rejects_bad_coordinates() {
        assert!(Hut::new("Tjäktja").with_location(91.0, 18.0).validate().is_err());
        assert!(Hut::new("Tjäktja").with_location(67.0, -181.0).validate().is_err());
        assert!(Hut::new("   ").validate().is_err());
        assert!(Hut::new("Sälka").with_country("SWE").validate().is_err());
        assert!(Hut::new("Sälka").with_location(67.9, 18.4).with_country("SE").validate().is_ok());
    }
}
