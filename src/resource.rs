use crate::selector::Selector;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    On,
    Off,
}

/// Hue, saturation and kelvin. Brightness is carried separately on both
/// fixtures and targets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Hsbk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kelvin: Option<f64>,
}

/// A group or location a fixture belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub has_color: Option<bool>,
    pub has_multizone: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub identifier: Option<String>,
    pub capabilities: Option<Capabilities>,
}

const MULTIZONE_PRODUCT_WORDS: [&str; 4] = ["Beam", "Z", "Strip", "Lightstrip"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub connected: Option<bool>,
    pub power: Option<Power>,
    pub brightness: Option<f64>,
    pub color: Option<Hsbk>,
    pub group: Option<Reference>,
    pub location: Option<Reference>,
    pub product: Option<Product>,
}

impl Fixture {
    pub fn group_id(&self) -> Option<&str> {
        self.group.as_ref().map(|group| group.id.as_str())
    }

    /// Whether zones of this fixture can be addressed individually.
    pub fn is_multizone(&self) -> bool {
        let Some(product) = &self.product else {
            return false;
        };
        if let Some(multizone) = product
            .capabilities
            .as_ref()
            .and_then(|capabilities| capabilities.has_multizone)
        {
            return multizone;
        }
        product
            .name
            .split_whitespace()
            .any(|word| MULTIZONE_PRODUCT_WORDS.contains(&word))
    }
}

/// The expected state of the fixtures addressed by one selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, deserialize_with = "non_empty_selector")]
    pub selector: Option<Selector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<Power>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Hsbk>,
}

fn non_empty_selector<'de, D>(deserializer: D) -> Result<Option<Selector>, D::Error>
where
    D: Deserializer<'de>,
{
    let text: Option<String> = Option::deserialize(deserializer)?;
    Ok(text
        .filter(|text| !text.trim().is_empty())
        .map(|text| Selector::parse(&text)))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(rename = "uuid", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `None` when the upstream record carries no state list at all.
    #[serde(rename = "states")]
    pub targets: Option<Vec<Target>>,
}
