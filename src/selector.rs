use crate::resource::{Fixture, Reference};
use crate::LightError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static FIXTURE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>[^|,\s]+)(?:\|(?P<start>\d+)(?:-(?P<end>\d+))?)?$")
        .expect("fixture id pattern is valid")
});

/// Zones of a multizone fixture. Only used to address writes, never to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    Single(u16),
    /// Inclusive on both ends.
    Range(u16, u16),
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Single(zone) => write!(f, "{zone}"),
            Zone::Range(start, end) => write!(f, "{start}-{end}"),
        }
    }
}

/// One LIFX selector, e.g. `all`, `id:d073d5000001|0-4` or `group:Kitchen`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selector {
    All,
    ByFixtureId { id: String, zone: Option<Zone> },
    ByGroupId(String),
    ByGroupName(String),
    ByLocationId(String),
    ByLocationName(String),
    /// Text no grammar form recognizes. Matches nothing.
    Unknown(String),
}

impl Selector {
    /// Permissive parse: text that is not a selector becomes
    /// [`Selector::Unknown`]. Use `str::parse` to reject it instead.
    pub fn parse(text: &str) -> Selector {
        let text = text.trim();
        if text == "all" {
            return Selector::All;
        }
        let parsed = if let Some(rest) = text.strip_prefix("id:") {
            parse_fixture_id(rest)
        } else if let Some(id) = text.strip_prefix("group_id:") {
            non_empty(id).map(|id| Selector::ByGroupId(id.to_string()))
        } else if let Some(name) = text.strip_prefix("group:") {
            non_empty(name).map(|name| Selector::ByGroupName(name.to_string()))
        } else if let Some(id) = text.strip_prefix("location_id:") {
            non_empty(id).map(|id| Selector::ByLocationId(id.to_string()))
        } else if let Some(name) = text.strip_prefix("location:") {
            non_empty(name).map(|name| Selector::ByLocationName(name.to_string()))
        } else {
            None
        };
        parsed.unwrap_or_else(|| Selector::Unknown(text.to_string()))
    }

    pub fn fixture(id: impl Into<String>) -> Selector {
        Selector::ByFixtureId {
            id: id.into(),
            zone: None,
        }
    }

    /// Whether `fixture` falls within the scope of this selector.
    pub fn matches(&self, fixture: &Fixture) -> bool {
        match self {
            Selector::All => true,
            Selector::ByFixtureId { id, .. } => fixture.id == *id,
            Selector::ByGroupId(id) => reference_id_is(fixture.group.as_ref(), id),
            Selector::ByGroupName(name) => reference_name_is(fixture.group.as_ref(), name),
            Selector::ByLocationId(id) => reference_id_is(fixture.location.as_ref(), id),
            Selector::ByLocationName(name) => reference_name_is(fixture.location.as_ref(), name),
            Selector::Unknown(_) => false,
        }
    }

    /// All fixtures of `fixtures` this selector addresses.
    pub fn select<'a>(&'a self, fixtures: &'a [Fixture]) -> impl Iterator<Item = &'a Fixture> {
        fixtures.iter().filter(|fixture| self.matches(fixture))
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_fixture_id(rest: &str) -> Option<Selector> {
    let captures = FIXTURE_ID.captures(rest)?;
    let id = captures["id"].to_string();
    let number = |name: &str| captures.name(name).map(|m| m.as_str().parse::<u16>());
    let zone = match (number("start"), number("end")) {
        (None, _) => None,
        (Some(start), None) => Some(Zone::Single(start.ok()?)),
        (Some(start), Some(end)) => {
            let (start, end) = (start.ok()?, end.ok()?);
            if start > end {
                return None;
            }
            Some(Zone::Range(start, end))
        }
    };
    Some(Selector::ByFixtureId { id, zone })
}

fn reference_id_is(reference: Option<&Reference>, id: &str) -> bool {
    reference.is_some_and(|reference| reference.id.eq_ignore_ascii_case(id))
}

fn reference_name_is(reference: Option<&Reference>, name: &str) -> bool {
    reference.is_some_and(|reference| reference.name.to_lowercase() == name.to_lowercase())
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("all"),
            Selector::ByFixtureId { id, zone: None } => write!(f, "id:{id}"),
            Selector::ByFixtureId { id, zone: Some(zone) } => write!(f, "id:{id}|{zone}"),
            Selector::ByGroupId(id) => write!(f, "group_id:{id}"),
            Selector::ByGroupName(name) => write!(f, "group:{name}"),
            Selector::ByLocationId(id) => write!(f, "location_id:{id}"),
            Selector::ByLocationName(name) => write!(f, "location:{name}"),
            Selector::Unknown(text) => f.write_str(text),
        }
    }
}

impl FromStr for Selector {
    type Err = LightError;

    fn from_str(text: &str) -> crate::Result<Selector> {
        match Selector::parse(text) {
            Selector::Unknown(text) => Err(LightError::invalid_selector(text)),
            selector => Ok(selector),
        }
    }
}

impl From<String> for Selector {
    fn from(text: String) -> Selector {
        Selector::parse(&text)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> String {
        selector.to_string()
    }
}

/// Comma-joined selectors, the form the upstream API accepts for addressing
/// several targets in one call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorList(Vec<Selector>);

impl SelectorList {
    pub fn all() -> SelectorList {
        SelectorList(vec![Selector::All])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.0.iter()
    }

    pub fn contains_all(&self) -> bool {
        self.0.contains(&Selector::All)
    }

    pub fn matches(&self, fixture: &Fixture) -> bool {
        self.0.iter().any(|selector| selector.matches(fixture))
    }
}

impl FromIterator<Selector> for SelectorList {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> SelectorList {
        SelectorList(iter.into_iter().collect())
    }
}

impl From<Selector> for SelectorList {
    fn from(selector: Selector) -> SelectorList {
        SelectorList(vec![selector])
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, selector) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{selector}")?;
        }
        Ok(())
    }
}

impl FromStr for SelectorList {
    type Err = LightError;

    /// Every comma-separated element must be a recognized selector.
    fn from_str(text: &str) -> crate::Result<SelectorList> {
        if text.trim().is_empty() {
            return Err(LightError::invalid_selector(text));
        }
        text.split(',').map(|part| part.parse::<Selector>()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lounge_lamp() -> Fixture {
        Fixture {
            id: "d073d5000001".into(),
            label: "Lamp".into(),
            group: Some(Reference {
                id: "g1".into(),
                name: "Lounge".into(),
            }),
            location: Some(Reference {
                id: "l1".into(),
                name: "Home".into(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn parses_every_form() {
        assert_eq!(Selector::parse("all"), Selector::All);
        assert_eq!(Selector::parse("id:abc"), Selector::fixture("abc"));
        assert_eq!(
            Selector::parse("id:abc|3"),
            Selector::ByFixtureId {
                id: "abc".into(),
                zone: Some(Zone::Single(3))
            }
        );
        assert_eq!(
            Selector::parse("id:abc|0-4"),
            Selector::ByFixtureId {
                id: "abc".into(),
                zone: Some(Zone::Range(0, 4))
            }
        );
        assert_eq!(Selector::parse("group_id:g1"), Selector::ByGroupId("g1".into()));
        assert_eq!(
            Selector::parse("group:Living Room"),
            Selector::ByGroupName("Living Room".into())
        );
        assert_eq!(Selector::parse("location_id:l1"), Selector::ByLocationId("l1".into()));
        assert_eq!(Selector::parse("location:Home"), Selector::ByLocationName("Home".into()));
    }

    #[test]
    fn unrecognized_text_is_permissive() {
        for text in ["", "everything", "id:", "group:", "id:abc|x", "id:abc|5-2", "label:Lamp"] {
            assert!(matches!(Selector::parse(text), Selector::Unknown(_)), "{text}");
        }
        assert!(matches!(
            "everything".parse::<Selector>(),
            Err(LightError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn format_is_inverse_of_parse() {
        for text in [
            "all",
            "id:abc",
            "id:abc|7",
            "id:abc|2-9",
            "group_id:g1",
            "group:Kitchen",
            "location_id:l1",
            "location:Home",
        ] {
            assert_eq!(Selector::parse(text).to_string(), text);
        }
    }

    #[test]
    fn zone_is_ignored_for_matching() {
        let lamp = lounge_lamp();
        assert!(Selector::parse("id:d073d5000001|0-4").matches(&lamp));
        assert!(Selector::parse("id:d073d5000001").matches(&lamp));
        assert!(!Selector::parse("id:d073d5000002").matches(&lamp));
    }

    #[test]
    fn group_and_location_match_case_insensitively() {
        let lamp = lounge_lamp();
        assert!(Selector::parse("group:lounge").matches(&lamp));
        assert!(Selector::parse("group_id:G1").matches(&lamp));
        assert!(Selector::parse("location:HOME").matches(&lamp));
        assert!(Selector::parse("location_id:l1").matches(&lamp));
        assert!(!Selector::parse("group:Kitchen").matches(&lamp));
        assert!(Selector::All.matches(&lamp));
        assert!(!Selector::parse("bogus").matches(&lamp));
    }

    #[test]
    fn fixtures_without_association_never_match() {
        let loose = Fixture {
            id: "x".into(),
            ..Default::default()
        };
        assert!(!Selector::parse("group:Lounge").matches(&loose));
        assert!(!Selector::parse("location:Home").matches(&loose));
        assert!(Selector::All.matches(&loose));
    }

    #[test]
    fn selector_lists_join_with_commas() {
        let list: SelectorList = "id:a,group_id:g1".parse().unwrap();
        assert_eq!(list.iter().count(), 2);
        assert_eq!(list.to_string(), "id:a,group_id:g1");
        assert!("id:a,nonsense".parse::<SelectorList>().is_err());
        assert!("".parse::<SelectorList>().is_err());
        assert_eq!(SelectorList::default().to_string(), "");
    }

    #[test]
    fn selector_deserializes_from_string() {
        let selector: Selector = serde_json::from_str(r#""group:Kitchen""#).unwrap();
        assert_eq!(selector, Selector::ByGroupName("Kitchen".into()));
        assert_eq!(serde_json::to_string(&selector).unwrap(), r#""group:Kitchen""#);
    }
}
