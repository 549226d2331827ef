use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Accepted value(s) for one attribute key
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    /// `true` accepts any value for the key, `false` requires the key to be absent
    Any(bool),
    One(String),
    Many(Vec<String>),
}

impl TagValue {
    fn accepts(&self, value: Option<&String>) -> bool {
        match (self, value) {
            (TagValue::Any(present), v) => *present == v.is_some(),
            (TagValue::One(expected), Some(v)) => expected == v,
            (TagValue::Many(options), Some(v)) => options.iter().any(|o| o == v),
            (_, None) => false,
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::One(value.to_string())
    }
}

impl From<&[&str]> for TagValue {
    fn from(values: &[&str]) -> Self {
        TagValue::Many(values.iter().map(|v| v.to_string()).collect())
    }
}

/// A conjunction of key predicates: matches when every key matches
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PredicateSet(BTreeMap<String, TagValue>);

impl PredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, attributes: &HashMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(key, accepted)| accepted.accepts(attributes.get(key)))
    }
}

/// A named print layer selecting features by attribute predicates
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TagGroup {
    pub name: String,
    #[serde(rename = "match")]
    pub predicates: Vec<PredicateSet>,
}

impl TagGroup {
    pub fn new(name: impl Into<String>, predicates: Vec<PredicateSet>) -> Self {
        Self {
            name: name.into(),
            predicates,
        }
    }

    /// A feature belongs to the group when any predicate set matches it
    pub fn matches(&self, attributes: &HashMap<String, String>) -> bool {
        self.predicates.iter().any(|set| set.matches(attributes))
    }
}

/// Index of the first group matching `attributes`
pub fn assign_group(groups: &[TagGroup], attributes: &HashMap<String, String>) -> Option<usize> {
    groups.iter().position(|group| group.matches(attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_predicate_set_requires_all_keys() {
        let set = PredicateSet::new()
            .with("building", "yes")
            .with("roof", ["flat", "gabled"].as_slice());

        assert!(set.matches(&attrs(&[("building", "yes"), ("roof", "flat")])));
        assert!(!set.matches(&attrs(&[("building", "yes")])));
        assert!(!set.matches(&attrs(&[("building", "yes"), ("roof", "dome")])));
    }

    #[test]
    fn test_any_value_predicate() {
        let present = PredicateSet::new().with("building", TagValue::Any(true));
        let absent = PredicateSet::new().with("building", TagValue::Any(false));

        assert!(present.matches(&attrs(&[("building", "church")])));
        assert!(!present.matches(&attrs(&[("natural", "water")])));
        assert!(absent.matches(&attrs(&[("natural", "water")])));
    }

    #[test]
    fn test_first_group_wins() {
        let groups = vec![
            TagGroup::new("water", vec![PredicateSet::new().with("natural", "water")]),
            TagGroup::new(
                "buildings",
                vec![PredicateSet::new().with("building", ["yes", "palace"].as_slice())],
            ),
            TagGroup::new(
                "anything",
                vec![PredicateSet::new().with("building", TagValue::Any(true))],
            ),
        ];

        assert_eq!(assign_group(&groups, &attrs(&[("building", "yes")])), Some(1));
        assert_eq!(assign_group(&groups, &attrs(&[("building", "shed")])), Some(2));
        assert_eq!(
            assign_group(&groups, &attrs(&[("natural", "water"), ("building", "yes")])),
            Some(0)
        );
        assert_eq!(assign_group(&groups, &attrs(&[("highway", "primary")])), None);
    }

    #[test]
    fn test_deserialize_group_from_json() {
        let json = r#"{"name": "buildings", "match": [{"building": ["yes", "palace"]}, {"amenity": true}]}"#;
        let group: TagGroup = serde_json::from_str(json).unwrap();

        assert_eq!(group.predicates.len(), 2);
        assert!(group.matches(&attrs(&[("building", "palace")])));
        assert!(group.matches(&attrs(&[("amenity", "school")])));
        assert!(!group.matches(&attrs(&[("building", "shed")])));
    }
}
