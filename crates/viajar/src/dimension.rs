//! Combinatorial dimension space.
//!
//! Dimensions declare the axes along which behavior is explored, e.g.
//! `auth = {anon, user, admin}` crossed with `count = {zero, one,
//! many}`. A [`Combination`] assigns one value per axis and carries a
//! canonical identity string so logically identical states collapse to
//! one node regardless of assignment order.

use crate::result::{ViajarError, ViajarResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named axis of variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Axis name
    pub name: String,
    /// Ordered, distinct values
    pub values: Vec<String>,
    /// Default value, if one assignment is the baseline
    pub default: Option<String>,
}

impl Dimension {
    /// Create a dimension, validating value uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDimensionValue` if the same value appears
    /// twice.
    pub fn new<S: Into<String>>(name: impl Into<String>, values: Vec<S>) -> ViajarResult<Self> {
        let name = name.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        for (i, value) in values.iter().enumerate() {
            if values[..i].contains(value) {
                return Err(ViajarError::DuplicateDimensionValue {
                    dimension: name,
                    value: value.clone(),
                });
            }
        }
        Ok(Self {
            name,
            values,
            default: None,
        })
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Number of values on this axis.
    #[must_use]
    pub fn size(&self) -> usize {
        self.values.len()
    }
}

/// A concrete assignment of one value per dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    assignments: BTreeMap<String, String>,
}

impl Combination {
    /// Create a combination from (dimension, value) pairs.
    #[must_use]
    pub fn new(assignments: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            assignments: assignments.into_iter().collect(),
        }
    }

    /// Value assigned to a dimension.
    #[must_use]
    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.assignments.get(dimension).map(String::as_str)
    }

    /// Number of assigned dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Check if nothing is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Canonical identity string: `name=value` pairs sorted by name.
    ///
    /// Two combinations with the same assignments produce the same
    /// identity regardless of construction order.
    #[must_use]
    pub fn identity(&self) -> String {
        self.assignments
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The single dimension on which two combinations differ.
    ///
    /// Returns `None` when the combinations are identical, differ on
    /// more than one dimension, or have mismatched dimension sets.
    #[must_use]
    pub fn differs_by_one(&self, other: &Self) -> Option<&str> {
        if self.assignments.len() != other.assignments.len() {
            return None;
        }
        let mut differing = None;
        for (name, value) in &self.assignments {
            match other.assignments.get(name) {
                None => return None,
                Some(other_value) if other_value == value => {}
                Some(_) => {
                    if differing.is_some() {
                        return None;
                    }
                    differing = Some(name.as_str());
                }
            }
        }
        differing
    }

    /// Iterate over assignments in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for Combination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity())
    }
}

/// An ordered set of dimensions with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSpace {
    dimensions: Vec<Dimension>,
}

impl DimensionSpace {
    /// Build a space from dimensions, validating name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDimension` if two dimensions share a name.
    pub fn new(dimensions: Vec<Dimension>) -> ViajarResult<Self> {
        for (i, dim) in dimensions.iter().enumerate() {
            if dimensions[..i].iter().any(|d| d.name == dim.name) {
                return Err(ViajarError::DuplicateDimension {
                    dimension: dim.name.clone(),
                });
            }
        }
        Ok(Self { dimensions })
    }

    /// The declared dimensions, in declaration order.
    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Check if the space has no dimensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Product of all dimension sizes.
    #[must_use]
    pub fn total_combinations(&self) -> usize {
        if self.dimensions.is_empty() {
            return 0;
        }
        self.dimensions.iter().map(Dimension::size).product()
    }

    /// Full Cartesian product of the space.
    ///
    /// Yields `total_combinations()` combinations, each with a distinct
    /// identity string. An empty space yields nothing.
    #[must_use]
    pub fn all_combinations(&self) -> Vec<Combination> {
        if self.dimensions.is_empty() || self.dimensions.iter().any(|d| d.values.is_empty()) {
            return Vec::new();
        }
        let mut combos = vec![Vec::<(String, String)>::new()];
        for dim in &self.dimensions {
            let mut next = Vec::with_capacity(combos.len() * dim.values.len());
            for partial in &combos {
                for value in &dim.values {
                    let mut extended = partial.clone();
                    extended.push((dim.name.clone(), value.clone()));
                    next.push(extended);
                }
            }
            combos = next;
        }
        combos.into_iter().map(Combination::new).collect()
    }

    /// The combination built from each dimension's default value.
    ///
    /// Dimensions without a default fall back to their first value.
    #[must_use]
    pub fn default_combination(&self) -> Combination {
        Combination::new(self.dimensions.iter().filter_map(|d| {
            d.default
                .clone()
                .or_else(|| d.values.first().cloned())
                .map(|v| (d.name.clone(), v))
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn space() -> DimensionSpace {
        DimensionSpace::new(vec![
            Dimension::new("auth", vec!["anon", "user", "admin"]).unwrap(),
            Dimension::new("count", vec!["zero", "one", "many"]).unwrap(),
        ])
        .unwrap()
    }

    mod dimension_tests {
        use super::*;

        #[test]
        fn test_duplicate_value_rejected() {
            let err = Dimension::new("auth", vec!["anon", "anon"]).unwrap_err();
            assert!(matches!(err, ViajarError::DuplicateDimensionValue { .. }));
        }

        #[test]
        fn test_duplicate_name_rejected() {
            let err = DimensionSpace::new(vec![
                Dimension::new("a", vec!["1"]).unwrap(),
                Dimension::new("a", vec!["2"]).unwrap(),
            ])
            .unwrap_err();
            assert!(matches!(err, ViajarError::DuplicateDimension { .. }));
        }

        #[test]
        fn test_default_combination() {
            let space = DimensionSpace::new(vec![
                Dimension::new("auth", vec!["anon", "user"]).unwrap().with_default("user"),
                Dimension::new("count", vec!["zero", "one"]).unwrap(),
            ])
            .unwrap();
            let combo = space.default_combination();
            assert_eq!(combo.get("auth"), Some("user"));
            assert_eq!(combo.get("count"), Some("zero"));
        }
    }

    mod combination_tests {
        use super::*;

        #[test]
        fn test_identity_is_order_independent() {
            let a = Combination::new(vec![
                ("auth".to_string(), "user".to_string()),
                ("count".to_string(), "one".to_string()),
            ]);
            let b = Combination::new(vec![
                ("count".to_string(), "one".to_string()),
                ("auth".to_string(), "user".to_string()),
            ]);
            assert_eq!(a.identity(), b.identity());
            assert_eq!(a.identity(), "auth=user,count=one");
        }

        #[test]
        fn test_differs_by_one_adjacent() {
            let a = Combination::new(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
            ]);
            let b = Combination::new(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "4".to_string()),
            ]);
            assert_eq!(a.differs_by_one(&b), Some("b"));
        }

        #[test]
        fn test_differs_by_one_not_adjacent() {
            let a = Combination::new(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
            ]);
            let two_apart = Combination::new(vec![
                ("a".to_string(), "2".to_string()),
                ("b".to_string(), "4".to_string()),
            ]);
            assert_eq!(a.differs_by_one(&two_apart), None);
            assert_eq!(a.differs_by_one(&a.clone()), None);
        }

        #[test]
        fn test_differs_by_one_mismatched_sets() {
            let a = Combination::new(vec![("a".to_string(), "1".to_string())]);
            let b = Combination::new(vec![("b".to_string(), "1".to_string())]);
            assert_eq!(a.differs_by_one(&b), None);

            let wider = Combination::new(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "1".to_string()),
            ]);
            assert_eq!(a.differs_by_one(&wider), None);
        }
    }

    mod space_tests {
        use super::*;

        #[test]
        fn test_total_combinations() {
            assert_eq!(space().total_combinations(), 9);

            let two_by_two = DimensionSpace::new(vec![
                Dimension::new("a", vec!["1", "2"]).unwrap(),
                Dimension::new("b", vec!["3", "4"]).unwrap(),
            ])
            .unwrap();
            assert_eq!(two_by_two.total_combinations(), 4);
        }

        #[test]
        fn test_all_combinations_distinct_identities() {
            let combos = space().all_combinations();
            assert_eq!(combos.len(), 9);
            let identities: HashSet<String> = combos.iter().map(Combination::identity).collect();
            assert_eq!(identities.len(), 9);
        }

        #[test]
        fn test_empty_space() {
            let space = DimensionSpace::default();
            assert_eq!(space.total_combinations(), 0);
            assert!(space.all_combinations().is_empty());
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_product_matches_enumeration(
                sizes in proptest::collection::vec(1usize..4, 1..4)
            ) {
                let dims: Vec<Dimension> = sizes
                    .iter()
                    .enumerate()
                    .map(|(i, &n)| {
                        let values: Vec<String> = (0..n).map(|v| format!("v{v}")).collect();
                        Dimension::new(format!("d{i}"), values).unwrap()
                    })
                    .collect();
                let space = DimensionSpace::new(dims).unwrap();
                prop_assert_eq!(space.all_combinations().len(), space.total_combinations());
            }

            #[test]
            fn prop_identities_unique(
                sizes in proptest::collection::vec(1usize..4, 1..4)
            ) {
                let dims: Vec<Dimension> = sizes
                    .iter()
                    .enumerate()
                    .map(|(i, &n)| {
                        let values: Vec<String> = (0..n).map(|v| format!("v{v}")).collect();
                        Dimension::new(format!("d{i}"), values).unwrap()
                    })
                    .collect();
                let space = DimensionSpace::new(dims).unwrap();
                let combos = space.all_combinations();
                let identities: HashSet<String> =
                    combos.iter().map(Combination::identity).collect();
                prop_assert_eq!(identities.len(), combos.len());
            }
        }
    }
}
