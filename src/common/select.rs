//! Tri-state selection of query filter values.

use std::collections::HashSet;
use std::hash::Hash;

/// Selection of values to restrict a counting query by.
///
/// A selection either matches any value, no value at all, or exactly an
/// explicit set of values. An explicitly empty set and `none()` are the same
/// logical state; consumers must only ever distinguish the three logical
/// states, never the construction path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Select<T: Eq + Hash> {
    /// Match any value.
    All,
    /// Match no value at all.
    None,
    /// Match exactly the given values.
    ByValues(HashSet<T>),
}

impl<T> Select<T>
where
    T: Eq + Hash,
{
    /// Construct a selection matching any value.
    pub fn all() -> Self {
        Select::All
    }

    /// Construct a selection matching no value.
    pub fn none() -> Self {
        Select::None
    }

    /// Construct a selection matching exactly the values in `values`.
    pub fn by_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Select::ByValues(values.into_iter().collect())
    }

    /// Return whether the selection matches any value.
    pub fn is_all(&self) -> bool {
        matches!(self, Select::All)
    }

    /// Return whether the selection matches no value.
    pub fn is_none(&self) -> bool {
        match self {
            Select::All => false,
            Select::None => true,
            Select::ByValues(values) => values.is_empty(),
        }
    }

    /// Determine whether `value` passes the selection.
    pub fn passes(&self, value: &T) -> bool {
        match self {
            Select::All => true,
            Select::None => false,
            Select::ByValues(values) => values.contains(value),
        }
    }
}

impl<T> From<Option<Vec<T>>> for Select<T>
where
    T: Eq + Hash,
{
    /// Translate the query file representation: an absent list matches any
    /// value, an empty list matches no value.
    fn from(values: Option<Vec<T>>) -> Self {
        match values {
            Some(values) => Select::by_values(values),
            Option::None => Select::All,
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::Select;

    #[rstest]
    #[case(Select::all(), 1, true)]
    #[case(Select::all(), 42, true)]
    #[case(Select::none(), 1, false)]
    #[case(Select::by_values(vec![]), 1, false)]
    #[case(Select::by_values(vec![1, 2]), 1, true)]
    #[case(Select::by_values(vec![1, 2]), 3, false)]
    fn passes(#[case] select: Select<u32>, #[case] value: u32, #[case] expected: bool) {
        assert_eq!(
            select.passes(&value),
            expected,
            "select: {:?}, value: {}",
            select,
            value
        );
    }

    #[test]
    fn empty_by_values_behaves_as_none() {
        let explicit: Select<u32> = Select::none();
        let empty: Select<u32> = Select::by_values(vec![]);

        assert!(explicit.is_none());
        assert!(empty.is_none());
        assert!(!explicit.is_all());
        assert!(!empty.is_all());
        assert!(!explicit.passes(&1));
        assert!(!empty.passes(&1));
    }

    #[rstest]
    #[case(None, true, false)]
    #[case(Some(vec![]), false, true)]
    #[case(Some(vec![672]), false, false)]
    fn from_optional_list(
        #[case] values: Option<Vec<u32>>,
        #[case] expect_all: bool,
        #[case] expect_none: bool,
    ) {
        let select = Select::from(values);

        assert_eq!(select.is_all(), expect_all);
        assert_eq!(select.is_none(), expect_none);
    }
}
