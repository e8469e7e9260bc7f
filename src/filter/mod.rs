//! Filter model.
//!
//! A [`FilterSelection`] is the user's active narrowing of the dataset: an
//! optional inclusive order-date range plus multi-select sets for segment,
//! region and category. An empty set means "no restriction", matching what a
//! user expects from an untouched multi-select.
//!
//! Selections are immutable once built. The sets are ordered, so two
//! selections that contain the same values compare, hash and serialize
//! identically no matter the order the values were picked in.

mod predicate;

pub use predicate::{FilterColumns, Predicate};

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Errors raised while building a selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("date range is inverted: {from} is after {to}")]
    InvertedDateRange { from: NaiveDate, to: NaiveDate },

    #[error("filters.{key} must be a plain column name, got '{column}'")]
    InvalidColumn { key: &'static str, column: String },
}

/// Categorical dimensions a selection can restrict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Segment,
    Region,
    Category,
}

impl Dimension {
    /// Predicate order after the date range.
    pub const ALL: [Dimension; 3] = [Dimension::Segment, Dimension::Region, Dimension::Category];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Segment => "segment",
            Dimension::Region => "region",
            Dimension::Category => "category",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The active filter selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSelection")]
pub struct FilterSelection {
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    segments: BTreeSet<String>,
    regions: BTreeSet<String>,
    categories: BTreeSet<String>,
}

impl FilterSelection {
    /// The unrestricted selection.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn builder() -> FilterSelectionBuilder {
        FilterSelectionBuilder::default()
    }

    pub fn date_from(&self) -> Option<NaiveDate> {
        self.date_from
    }

    pub fn date_to(&self) -> Option<NaiveDate> {
        self.date_to
    }

    pub fn segments(&self) -> &BTreeSet<String> {
        &self.segments
    }

    pub fn regions(&self) -> &BTreeSet<String> {
        &self.regions
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// Selected values for a categorical dimension.
    pub fn values(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Segment => &self.segments,
            Dimension::Region => &self.regions,
            Dimension::Category => &self.categories,
        }
    }

    /// True when the selection restricts nothing.
    pub fn is_unrestricted(&self) -> bool {
        self.date_from.is_none()
            && self.date_to.is_none()
            && Dimension::ALL.iter().all(|d| self.values(*d).is_empty())
    }

    /// Every categorical value in the selection, across dimensions.
    pub fn all_values(&self) -> impl Iterator<Item = &str> {
        Dimension::ALL
            .into_iter()
            .flat_map(move |d| self.values(d).iter().map(String::as_str))
    }

    fn validate(&self) -> Result<(), FilterError> {
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) if from > to => Err(FilterError::InvertedDateRange { from, to }),
            _ => Ok(()),
        }
    }
}

/// Builder for [`FilterSelection`]; `build` checks the date invariant.
#[derive(Debug, Clone, Default)]
#[must_use = "builders have no effect until used"]
pub struct FilterSelectionBuilder {
    inner: FilterSelection,
}

impl FilterSelectionBuilder {
    pub fn date_from(mut self, from: NaiveDate) -> Self {
        self.inner.date_from = Some(from);
        self
    }

    pub fn date_to(mut self, to: NaiveDate) -> Self {
        self.inner.date_to = Some(to);
        self
    }

    pub fn date_range(self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from(from).date_to(to)
    }

    pub fn value(mut self, dimension: Dimension, value: impl Into<String>) -> Self {
        self.set_mut(dimension).insert(value.into());
        self
    }

    pub fn values<I, S>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_mut(dimension)
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn segment(self, value: impl Into<String>) -> Self {
        self.value(Dimension::Segment, value)
    }

    pub fn region(self, value: impl Into<String>) -> Self {
        self.value(Dimension::Region, value)
    }

    pub fn category(self, value: impl Into<String>) -> Self {
        self.value(Dimension::Category, value)
    }

    pub fn regions<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values(Dimension::Region, values)
    }

    pub fn segments<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values(Dimension::Segment, values)
    }

    pub fn categories<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values(Dimension::Category, values)
    }

    pub fn build(self) -> Result<FilterSelection, FilterError> {
        self.inner.validate()?;
        Ok(self.inner)
    }

    fn set_mut(&mut self, dimension: Dimension) -> &mut BTreeSet<String> {
        match dimension {
            Dimension::Segment => &mut self.inner.segments,
            Dimension::Region => &mut self.inner.regions,
            Dimension::Category => &mut self.inner.categories,
        }
    }
}

/// Wire shape accepted by `Deserialize`; every field may be omitted.
#[derive(Default, Deserialize)]
#[serde(default)]
struct RawSelection {
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    segments: BTreeSet<String>,
    regions: BTreeSet<String>,
    categories: BTreeSet<String>,
}

impl TryFrom<RawSelection> for FilterSelection {
    type Error = FilterError;

    fn try_from(raw: RawSelection) -> Result<Self, Self::Error> {
        let selection = FilterSelection {
            date_from: raw.date_from,
            date_to: raw.date_to,
            segments: raw.segments,
            regions: raw.regions,
            categories: raw.categories,
        };
        selection.validate()?;
        Ok(selection)
    }
}
