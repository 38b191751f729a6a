//! # Extraction query model
//!
//! Request objects for every curve type, built from three leaf configurations:
//!
//! | Leaf | Answers |
//! |------|---------|
//! | [`ExtractionRange`] | *when* to extract |
//! | [`VersionSelection`] | *which version* of a versioned curve |
//! | [`Filler`] | *how to fill* missing values |
//!
//! Every query type implements [`ExtractionQuery`], which is all the
//! partitioner and the dispatcher need to know about it.
//!
//! | Query | Path |
//! |-------|------|
//! | [`ActualQuery`] | `/ts/{granularity}/{range}` |
//! | [`VersionedQuery`] | `/vts/{version}/{granularity}/{range}` |
//! | [`MasQuery`] | `/mas/{range}` |
//! | [`AuctionQuery`] | `/auction/{range}` |
//! | [`BidAskQuery`] | `/ba/{range}` |
//! | [`DerivedQuery`] | `/der/{granularity}/{range}` |
//!
//! ```rust,ignore
//! use curvestore_core::query::{
//!     ActualQuery, ExtractionQuery, ExtractionRange, Granularity, Period, QueryBase,
//! };
//!
//! let base = QueryBase::for_ids(vec![100, 101], ExtractionRange::period(Period::days(-7)))
//!     .with_time_zone("Europe/Rome");
//! let query = ActualQuery::new(base, Granularity::Hour);
//! assert_eq!(query.relative_url(), "/ts/Hour/P-7D?id=100&id=101&tz=Europe%2FRome");
//! ```

mod filler;
mod granularity;
mod parameters;
mod period;
mod range;
mod rows;
mod version;

use std::fmt::Debug;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

use crate::ValidationError;

pub use filler::{BidAskFillerValue, Filler, FillerValue, MasFillerValue};
pub use granularity::Granularity;
pub use parameters::{
    ActualQuery, AuctionQuery, BidAskQuery, DerivedQuery, MasQuery, QueryBase, VersionedQuery,
};
pub use period::Period;
pub use range::{ExtractionRange, RelativeInterval};
pub use rows::TimeSeriesRow;
pub use version::{VersionSelection, VersionWindow};

/// Contract shared by every extraction request type.
pub trait ExtractionQuery: Clone + Debug + Send + Sync + 'static {
    fn base(&self) -> &QueryBase;

    fn base_mut(&mut self) -> &mut QueryBase;

    /// Path below the query service root, without the query string.
    fn path(&self) -> String;

    /// Type-specific query-string parameters.
    fn push_params(&self, params: &mut QueryString);

    fn validate(&self) -> Result<(), ValidationError> {
        self.base().validate()
    }

    /// Path and query string, ready to append to the service base url.
    fn relative_url(&self) -> String {
        let mut params = QueryString::default();
        self.base().push_params(&mut params);
        self.push_params(&mut params);
        params.append_to(self.path())
    }

    /// Copy of this query targeting `ids`; every other field is untouched.
    fn with_ids(&self, ids: Vec<i32>) -> Self {
        let mut child = self.clone();
        child.base_mut().ids = Some(ids);
        child
    }
}

/// Ordered, repeatable query-string parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(&'static str, String)>,
}

impl QueryString {
    pub fn push(&mut self, key: &'static str, value: impl Into<String>) {
        self.pairs.push((key, value.into()));
    }

    pub fn push_opt<T: ToString>(&mut self, key: &'static str, value: Option<T>) {
        if let Some(value) = value {
            self.push(key, value.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn render(&self) -> String {
        self.pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn append_to(&self, path: String) -> String {
        if self.is_empty() {
            path
        } else {
            format!("{path}?{}", self.render())
        }
    }
}

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DATE_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// `YYYY-MM-DD`, as the service expects in paths and error messages.
pub(crate) fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .expect("calendar dates must be formattable as [year]-[month]-[day]")
}

/// `YYYY-MM-DDThh:mm:ss` without offset or sub-second digits.
pub(crate) fn format_date_time(value: PrimitiveDateTime) -> String {
    value
        .format(DATE_TIME_FORMAT)
        .expect("date-times must be formattable without an offset")
}
