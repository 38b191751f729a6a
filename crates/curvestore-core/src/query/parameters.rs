use time::PrimitiveDateTime;

use crate::query::{
    format_date_time, BidAskFillerValue, ExtractionQuery, ExtractionRange, Filler, Granularity,
    MasFillerValue, QueryString, VersionSelection,
};
use crate::ValidationError;

/// Fields common to every extraction query.
///
/// `ids` and `filter_id` may both be set; the service decides precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBase {
    pub ids: Option<Vec<i32>>,
    pub filter_id: Option<i32>,
    pub range: ExtractionRange,
    pub time_zone: String,
}

impl QueryBase {
    pub fn for_ids(ids: impl Into<Vec<i32>>, range: ExtractionRange) -> Self {
        Self {
            ids: Some(ids.into()),
            filter_id: None,
            range,
            time_zone: String::from("UTC"),
        }
    }

    pub fn for_filter(filter_id: i32, range: ExtractionRange) -> Self {
        Self {
            ids: None,
            filter_id: Some(filter_id),
            range,
            time_zone: String::from("UTC"),
        }
    }

    pub fn with_filter_id(mut self, filter_id: i32) -> Self {
        self.filter_id = Some(filter_id);
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match (&self.ids, self.filter_id) {
            (Some(ids), _) if ids.is_empty() => return Err(ValidationError::EmptyIds),
            (None, None) => return Err(ValidationError::MissingSelection),
            _ => {}
        }
        if self.time_zone.trim().is_empty() {
            return Err(ValidationError::BlankTimeZone);
        }
        self.range.validate()
    }

    pub(crate) fn push_params(&self, params: &mut QueryString) {
        for id in self.ids.iter().flatten() {
            params.push("id", id.to_string());
        }
        params.push_opt("filterId", self.filter_id);
        params.push("tz", self.time_zone.clone());
    }
}

fn validate_products(products: &[String]) -> Result<(), ValidationError> {
    if products.is_empty() {
        return Err(ValidationError::EmptyProducts);
    }
    if let Some(index) = products.iter().position(|p| p.trim().is_empty()) {
        return Err(ValidationError::BlankProduct { index });
    }
    Ok(())
}

fn push_products(products: &[String], params: &mut QueryString) {
    for product in products {
        params.push("p", product.clone());
    }
}

/// Extraction of actual (non-versioned) time series.
#[derive(Debug, Clone, PartialEq)]
pub struct ActualQuery {
    pub base: QueryBase,
    pub granularity: Granularity,
    pub transform_id: Option<i32>,
    pub filler: Filler<f64>,
}

impl ActualQuery {
    pub fn new(base: QueryBase, granularity: Granularity) -> Self {
        Self {
            base,
            granularity,
            transform_id: None,
            filler: Filler::Default,
        }
    }

    pub fn with_transform(mut self, transform_id: i32) -> Self {
        self.transform_id = Some(transform_id);
        self
    }

    pub fn with_filler(mut self, filler: Filler<f64>) -> Self {
        self.filler = filler;
        self
    }
}

impl ExtractionQuery for ActualQuery {
    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut QueryBase {
        &mut self.base
    }

    fn path(&self) -> String {
        format!("/ts/{}/{}", self.granularity, self.base.range.path_segment())
    }

    fn push_params(&self, params: &mut QueryString) {
        params.push_opt("tr", self.transform_id);
        self.filler.push_params(params);
    }
}

/// Extraction of versioned time series under a version selection rule.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedQuery {
    pub base: QueryBase,
    pub granularity: Granularity,
    pub version: VersionSelection,
    pub transform_id: Option<i32>,
    pub filler: Filler<f64>,
}

impl VersionedQuery {
    pub fn new(base: QueryBase, granularity: Granularity, version: VersionSelection) -> Self {
        Self {
            base,
            granularity,
            version,
            transform_id: None,
            filler: Filler::Default,
        }
    }

    pub fn with_transform(mut self, transform_id: i32) -> Self {
        self.transform_id = Some(transform_id);
        self
    }

    pub fn with_filler(mut self, filler: Filler<f64>) -> Self {
        self.filler = filler;
        self
    }
}

impl ExtractionQuery for VersionedQuery {
    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut QueryBase {
        &mut self.base
    }

    fn path(&self) -> String {
        format!(
            "/vts/{}/{}/{}",
            self.version.path_segment(),
            self.granularity,
            self.base.range.path_segment()
        )
    }

    fn push_params(&self, params: &mut QueryString) {
        params.push_opt("versionLimit", self.version.version_limit().map(format_date_time));
        params.push_opt("tr", self.transform_id);
        self.filler.push_params(params);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        self.version.validate()
    }
}

/// Extraction of market assessments per product.
#[derive(Debug, Clone, PartialEq)]
pub struct MasQuery {
    pub base: QueryBase,
    pub products: Vec<String>,
    pub filler: Filler<MasFillerValue>,
}

impl MasQuery {
    pub fn new(base: QueryBase, products: Vec<String>) -> Result<Self, ValidationError> {
        validate_products(&products)?;
        Ok(Self {
            base,
            products,
            filler: Filler::Default,
        })
    }

    pub fn with_filler(mut self, filler: Filler<MasFillerValue>) -> Self {
        self.filler = filler;
        self
    }
}

impl ExtractionQuery for MasQuery {
    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut QueryBase {
        &mut self.base
    }

    fn path(&self) -> String {
        format!("/mas/{}", self.base.range.path_segment())
    }

    fn push_params(&self, params: &mut QueryString) {
        push_products(&self.products, params);
        self.filler.push_params(params);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        validate_products(&self.products)
    }
}

/// Extraction of auction curves. Auctions carry no filler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionQuery {
    pub base: QueryBase,
}

impl AuctionQuery {
    pub fn new(base: QueryBase) -> Self {
        Self { base }
    }
}

impl ExtractionQuery for AuctionQuery {
    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut QueryBase {
        &mut self.base
    }

    fn path(&self) -> String {
        format!("/auction/{}", self.base.range.path_segment())
    }

    fn push_params(&self, _params: &mut QueryString) {}
}

/// Extraction of bid/ask curves per product.
#[derive(Debug, Clone, PartialEq)]
pub struct BidAskQuery {
    pub base: QueryBase,
    pub products: Vec<String>,
    pub filler: Filler<BidAskFillerValue>,
}

impl BidAskQuery {
    pub fn new(base: QueryBase, products: Vec<String>) -> Result<Self, ValidationError> {
        validate_products(&products)?;
        Ok(Self {
            base,
            products,
            filler: Filler::Default,
        })
    }

    pub fn with_filler(mut self, filler: Filler<BidAskFillerValue>) -> Self {
        self.filler = filler;
        self
    }
}

impl ExtractionQuery for BidAskQuery {
    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut QueryBase {
        &mut self.base
    }

    fn path(&self) -> String {
        format!("/ba/{}", self.base.range.path_segment())
    }

    fn push_params(&self, params: &mut QueryString) {
        push_products(&self.products, params);
        self.filler.push_params(params);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        validate_products(&self.products)
    }
}

/// Extraction of curves derived server-side from other curves.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedQuery {
    pub base: QueryBase,
    pub granularity: Granularity,
    pub transform_id: Option<i32>,
    pub version_limit: Option<PrimitiveDateTime>,
    pub filler: Filler<f64>,
}

impl DerivedQuery {
    pub fn new(base: QueryBase, granularity: Granularity) -> Self {
        Self {
            base,
            granularity,
            transform_id: None,
            version_limit: None,
            filler: Filler::Default,
        }
    }

    pub fn with_transform(mut self, transform_id: i32) -> Self {
        self.transform_id = Some(transform_id);
        self
    }

    pub fn with_version_limit(mut self, version_limit: PrimitiveDateTime) -> Self {
        self.version_limit = Some(version_limit);
        self
    }

    pub fn with_filler(mut self, filler: Filler<f64>) -> Self {
        self.filler = filler;
        self
    }
}

impl ExtractionQuery for DerivedQuery {
    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut QueryBase {
        &mut self.base
    }

    fn path(&self) -> String {
        format!("/der/{}/{}", self.granularity, self.base.range.path_segment())
    }

    fn push_params(&self, params: &mut QueryString) {
        params.push_opt("versionLimit", self.version_limit.map(format_date_time));
        params.push_opt("tr", self.transform_id);
        self.filler.push_params(params);
    }
}
