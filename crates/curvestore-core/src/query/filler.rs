use crate::query::{Period, QueryString};

/// Default record shape a filler may substitute for a missing value.
pub trait FillerValue: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    fn push_params(&self, params: &mut QueryString);
}

impl FillerValue for f64 {
    fn push_params(&self, params: &mut QueryString) {
        params.push("fillerDV", self.to_string());
    }
}

/// Default market-assessment record used by the custom-value filler.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MasFillerValue {
    pub settlement: Option<f64>,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume_paid: Option<f64>,
    pub volume_given: Option<f64>,
    pub volume: Option<f64>,
}

impl FillerValue for MasFillerValue {
    fn push_params(&self, params: &mut QueryString) {
        params.push_opt("fillerDVs", self.settlement);
        params.push_opt("fillerDVo", self.open);
        params.push_opt("fillerDVc", self.close);
        params.push_opt("fillerDVh", self.high);
        params.push_opt("fillerDVl", self.low);
        params.push_opt("fillerDVvp", self.volume_paid);
        params.push_opt("fillerDVvg", self.volume_given);
        params.push_opt("fillerDVvt", self.volume);
    }
}

/// Default bid/ask record used by the custom-value filler.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BidAskFillerValue {
    pub best_bid_price: Option<f64>,
    pub best_ask_price: Option<f64>,
    pub best_bid_quantity: Option<f64>,
    pub best_ask_quantity: Option<f64>,
    pub last_price: Option<f64>,
    pub last_quantity: Option<f64>,
}

impl FillerValue for BidAskFillerValue {
    fn push_params(&self, params: &mut QueryString) {
        params.push_opt("fillerDVbbp", self.best_bid_price);
        params.push_opt("fillerDVbap", self.best_ask_price);
        params.push_opt("fillerDVbbq", self.best_bid_quantity);
        params.push_opt("fillerDVbaq", self.best_ask_quantity);
        params.push_opt("fillerDVlp", self.last_price);
        params.push_opt("fillerDVlq", self.last_quantity);
    }
}

/// How gaps in the extracted data are filled.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filler<V> {
    /// Let the service apply its default for the curve type.
    #[default]
    Default,
    Null,
    CustomValue(V),
    /// Carry the last valid value forward for at most `period`.
    LatestValidValue { period: Period },
    NoFill,
}

impl<V: FillerValue> Filler<V> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Null => "Null",
            Self::CustomValue(_) => "CustomValue",
            Self::LatestValidValue { .. } => "LatestValidValue",
            Self::NoFill => "NoFill",
        }
    }

    pub fn push_params(&self, params: &mut QueryString) {
        if matches!(self, Self::Default) {
            return;
        }

        params.push("fillerK", self.kind());
        match self {
            Self::CustomValue(value) => value.push_params(params),
            Self::LatestValidValue { period } => params.push("fillerP", period.to_string()),
            _ => {}
        }
    }
}
