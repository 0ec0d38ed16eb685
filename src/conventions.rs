// src/conventions.rs

//! Market convention names used to describe curve instruments.
//!
//! Every name is resolved into a closed enum when configuration is loaded;
//! unknown names fail with [`UnknownConventionError`]. Nothing here performs
//! date or rate arithmetic.

use crate::error::{SeriesError, UnknownConventionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

macro_rules! named_convention {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownConventionError;

            /// Case-insensitive match on the canonical name.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.name().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnknownConventionError::new($kind, s))
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownConventionError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.name().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_convention!(DayCounter, "day counter" {
    Actual360 => "Actual360",
    Actual365Fixed => "Actual365Fixed",
    ActualActual => "ActualActual",
    Actual365NoLeap => "Actual365NoLeap",
    Business252 => "Business252",
    OneDayCounter => "OneDayCounter",
    SimpleDayCounter => "SimpleDayCounter",
    Thirty360 => "Thirty360",
});

named_convention!(Calendar, "calendar" {
    Target => "TARGET",
    UnitedStates => "UnitedStates",
    UnitedKingdom => "UnitedKingdom",
    WeekendsOnly => "WeekendsOnly",
    NullCalendar => "NullCalendar",
});

named_convention!(BusinessDayConvention, "business day convention" {
    Following => "Following",
    ModifiedFollowing => "ModifiedFollowing",
    Preceding => "Preceding",
    ModifiedPreceding => "ModifiedPreceding",
    Unadjusted => "Unadjusted",
});

named_convention!(Frequency, "frequency" {
    NoFrequency => "NoFrequency",
    Once => "Once",
    Annual => "Annual",
    Semiannual => "Semiannual",
    Quarterly => "Quarterly",
    Monthly => "Monthly",
    Weekly => "Weekly",
    Daily => "Daily",
});

impl Frequency {
    /// Coupon periods per year; `None` for frequencies without a period.
    pub fn periods_per_year(&self) -> Option<u32> {
        match self {
            Frequency::NoFrequency | Frequency::Once => None,
            Frequency::Annual => Some(1),
            Frequency::Semiannual => Some(2),
            Frequency::Quarterly => Some(4),
            Frequency::Monthly => Some(12),
            Frequency::Weekly => Some(52),
            Frequency::Daily => Some(365),
        }
    }
}

named_convention!(DateGenerationRule, "date generation rule" {
    Backward => "Backward",
    Forward => "Forward",
});

named_convention!(SwapType, "swap type" {
    Payer => "Payer",
    Receiver => "Receiver",
});

named_convention!(
    /// How overnight fixings accrue over a futures reference period.
    Nesting, "nesting" {
    Averaging => "Averaging",
    Compounding => "Compounding",
});

named_convention!(
    /// Overnight indices with their own curve.
    OvernightIndex, "overnight index" {
    Sofr => "SOFR",
    Sonia => "SONIA",
    Eonia => "EONIA",
});

named_convention!(Interpolation, "interpolation" {
    BackwardFlat => "BackwardFlat",
    ForwardFlat => "ForwardFlat",
    Linear => "Linear",
    LogLinear => "LogLinear",
    Cubic => "Cubic",
    MonotonicCubic => "MonotonicCubic",
    MonotonicLogCubic => "MonotonicLogCubic",
    DefaultLogCubic => "DefaultLogCubic",
    SplineCubic => "SplineCubic",
    Kruger => "Kruger",
    KrugerLog => "KrugerLog",
    KrugerCubic => "KrugerCubic",
    FritschButlandCubic => "FritschButlandCubic",
    ConvexMonotone => "ConvexMonotone",
    CubicNaturalSpline => "CubicNaturalSpline",
    LogCubicNaturalSpline => "LogCubicNaturalSpline",
    MonotonicCubicNaturalSpline => "MonotonicCubicNaturalSpline",
    Parabolic => "Parabolic",
    LogParabolic => "LogParabolic",
    MonotonicParabolic => "MonotonicParabolic",
    MonotonicLogParabolic => "MonotonicLogParabolic",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TenorUnit {
    Days,
    Weeks,
    Months,
    Years,
}

/// A period such as `3M` or `10Y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tenor {
    pub length: u32,
    pub unit: TenorUnit,
}

impl Tenor {
    pub fn new(length: u32, unit: TenorUnit) -> Self {
        Tenor { length, unit }
    }
}

impl FromStr for Tenor {
    type Err = UnknownConventionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
        let (digits, unit) = raw.split_at(split);
        let length = digits.parse().map_err(|_| UnknownConventionError::new("tenor", s))?;
        let unit = match unit.to_ascii_uppercase().as_str() {
            "D" => TenorUnit::Days,
            "W" => TenorUnit::Weeks,
            "M" => TenorUnit::Months,
            "Y" => TenorUnit::Years,
            _ => return Err(UnknownConventionError::new("tenor", s)),
        };
        Ok(Tenor { length, unit })
    }
}

impl TryFrom<String> for Tenor {
    type Error = UnknownConventionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tenor> for String {
    fn from(value: Tenor) -> String {
        value.to_string()
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TenorUnit::Days => 'D',
            TenorUnit::Weeks => 'W',
            TenorUnit::Months => 'M',
            TenorUnit::Years => 'Y',
        };
        write!(f, "{}{}", self.length, unit)
    }
}

named_convention!(IborFamily, "ibor currency" {
    UsdLibor => "USD",
    Euribor => "EUR",
});

/// A term rate index written as `CCY.TENOR`, e.g. `USD.3M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IborIndex {
    pub family: IborFamily,
    pub tenor: Tenor,
}

impl FromStr for IborIndex {
    type Err = UnknownConventionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (currency, tenor) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| UnknownConventionError::new("ibor index", s))?;
        Ok(IborIndex {
            family: currency.parse()?,
            tenor: tenor.parse()?,
        })
    }
}

impl TryFrom<String> for IborIndex {
    type Error = UnknownConventionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IborIndex> for String {
    fn from(value: IborIndex) -> String {
        value.to_string()
    }
}

impl fmt::Display for IborIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.family, self.tenor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveConfiguration {
    #[serde(rename = "DAYCOUNTER", alias = "day_counter")]
    pub day_counter: DayCounter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositConvention {
    #[serde(rename = "FIXINGDAYS", alias = "fixing_days")]
    pub fixing_days: u32,
    #[serde(rename = "CALENDAR", alias = "calendar")]
    pub calendar: Calendar,
    #[serde(rename = "BUSINESSDAYCONVENTION", alias = "business_day_convention")]
    pub business_day_convention: BusinessDayConvention,
    #[serde(rename = "ENDOFMONTH", alias = "end_of_month")]
    pub end_of_month: bool,
    #[serde(rename = "DAYCOUNTER", alias = "day_counter")]
    pub day_counter: DayCounter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OisConvention {
    #[serde(rename = "SETTLEMENTDAYS", alias = "settlement_days")]
    pub settlement_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureConvention {
    #[serde(rename = "LENGTHINMONTHS", alias = "length_in_months")]
    pub length_in_months: u32,
    #[serde(rename = "CALENDAR", alias = "calendar")]
    pub calendar: Calendar,
    #[serde(rename = "BUSINESSDAYCONVENTION", alias = "business_day_convention")]
    pub business_day_convention: BusinessDayConvention,
    #[serde(rename = "ENDOFMONTH", alias = "end_of_month")]
    pub end_of_month: bool,
    #[serde(rename = "DAYCOUNTER", alias = "day_counter")]
    pub day_counter: DayCounter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapConvention {
    #[serde(rename = "FIXEDCALENDAR", alias = "fixed_calendar")]
    pub fixed_calendar: Calendar,
    #[serde(rename = "FIXEDFREQUENCY", alias = "fixed_frequency")]
    pub fixed_frequency: Frequency,
    #[serde(rename = "FIXEDCONVENTION", alias = "fixed_convention")]
    pub fixed_convention: BusinessDayConvention,
    #[serde(rename = "FIXEDDAYCOUNTER", alias = "fixed_day_counter")]
    pub fixed_day_counter: DayCounter,
    #[serde(rename = "FLOATINDEX", alias = "float_index")]
    pub float_index: IborIndex,
}

/// Instrument conventions for one curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveConventions {
    #[serde(rename = "CONFIGURATIONS", alias = "configurations")]
    pub configurations: CurveConfiguration,
    #[serde(rename = "DEPOSIT", alias = "deposit", default)]
    pub deposit: Option<DepositConvention>,
    #[serde(rename = "OIS", alias = "ois", default)]
    pub ois: Option<OisConvention>,
    #[serde(rename = "FUTURE", alias = "future", default)]
    pub future: Option<FutureConvention>,
    #[serde(rename = "SWAP", alias = "swap", default)]
    pub swap: Option<SwapConvention>,
}

/// Conventions for every configured curve, keyed by curve name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConventionSet {
    curves: BTreeMap<String, CurveConventions>,
}

impl ConventionSet {
    /// Parses and resolves every convention name up front.
    pub fn from_json(json: &str) -> Result<Self, SeriesError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, curve: &str) -> Option<&CurveConventions> {
        self.curves.get(curve)
    }

    pub fn insert(&mut self, curve: impl Into<String>, conventions: CurveConventions) {
        self.curves.insert(curve.into(), conventions);
    }

    pub fn curves(&self) -> impl Iterator<Item = &str> {
        self.curves.keys().map(String::as_str)
    }
}
