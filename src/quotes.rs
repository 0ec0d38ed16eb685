// src/quotes.rs

//! Curve market data: tickers of the form `CURVE.INSTRUMENT.ARGS` with a
//! quoted value, checked against the curve's conventions.

use crate::conventions::{ConventionSet, CurveConventions, Frequency, Nesting, OvernightIndex, Tenor};
use crate::error::{Result, SeriesError, UnknownConventionError};
use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;

pub const TICKER_COLUMN: &str = "Ticker";
pub const VALUE_COLUMN: &str = "Value";

/// Convention block an instrument needs from [`CurveConventions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConventionBlock {
    Deposit,
    Ois,
    Future,
    Swap,
}

impl ConventionBlock {
    fn is_configured(&self, conventions: &CurveConventions) -> bool {
        match self {
            ConventionBlock::Deposit => conventions.deposit.is_some(),
            ConventionBlock::Ois => conventions.ois.is_some(),
            ConventionBlock::Future => conventions.future.is_some(),
            ConventionBlock::Swap => conventions.swap.is_some(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ConventionBlock::Deposit => "DEPOSIT",
            ConventionBlock::Ois => "OIS",
            ConventionBlock::Future => "FUTURE",
            ConventionBlock::Swap => "SWAP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    /// `CURVE.FIXINGD.2018-10-17`: index fixing on a calendar date.
    FixingOnDate { date: NaiveDate },
    /// `CURVE.FIXING.1D`: index fixing a tenor after evaluation.
    Fixing { tenor: Tenor },
    /// `CURVE.DEPOSIT.3M`
    Deposit { tenor: Tenor },
    /// `CURVE.OIS.1Y`
    Ois { tenor: Tenor },
    /// `CURVE.FUTURE.10M`: the tenor is the start offset.
    Future { start: Tenor },
    /// `CURVE.SWAP.2Y`
    Swap { tenor: Tenor },
    /// `CURVE.SOFRFUTURE.03.2019.Quarterly.Compounding`
    OvernightFuture {
        month: u32,
        year: i32,
        frequency: Frequency,
        nesting: Nesting,
    },
}

impl Instrument {
    pub fn kind(&self) -> &'static str {
        match self {
            Instrument::FixingOnDate { .. } => "FIXINGD",
            Instrument::Fixing { .. } => "FIXING",
            Instrument::Deposit { .. } => "DEPOSIT",
            Instrument::Ois { .. } => "OIS",
            Instrument::Future { .. } => "FUTURE",
            Instrument::Swap { .. } => "SWAP",
            Instrument::OvernightFuture { .. } => "SOFRFUTURE",
        }
    }

    pub fn is_fixing(&self) -> bool {
        matches!(self, Instrument::FixingOnDate { .. } | Instrument::Fixing { .. })
    }

    pub fn is_price_quoted(&self) -> bool {
        matches!(self, Instrument::Future { .. } | Instrument::OvernightFuture { .. })
    }

    /// Fixings, OIS and overnight futures only exist for an overnight index curve.
    pub fn needs_overnight_index(&self) -> bool {
        matches!(
            self,
            Instrument::FixingOnDate { .. }
                | Instrument::Fixing { .. }
                | Instrument::Ois { .. }
                | Instrument::OvernightFuture { .. }
        )
    }

    pub fn required_convention(&self) -> Option<ConventionBlock> {
        match self {
            Instrument::Deposit { .. } => Some(ConventionBlock::Deposit),
            Instrument::Ois { .. } => Some(ConventionBlock::Ois),
            Instrument::Future { .. } => Some(ConventionBlock::Future),
            Instrument::Swap { .. } => Some(ConventionBlock::Swap),
            _ => None,
        }
    }
}

fn malformed(ticker: &str, reason: &str) -> SeriesError {
    SeriesError::validation(format!("malformed quote ticker '{}': {}", ticker, reason))
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuote {
    pub ticker: String,
    pub curve: String,
    pub instrument: Instrument,
    pub value: f64,
}

impl MarketQuote {
    pub fn parse(ticker: &str, value: f64) -> Result<Self> {
        let ticker = ticker.trim();
        let parts: Vec<&str> = ticker.split('.').collect();
        if parts.len() < 3 {
            return Err(malformed(ticker, "expected CURVE.INSTRUMENT.ARGS"));
        }
        let args = &parts[2..];
        // every instrument but SOFRFUTURE takes exactly one argument
        let single = || match args {
            [arg] => Ok(*arg),
            _ => Err(malformed(ticker, "expected a single argument")),
        };
        let tenor = || -> Result<Tenor> { Ok(single()?.parse::<Tenor>()?) };

        let instrument = match parts[1].to_ascii_uppercase().as_str() {
            "FIXINGD" => Instrument::FixingOnDate {
                date: NaiveDate::parse_from_str(single()?, "%Y-%m-%d")
                    .map_err(|_| malformed(ticker, "fixing date must be YYYY-MM-DD"))?,
            },
            "FIXING" => Instrument::Fixing { tenor: tenor()? },
            "DEPOSIT" => Instrument::Deposit { tenor: tenor()? },
            "OIS" => Instrument::Ois { tenor: tenor()? },
            "FUTURE" => Instrument::Future { start: tenor()? },
            "SWAP" => Instrument::Swap { tenor: tenor()? },
            "SOFRFUTURE" => {
                if args.len() != 4 {
                    return Err(malformed(ticker, "expected MONTH.YEAR.FREQUENCY.NESTING"));
                }
                let month: u32 = args[0]
                    .parse()
                    .ok()
                    .filter(|m| (1..=12).contains(m))
                    .ok_or_else(|| malformed(ticker, "month must be 1-12"))?;
                let year: i32 = args[1].parse().map_err(|_| malformed(ticker, "year is not a number"))?;
                let frequency: Frequency = args[2].parse()?;
                if !matches!(frequency, Frequency::Monthly | Frequency::Quarterly) {
                    return Err(UnknownConventionError::new("futures frequency", args[2]).into());
                }
                Instrument::OvernightFuture {
                    month,
                    year,
                    frequency,
                    nesting: args[3].parse()?,
                }
            }
            other => return Err(UnknownConventionError::new("instrument", other).into()),
        };

        Ok(MarketQuote {
            ticker: ticker.to_string(),
            curve: parts[0].to_string(),
            instrument,
            value,
        })
    }
}

/// A quote paired with the rate it implies.
///
/// Futures are quoted as `100 - rate`; their rate is recovered and rounded
/// to ten decimals. Every other quote is already a rate.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotedInstrument {
    pub quote: MarketQuote,
    pub rate: f64,
}

impl QuotedInstrument {
    pub fn new(quote: MarketQuote) -> Self {
        let rate = if quote.instrument.is_price_quoted() {
            ((100.0 - quote.value) * 1e10).round() / 1e10
        } else {
            quote.value
        };
        QuotedInstrument { quote, rate }
    }
}

/// Everything needed to hand one curve to a bootstrapping library.
#[derive(Debug, Clone)]
pub struct CurveInputs {
    pub curve: String,
    pub index: Option<OvernightIndex>,
    pub conventions: CurveConventions,
    pub instruments: Vec<QuotedInstrument>,
}

impl CurveInputs {
    /// Selects `curve`'s rows from a `Ticker`/`Value` table, parses them and
    /// checks each has the convention block it needs. Fixings, OIS and
    /// overnight futures are rejected unless the curve is an overnight index.
    pub fn assemble(curve: &str, market: &DataFrame, conventions: &ConventionSet) -> Result<Self> {
        let index: Option<OvernightIndex> = curve.parse().ok();
        let curve_conventions = conventions
            .get(curve)
            .ok_or_else(|| SeriesError::validation(format!("no conventions configured for curve '{}'", curve)))?
            .clone();

        let tickers = market.column(TICKER_COLUMN)?.str()?;
        let values = market.column(VALUE_COLUMN)?.cast(&DataType::Float64)?;
        let values = values.f64()?;
        let prefix = format!("{}.", curve);

        let mut instruments = Vec::new();
        for (ticker, value) in tickers.into_iter().zip(values.into_iter()) {
            let ticker = match ticker.map(str::trim) {
                Some(ticker) if ticker.starts_with(&prefix) => ticker,
                _ => continue,
            };
            let value = value.ok_or_else(|| SeriesError::validation(format!("quote '{}' has no value", ticker)))?;
            let quote = MarketQuote::parse(ticker, value)?;

            if index.is_none() && quote.instrument.needs_overnight_index() {
                return Err(SeriesError::validation(format!(
                    "quote '{}' needs an overnight index but curve '{}' has none",
                    ticker, curve
                )));
            }
            if let Some(block) = quote.instrument.required_convention() {
                if !block.is_configured(&curve_conventions) {
                    return Err(SeriesError::validation(format!(
                        "quote '{}' needs a {} convention for curve '{}'",
                        ticker,
                        block.label(),
                        curve
                    )));
                }
            }
            instruments.push(QuotedInstrument::new(quote));
        }

        debug!(curve, instruments = instruments.len(), "assembled curve inputs");
        Ok(CurveInputs {
            curve: curve.to_string(),
            index,
            conventions: curve_conventions,
            instruments,
        })
    }

    pub fn fixings(&self) -> impl Iterator<Item = &QuotedInstrument> {
        self.instruments.iter().filter(|i| i.quote.instrument.is_fixing())
    }

    /// Instruments that calibrate the curve, i.e. everything but fixings.
    pub fn helpers(&self) -> impl Iterator<Item = &QuotedInstrument> {
        self.instruments.iter().filter(|i| !i.quote.instrument.is_fixing())
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        let tickers: Vec<&str> = self.instruments.iter().map(|i| i.quote.ticker.as_str()).collect();
        let kinds: Vec<&str> = self.instruments.iter().map(|i| i.quote.instrument.kind()).collect();
        let quotes: Vec<f64> = self.instruments.iter().map(|i| i.quote.value).collect();
        let rates: Vec<f64> = self.instruments.iter().map(|i| i.rate).collect();
        Ok(DataFrame::new(vec![
            Series::new(TICKER_COLUMN, tickers),
            Series::new("Instrument", kinds),
            Series::new("Quote", quotes),
            Series::new("Rate", rates),
        ])?)
    }
}
