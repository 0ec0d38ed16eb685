// tests/conventions_tests.rs

use marketseries::conventions::{
    BusinessDayConvention, Calendar, ConventionSet, DayCounter, Frequency, IborFamily, IborIndex, Interpolation,
    Nesting, Tenor, TenorUnit,
};
use marketseries::{SeriesError, UnknownConventionError};

const CONVENTIONS: &str = r#"{
    "SOFR": {
        "CONFIGURATIONS": {"DAYCOUNTER": "Actual365Fixed"},
        "DEPOSIT": {
            "FIXINGDAYS": 0,
            "CALENDAR": "TARGET",
            "BUSINESSDAYCONVENTION": "MODIFIEDFOLLOWING",
            "ENDOFMONTH": true,
            "DAYCOUNTER": "ACTUAL360"
        },
        "OIS": {"SETTLEMENTDAYS": 2}
    },
    "USD": {
        "CONFIGURATIONS": {"DAYCOUNTER": "Actual360"},
        "SWAP": {
            "FIXEDCALENDAR": "UnitedStates",
            "FIXEDFREQUENCY": "Semiannual",
            "FIXEDCONVENTION": "Unadjusted",
            "FIXEDDAYCOUNTER": "Thirty360",
            "FLOATINDEX": "USD.3M"
        }
    }
}"#;

#[test]
fn test_names_are_case_insensitive() {
    assert_eq!("modifiedfollowing".parse::<BusinessDayConvention>().unwrap(), BusinessDayConvention::ModifiedFollowing);
    assert_eq!("target".parse::<Calendar>().unwrap(), Calendar::Target);
    assert_eq!(" Actual360 ".parse::<DayCounter>().unwrap(), DayCounter::Actual360);
    assert_eq!(Calendar::Target.to_string(), "TARGET");
}

#[test]
fn test_unknown_name_fails_with_kind() {
    let err = "Actual999".parse::<DayCounter>().unwrap_err();
    assert_eq!(err, UnknownConventionError::new("day counter", "Actual999"));
    assert!(err.to_string().contains("day counter"));
    assert!("Biweekly".parse::<Frequency>().is_err());
}

#[test]
fn test_every_variant_round_trips_through_its_name() {
    for interpolation in Interpolation::ALL {
        assert_eq!(interpolation.name().parse::<Interpolation>().unwrap(), *interpolation);
    }
    assert_eq!(Interpolation::ALL.len(), 21);
    assert_eq!(Frequency::Quarterly.periods_per_year(), Some(4));
    assert_eq!(Frequency::Once.periods_per_year(), None);
}

#[test]
fn test_tenor_and_ibor_index() {
    let tenor: Tenor = "10y".parse().unwrap();
    assert_eq!(tenor, Tenor::new(10, TenorUnit::Years));
    assert_eq!(tenor.to_string(), "10Y");
    assert!("M3".parse::<Tenor>().is_err());

    let index: IborIndex = "EUR.6M".parse().unwrap();
    assert_eq!(index.family, IborFamily::Euribor);
    assert_eq!(index.tenor, Tenor::new(6, TenorUnit::Months));
    assert_eq!(index.to_string(), "EUR.6M");
    assert!("GBP.3M".parse::<IborIndex>().is_err());
}

#[test]
fn test_convention_set_from_json() {
    let set = ConventionSet::from_json(CONVENTIONS).unwrap();
    assert_eq!(set.curves().collect::<Vec<_>>(), vec!["SOFR", "USD"]);

    let sofr = set.get("SOFR").unwrap();
    assert_eq!(sofr.configurations.day_counter, DayCounter::Actual365Fixed);
    let deposit = sofr.deposit.as_ref().unwrap();
    assert_eq!(deposit.business_day_convention, BusinessDayConvention::ModifiedFollowing);
    assert_eq!(deposit.day_counter, DayCounter::Actual360);
    assert_eq!(sofr.ois.as_ref().unwrap().settlement_days, 2);
    assert!(sofr.swap.is_none());

    let swap = set.get("USD").unwrap().swap.as_ref().unwrap();
    assert_eq!(swap.fixed_frequency, Frequency::Semiannual);
    assert_eq!(swap.float_index.family, IborFamily::UsdLibor);
}

#[test]
fn test_unknown_name_fails_at_load_time() {
    let json = CONVENTIONS.replace("ACTUAL360", "ACTUAL361");
    assert!(matches!(ConventionSet::from_json(&json), Err(SeriesError::Json(_))));
}

#[test]
fn test_nesting_serializes_to_name() {
    assert_eq!(serde_json::to_string(&Nesting::Compounding).unwrap(), "\"Compounding\"");
    let parsed: Nesting = serde_json::from_str("\"averaging\"").unwrap();
    assert_eq!(parsed, Nesting::Averaging);
}
