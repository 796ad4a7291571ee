//! American Community Survey variable catalogue.
//!
//! Estimate variables end in `E`; the matching margin-of-error variable
//! replaces that suffix with `M` (see [`moe_variable`]).

/// Total population.
pub const TOTAL_POPULATION: &str = "B01003_001E";
/// Median age.
pub const MEDIAN_AGE: &str = "B01002_001E";
/// Median household income.
pub const MEDIAN_HOUSEHOLD_INCOME: &str = "B19013_001E";
/// Average household size.
pub const AVG_HOUSEHOLD_SIZE: &str = "B25010_001E";

/// Total male / female.
pub const TOTAL_MALE: &str = "B01001_002E";
/// Total female.
pub const TOTAL_FEMALE: &str = "B01001_026E";

/// Education: population 25 and over.
pub const EDU_TOTAL_25_OVER: &str = "B15003_001E";
/// Education: bachelor's, master's, professional, doctorate.
pub const EDU_BACHELORS_OR_HIGHER: &[&str] =
    &["B15003_022E", "B15003_023E", "B15003_024E", "B15003_025E"];

/// Households: total.
pub const TOTAL_HOUSEHOLDS: &str = "B11001_001E";
/// Households: family.
pub const FAMILY_HOUSEHOLDS: &str = "B11001_002E";
/// Households: married-couple family.
pub const MARRIED_COUPLE_FAMILY: &str = "B11001_003E";
/// Households: non-family.
pub const NONFAMILY_HOUSEHOLDS: &str = "B11001_007E";

/// Race/ethnicity: total.
pub const RACE_TOTAL: &str = "B03002_001E";
/// White alone, not Hispanic.
pub const RACE_WHITE_NON_HISPANIC: &str = "B03002_003E";
/// Black alone, not Hispanic.
pub const RACE_BLACK_NON_HISPANIC: &str = "B03002_004E";
/// Asian alone, not Hispanic.
pub const RACE_ASIAN_NON_HISPANIC: &str = "B03002_006E";
/// Hispanic or Latino.
pub const RACE_HISPANIC: &str = "B03002_012E";
/// Native, Pacific Islander, other, and two-or-more races (not Hispanic).
pub const RACE_OTHER_NON_HISPANIC: &[&str] =
    &["B03002_005E", "B03002_007E", "B03002_008E", "B03002_009E"];

/// Labor force: population 16 and over.
pub const LABOR_FORCE_TOTAL_16_OVER: &str = "B23025_001E";
/// Labor force: in labor force.
pub const IN_LABOR_FORCE: &str = "B23025_002E";

/// Tenure: occupied units.
pub const TOTAL_OCCUPIED_UNITS: &str = "B25003_001E";
/// Tenure: owner occupied.
pub const OWNER_OCCUPIED_UNITS: &str = "B25003_002E";
/// Tenure: renter occupied.
pub const RENTER_OCCUPIED_UNITS: &str = "B25003_003E";
/// Occupancy: all housing units.
pub const TOTAL_HOUSING_UNITS: &str = "B25002_001E";
/// Occupancy: vacant.
pub const VACANT_UNITS: &str = "B25002_003E";
/// Vacancy status: for rent.
pub const VACANT_FOR_RENT: &str = "B25004_002E";
/// Vacancy status: for sale only.
pub const VACANT_FOR_SALE: &str = "B25004_004E";
/// Median home value.
pub const MEDIAN_HOME_VALUE: &str = "B25077_001E";
/// Median gross rent.
pub const MEDIAN_GROSS_RENT: &str = "B25064_001E";
/// Median year structure built.
pub const MEDIAN_YEAR_BUILT: &str = "B25035_001E";

/// Male and female cells under 18.
pub const AGE_UNDER_18: &[&str] = &[
    "B01001_003E",
    "B01001_004E",
    "B01001_005E",
    "B01001_006E",
    "B01001_027E",
    "B01001_028E",
    "B01001_029E",
    "B01001_030E",
];

/// Male and female cells 18 to 34.
pub const AGE_18_TO_34: &[&str] = &[
    "B01001_007E",
    "B01001_008E",
    "B01001_009E",
    "B01001_010E",
    "B01001_011E",
    "B01001_012E",
    "B01001_031E",
    "B01001_032E",
    "B01001_033E",
    "B01001_034E",
    "B01001_035E",
    "B01001_036E",
];

/// Male and female cells 35 to 64.
pub const AGE_35_TO_64: &[&str] = &[
    "B01001_013E",
    "B01001_014E",
    "B01001_015E",
    "B01001_016E",
    "B01001_017E",
    "B01001_018E",
    "B01001_019E",
    "B01001_037E",
    "B01001_038E",
    "B01001_039E",
    "B01001_040E",
    "B01001_041E",
    "B01001_042E",
    "B01001_043E",
];

/// Male and female cells 65 and over.
pub const AGE_65_AND_OVER: &[&str] = &[
    "B01001_020E",
    "B01001_021E",
    "B01001_022E",
    "B01001_023E",
    "B01001_024E",
    "B01001_025E",
    "B01001_044E",
    "B01001_045E",
    "B01001_046E",
    "B01001_047E",
    "B01001_048E",
    "B01001_049E",
];

/// Poverty rate (subject table S1701).
pub const POVERTY_RATE: &str = "S1701_C03_001E";
/// Mean travel time to work (profile table DP03).
pub const MEAN_COMMUTE_TIME: &str = "DP03_0025E";

/// Variables requested from the detailed tables (`acs/acs5`).
#[must_use]
pub fn detailed_variables() -> Vec<&'static str> {
    let mut vars = vec![
        TOTAL_POPULATION,
        MEDIAN_AGE,
        MEDIAN_HOUSEHOLD_INCOME,
        AVG_HOUSEHOLD_SIZE,
        TOTAL_MALE,
        TOTAL_FEMALE,
        EDU_TOTAL_25_OVER,
        TOTAL_HOUSEHOLDS,
        FAMILY_HOUSEHOLDS,
        MARRIED_COUPLE_FAMILY,
        NONFAMILY_HOUSEHOLDS,
        RACE_TOTAL,
        RACE_WHITE_NON_HISPANIC,
        RACE_BLACK_NON_HISPANIC,
        RACE_ASIAN_NON_HISPANIC,
        RACE_HISPANIC,
        LABOR_FORCE_TOTAL_16_OVER,
        IN_LABOR_FORCE,
        TOTAL_OCCUPIED_UNITS,
        OWNER_OCCUPIED_UNITS,
        RENTER_OCCUPIED_UNITS,
        TOTAL_HOUSING_UNITS,
        VACANT_UNITS,
        VACANT_FOR_RENT,
        VACANT_FOR_SALE,
        MEDIAN_HOME_VALUE,
        MEDIAN_GROSS_RENT,
        MEDIAN_YEAR_BUILT,
    ];
    for group in [
        EDU_BACHELORS_OR_HIGHER,
        RACE_OTHER_NON_HISPANIC,
        AGE_UNDER_18,
        AGE_18_TO_34,
        AGE_35_TO_64,
        AGE_65_AND_OVER,
    ] {
        vars.extend_from_slice(group);
    }
    vars
}

/// Variables requested from the subject tables (`acs/acs5/subject`).
pub const SUBJECT_VARIABLES: &[&str] = &[POVERTY_RATE];

/// Variables requested from the data profiles (`acs/acs5/profile`).
pub const PROFILE_VARIABLES: &[&str] = &[MEAN_COMMUTE_TIME];

/// Returns the margin-of-error variable for an estimate variable.
///
/// `None` if `estimate` does not end in `E`.
#[must_use]
pub fn moe_variable(estimate: &str) -> Option<String> {
    estimate
        .strip_suffix('E')
        .map(|stem| format!("{stem}M"))
}

/// Interleaves each estimate variable with its MOE variable.
#[must_use]
pub fn with_moe(estimates: &[&str]) -> Vec<String> {
    let mut vars = Vec::with_capacity(estimates.len() * 2);
    for estimate in estimates {
        vars.push((*estimate).to_string());
        if let Some(moe) = moe_variable(estimate) {
            vars.push(moe);
        }
    }
    vars
}
