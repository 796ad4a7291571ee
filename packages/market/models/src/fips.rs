//! US state FIPS code utilities.
//!
//! Only the 50 states and DC are recognized; territories are outside the
//! geography the pipeline serves.

/// Width of a state FIPS code.
pub const STATE_WIDTH: usize = 2;
/// Width of a county FIPS code.
pub const COUNTY_WIDTH: usize = 3;
/// Width of a tract code.
pub const TRACT_WIDTH: usize = 6;

/// `(fips, abbreviation, name)` for the 50 states + DC, ordered by FIPS.
const STATES: &[(&str, &str, &str)] = &[
    ("01", "AL", "Alabama"),
    ("02", "AK", "Alaska"),
    ("04", "AZ", "Arizona"),
    ("05", "AR", "Arkansas"),
    ("06", "CA", "California"),
    ("08", "CO", "Colorado"),
    ("09", "CT", "Connecticut"),
    ("10", "DE", "Delaware"),
    ("11", "DC", "District of Columbia"),
    ("12", "FL", "Florida"),
    ("13", "GA", "Georgia"),
    ("15", "HI", "Hawaii"),
    ("16", "ID", "Idaho"),
    ("17", "IL", "Illinois"),
    ("18", "IN", "Indiana"),
    ("19", "IA", "Iowa"),
    ("20", "KS", "Kansas"),
    ("21", "KY", "Kentucky"),
    ("22", "LA", "Louisiana"),
    ("23", "ME", "Maine"),
    ("24", "MD", "Maryland"),
    ("25", "MA", "Massachusetts"),
    ("26", "MI", "Michigan"),
    ("27", "MN", "Minnesota"),
    ("28", "MS", "Mississippi"),
    ("29", "MO", "Missouri"),
    ("30", "MT", "Montana"),
    ("31", "NE", "Nebraska"),
    ("32", "NV", "Nevada"),
    ("33", "NH", "New Hampshire"),
    ("34", "NJ", "New Jersey"),
    ("35", "NM", "New Mexico"),
    ("36", "NY", "New York"),
    ("37", "NC", "North Carolina"),
    ("38", "ND", "North Dakota"),
    ("39", "OH", "Ohio"),
    ("40", "OK", "Oklahoma"),
    ("41", "OR", "Oregon"),
    ("42", "PA", "Pennsylvania"),
    ("44", "RI", "Rhode Island"),
    ("45", "SC", "South Carolina"),
    ("46", "SD", "South Dakota"),
    ("47", "TN", "Tennessee"),
    ("48", "TX", "Texas"),
    ("49", "UT", "Utah"),
    ("50", "VT", "Vermont"),
    ("51", "VA", "Virginia"),
    ("53", "WA", "Washington"),
    ("54", "WV", "West Virginia"),
    ("55", "WI", "Wisconsin"),
    ("56", "WY", "Wyoming"),
];

/// Errors from FIPS code validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FipsError {
    /// A code has the wrong number of digits or contains non-digits.
    #[error("{field} FIPS code {value:?} must be {width} digits")]
    Width {
        /// Which part of the hierarchy.
        field: &'static str,
        /// Expected width.
        width: usize,
        /// The rejected value.
        value: String,
    },

    /// The state code is not one of the 50 states or DC.
    #[error("Unknown state FIPS code {value:?}")]
    UnknownState {
        /// The rejected value.
        value: String,
    },

    /// A tract GEOID is not 11 digits.
    #[error("Tract GEOID {value:?} must be 11 digits")]
    Geoid {
        /// The rejected value.
        value: String,
    },
}

fn lookup(fips: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    STATES
        .binary_search_by(|(code, _, _)| (*code).cmp(fips))
        .ok()
        .map(|idx| &STATES[idx])
}

/// Returns `true` if `fips` is a state or DC code.
#[must_use]
pub fn is_state_fips(fips: &str) -> bool {
    lookup(fips).is_some()
}

/// Maps a two-digit FIPS code to the state abbreviation.
#[must_use]
pub fn state_abbr(fips: &str) -> Option<&'static str> {
    lookup(fips).map(|(_, abbr, _)| *abbr)
}

/// Maps a two-digit FIPS code to the full state name.
#[must_use]
pub fn state_name(fips: &str) -> Option<&'static str> {
    lookup(fips).map(|(_, _, name)| *name)
}

/// Checks that `value` is exactly `width` ASCII digits.
///
/// # Errors
///
/// Returns [`FipsError::Width`] otherwise.
pub fn check_code(field: &'static str, value: &str, width: usize) -> Result<(), FipsError> {
    if value.len() == width && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(FipsError::Width {
            field,
            width,
            value: value.to_string(),
        })
    }
}
