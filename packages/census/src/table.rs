//! Census data API table parsing.
//!
//! Responses are a JSON array of arrays: a header row followed by data
//! rows, with every value encoded as a string:
//!
//! ```text
//! [["NAME","B01003_001E","state","county","tract"],
//!  ["Census Tract 62.02; District of Columbia","4312","11","001","006202"]]
//! ```

use realmarket_market_models::sources::CensusRecord;
use serde_json::Value;

use crate::CensusError;

/// Geography columns echoed back by the API. Not data.
const GEOGRAPHY_COLUMNS: &[&str] = &["state", "county", "tract"];

/// Parses one raw Census value.
///
/// Negative numbers are the API's sentinels for suppressed or missing
/// estimates (e.g. `-666666666`) and become `None`, as does anything that
/// does not parse as a finite number.
#[must_use]
pub fn parse_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }?;
    (number.is_finite() && number >= 0.0).then_some(number)
}

/// Parses the first data row of a table into a record.
///
/// An empty body, or a table without a data row, is an empty record.
///
/// # Errors
///
/// Returns [`CensusError::Parse`] if the body is not a JSON table.
pub fn parse_table(body: &str) -> Result<CensusRecord, CensusError> {
    if body.trim().is_empty() {
        return Ok(CensusRecord::default());
    }

    let rows: Vec<Vec<Value>> = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        CensusError::Parse {
            message: format!("Census table: {e} (body: {preview})"),
        }
    })?;

    let (Some(header), Some(row)) = (rows.first(), rows.get(1)) else {
        return Ok(CensusRecord::default());
    };

    let mut record = CensusRecord::default();
    for (column, value) in header.iter().zip(row) {
        let Some(column) = column.as_str() else {
            continue;
        };
        if column == "NAME" {
            record.name = value.as_str().map(str::to_string);
        } else if !GEOGRAPHY_COLUMNS.contains(&column) {
            record.values.insert(column.to_string(), parse_value(value));
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn negative_values_are_missing() {
        assert_eq!(parse_value(&json!("-666666666")), None);
        assert_eq!(parse_value(&json!(-1)), None);
    }

    #[test]
    fn parses_strings_and_numbers() {
        assert_eq!(parse_value(&json!("4312")), Some(4312.0));
        assert_eq!(parse_value(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(parse_value(&json!(0)), Some(0.0));
        assert_eq!(parse_value(&json!("N/A")), None);
        assert_eq!(parse_value(&json!(null)), None);
    }

    #[test]
    fn keeps_name_and_drops_geography_columns() {
        let body = r#"[["NAME","B01003_001E","B01003_001M","state","county","tract"],
                      ["Census Tract 62.02","4312","-555555555","11","001","006202"]]"#;
        let record = parse_table(body).unwrap();
        assert_eq!(record.name.as_deref(), Some("Census Tract 62.02"));
        assert_eq!(record.get("B01003_001E"), Some(4312.0));
        assert_eq!(record.values.get("B01003_001M"), Some(&None));
        assert!(!record.values.contains_key("tract"));
    }

    #[test]
    fn header_only_or_empty_body_is_empty() {
        assert!(parse_table(r#"[["NAME","B01003_001E"]]"#).unwrap().is_empty());
        assert!(parse_table("").unwrap().is_empty());
        assert!(parse_table("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_non_table_body() {
        assert!(matches!(
            parse_table("<html>error</html>"),
            Err(CensusError::Parse { .. })
        ));
    }
}
