use csv::StringRecord;
use time::Date;

use crate::record::{Record, Value, DATE_FORMAT};
use crate::{Error, Result};

/// Cells of `record` in `columns` order. Every column must be present.
pub fn encode_row(record: &Record, columns: &[String]) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|name| {
            record
                .get(name)
                .map(Value::to_string)
                .ok_or_else(|| Error::SchemaMismatch(format!("record missing column {name}")))
        })
        .collect()
}

/// Type a cell by trying int, then float, then date.
pub fn parse_cell(cell: &str) -> Result<Value> {
    if let Ok(v) = cell.parse::<i64>() {
        return Ok(Value::Int(v));
    }
    if let Ok(v) = cell.parse::<f64>() {
        return Ok(Value::Float(v));
    }
    if let Ok(v) = Date::parse(cell, DATE_FORMAT) {
        return Ok(Value::Date(v));
    }
    Err(Error::Parse(format!("unrecognised cell value: {cell:?}")))
}

pub fn decode_row(headers: &StringRecord, row: &StringRecord) -> Result<Record> {
    if headers.len() != row.len() {
        return Err(Error::Parse(format!(
            "row has {} cells, header has {}",
            row.len(),
            headers.len()
        )));
    }
    let mut record = Record::new();
    for (name, cell) in headers.iter().zip(row.iter()) {
        record.set(name, parse_cell(cell)?);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn cells_keep_their_type() {
        assert_eq!(parse_cell("1000").expect("int"), Value::Int(1000));
        assert_eq!(parse_cell("950.0").expect("float"), Value::Float(950.0));
        assert_eq!(parse_cell("3.8413221829e-5").expect("exp"), Value::Float(3.8413221829e-5));
        assert_eq!(parse_cell("2017-12-29").expect("date"), Value::Date(date!(2017 - 12 - 29)));
        assert!(parse_cell("abc").is_err());
        assert!(parse_cell("").is_err());
    }

    #[test]
    fn row_round_trip_is_exact() {
        let mut record = Record::with_tradenum(5);
        record.set("sigma1", 0.1 + 0.2);
        record.set("maturity", 0.2);
        record.set("end_date", date!(2018 - 08 - 28));
        let columns = vec![
            "tradenum".to_string(),
            "sigma1".to_string(),
            "maturity".to_string(),
            "end_date".to_string(),
        ];
        let cells = encode_row(&record, &columns).expect("encode");
        let headers = StringRecord::from(columns.clone());
        let decoded = decode_row(&headers, &StringRecord::from(cells)).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn encode_reports_missing_column() {
        let record = Record::with_tradenum(1);
        let columns = vec!["tradenum".to_string(), "fx1".to_string()];
        assert!(matches!(
            encode_row(&record, &columns),
            Err(Error::SchemaMismatch(_))
        ));
    }
}
