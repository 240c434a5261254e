//! Trade records and tables.
//!
//! A [`Record`] is an ordered list of named scalar fields. The only field
//! with fixed meaning is [`KEY_COLUMN`], the 64-bit trade identifier. All
//! records in one [`Table`] share the same field set.

use std::fmt;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

/// Name of the mandatory identifier column.
pub const KEY_COLUMN: &str = "tradenum";

/// Text form of a date cell. Negative years carry a sign.
pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// A single scalar cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Date(Date),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Date(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Date> for Value {
    fn from(value: Date) -> Self {
        Value::Date(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Date(v) => f.write_str(&v.format(DATE_FORMAT).map_err(|_| fmt::Error)?),
        }
    }
}

/// One trade: ordered `(name, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a record with the identifier column set.
    pub fn with_tradenum(tradenum: i64) -> Self {
        let mut record = Self::new();
        record.set(KEY_COLUMN, Value::Int(tradenum));
        record
    }

    /// Set a field, replacing it in place if already present.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// The identifier, if present and integral.
    pub fn tradenum(&self) -> Option<i64> {
        self.get(KEY_COLUMN).and_then(Value::as_int)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.set(name, value);
        }
        record
    }
}

/// Ordered sequence of records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    records: Vec<Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.last()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Column names of the first record, in order.
    pub fn columns(&self) -> Vec<String> {
        self.records
            .first()
            .map(|r| r.names().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn set_replaces_in_place() {
        let mut record = Record::with_tradenum(7);
        record.set("fx1", 0.5);
        record.set("tradenum", 8i64);
        assert_eq!(record.tradenum(), Some(8));
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["tradenum", "fx1"]);
    }

    #[test]
    fn float_display_keeps_decimal_point() {
        assert_eq!(Value::Float(950.0).to_string(), "950.0");
        assert_eq!(Value::Int(950).to_string(), "950");
        assert_eq!(Value::Date(date!(2018 - 08 - 28)).to_string(), "2018-08-28");
    }

    #[test]
    fn dates_before_year_one_keep_their_sign() {
        let early = Date::from_calendar_date(-1, time::Month::January, 1).expect("date");
        let text = Value::Date(early).to_string();
        assert_eq!(text, "-0001-01-01");
        assert_eq!(Date::parse(&text, DATE_FORMAT).expect("parse"), early);
    }

    #[test]
    fn tradenum_requires_integer() {
        let record: Record = [("tradenum", Value::Float(1.0))].into_iter().collect();
        assert_eq!(record.tradenum(), None);
    }
}
