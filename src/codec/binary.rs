use time::Date;

use crate::record::{Record, Value};
use crate::{Error, Result};

pub const RECORD_MAGIC: u32 = 0x3144_5254; // "TRD1"

const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_DATE: u8 = 3;

const PREFIX_LEN: usize = 6;
const CRC_LEN: usize = 4;

/// Encode one record as `magic | count | fields... | crc32`.
///
/// Each field is `name_len:u16 | name | tag:u8 | value:8 bytes`, all little
/// endian. Dates travel as their Julian day number.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let count = u16::try_from(record.len()).map_err(|_| Error::Parse("too many fields".into()))?;
    let mut buf = Vec::with_capacity(PREFIX_LEN + record.len() * 24 + CRC_LEN);
    buf.extend_from_slice(&RECORD_MAGIC.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());

    for (name, value) in record.iter() {
        let name_len =
            u16::try_from(name.len()).map_err(|_| Error::Parse(format!("field name too long: {name}")))?;
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        let (tag, bits) = match value {
            Value::Int(v) => (TAG_INT, *v as u64),
            Value::Float(v) => (TAG_FLOAT, v.to_bits()),
            Value::Date(v) => (TAG_DATE, i64::from(v.to_julian_day()) as u64),
        };
        buf.push(tag);
        buf.extend_from_slice(&bits.to_le_bytes());
    }

    let crc = checksum(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

pub fn decode_record(bytes: &[u8]) -> Result<Record> {
    if bytes.len() < PREFIX_LEN + CRC_LEN {
        return Err(Error::Corrupt("record payload truncated"));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - CRC_LEN);
    let expected = u32::from_le_bytes(trailer.try_into().expect("slice length"));
    if checksum(body) != expected {
        return Err(Error::Corrupt("crc mismatch"));
    }

    let mut cursor = Cursor { buf: body, pos: 0 };
    if cursor.u32()? != RECORD_MAGIC {
        return Err(Error::Corrupt("record magic mismatch"));
    }
    let count = cursor.u16()?;

    let mut record = Record::new();
    for _ in 0..count {
        let name_len = cursor.u16()? as usize;
        let name = std::str::from_utf8(cursor.take(name_len)?)
            .map_err(|_| Error::Corrupt("field name is not utf-8"))?
            .to_string();
        let tag = cursor.take(1)?[0];
        let bits = cursor.u64()?;
        let value = match tag {
            TAG_INT => Value::Int(bits as i64),
            TAG_FLOAT => Value::Float(f64::from_bits(bits)),
            TAG_DATE => {
                let day = i32::try_from(bits as i64).map_err(|_| Error::Corrupt("date out of range"))?;
                Value::Date(Date::from_julian_day(day).map_err(|_| Error::Corrupt("date out of range"))?)
            }
            _ => return Err(Error::Corrupt("unknown value tag")),
        };
        record.set(name, value);
    }

    if cursor.pos != body.len() {
        return Err(Error::Corrupt("trailing bytes after record"));
    }
    Ok(record)
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(Error::Corrupt("record payload truncated"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().expect("slice length")))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("slice length")))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("slice length")))
    }
}
