//! Synthetic FX warrant trades.
//!
//! Row count and id sequence depend only on `(start, count)`; the numeric
//! fields are drawn from fixed distributions.

use rand::Rng;
use time::macros::date;
use time::{Date, Weekday};

use crate::record::{Record, Table};

const START_DATE: Date = date!(2017 - 12 - 29);
const END_DATE: Date = date!(2018 - 08 - 28);
const MATURITY: f64 = 0.20;
const TRIALS: i64 = 10_000;
const RO: f64 = 0.000038413221829;
const V: f64 = 0.00154807378604;
const SIGMA1_MID: f64 = 0.0808844481978;

/// Trades `start .. start + count` drawn from the thread-local rng.
pub fn generate_trades(start: i64, count: usize) -> Table {
    generate_trades_with(&mut rand::thread_rng(), start, count)
}

pub fn generate_trades_with<R: Rng>(rng: &mut R, start: i64, count: usize) -> Table {
    let t_steps = business_days(START_DATE, END_DATE);
    (0..count as i64)
        .map(|offset| {
            let mut trade = Record::with_tradenum(start + offset);
            trade.set("fx1", rng.gen::<f64>() * 0.12 + 0.8285);
            trade.set("start_date", START_DATE);
            trade.set("end_date", END_DATE);
            trade.set("drift", rng.gen::<f64>() * 0.2 - 0.1);
            trade.set("maturity", MATURITY);
            trade.set("t_steps", t_steps);
            trade.set("trials", TRIALS);
            trade.set("ro", RO);
            trade.set("v", V);
            trade.set("sigma1", rng.gen::<f64>() * 0.03 - 0.015 + SIGMA1_MID);
            trade.set("warrantsNo", rng.gen_range(30_000i64..60_000));
            trade.set("notionalPerWarr", rng.gen::<f64>() * 100.0 + 950.0);
            trade.set("strike", rng.gen::<f64>() * 0.12 + 0.7);
            trade
        })
        .collect()
}

/// Weekdays in `[from, to)`.
pub fn business_days(from: Date, to: Date) -> i64 {
    let mut count = 0;
    let mut day = from;
    while day < to {
        if !matches!(day.weekday(), Weekday::Saturday | Weekday::Sunday) {
            count += 1;
        }
        match day.next_day() {
            Some(next) => day = next,
            None => break,
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn ids_are_contiguous() {
        let table = generate_trades(1000, 5);
        let ids: Vec<_> = table.iter().filter_map(Record::tradenum).collect();
        assert_eq!(ids, vec![1000, 1001, 1002, 1003, 1004]);
        assert_eq!(table.columns().len(), 14);
        assert!(generate_trades(7, 0).is_empty());
    }

    #[test]
    fn values_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for trade in &generate_trades_with(&mut rng, 0, 200) {
            let fx1 = trade.get("fx1").and_then(|v| v.as_float()).expect("fx1");
            assert!((0.8285..=0.9485).contains(&fx1));
            let warrants = trade.get("warrantsNo").and_then(|v| v.as_int()).expect("warrants");
            assert!((30_000..60_000).contains(&warrants));
            assert_eq!(trade.get("t_steps").and_then(|v| v.as_int()), Some(172));
        }
    }

    #[test]
    fn counts_weekdays_only() {
        assert_eq!(business_days(START_DATE, END_DATE), 172);
        // Saturday to Monday.
        assert_eq!(business_days(date!(2018 - 01 - 06), date!(2018 - 01 - 08)), 0);
        assert_eq!(business_days(END_DATE, START_DATE), 0);
    }
}
