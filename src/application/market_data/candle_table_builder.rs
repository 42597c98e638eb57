//! Exchange kline rows -> typed [`CandleTable`].
//!
//! Binance klines format: `[open_time, open, high, low, close, volume, close_time, ...]`
//! with prices and volume as decimal strings. Extra trailing fields are ignored.

use crate::domain::errors::MarketDataError;
use crate::domain::market::candle::{Candle, CandleTable};
use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

const KLINE_MIN_FIELDS: usize = 6;
const PRICE_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

pub struct CandleTableBuilder;

impl CandleTableBuilder {
    /// Parses every row; the first unparseable field aborts the build.
    pub fn build(
        symbol: &str,
        timeframe: Timeframe,
        rows: &[Value],
    ) -> Result<CandleTable, MarketDataError> {
        let candles = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| Self::parse_row(timeframe, idx, row))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "CandleTableBuilder: Built {} {} candles for {}",
            candles.len(),
            timeframe,
            symbol
        );

        Ok(CandleTable::new(symbol, timeframe, candles))
    }

    fn parse_row(timeframe: Timeframe, idx: usize, row: &Value) -> Result<Candle, MarketDataError> {
        let malformed = |field: &str, value: String| MarketDataError::MalformedCandle {
            timeframe: timeframe.to_string(),
            row: idx,
            field: field.to_string(),
            value,
        };

        let fields = row
            .as_array()
            .ok_or_else(|| malformed("row", row.to_string()))?;
        if fields.len() < KLINE_MIN_FIELDS {
            return Err(malformed("row", format!("{} fields", fields.len())));
        }

        let timestamp = match &fields[0] {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| malformed("open_time", fields[0].to_string()))?;

        let mut values = [Decimal::ZERO; 5];
        for (slot, (name, raw)) in values
            .iter_mut()
            .zip(PRICE_FIELDS.iter().zip(&fields[1..KLINE_MIN_FIELDS]))
        {
            *slot = parse_decimal(raw).ok_or_else(|| malformed(*name, raw.to_string()))?;
        }
        let [open, high, low, close, volume] = values;

        Ok(Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Strings are parsed exactly; JSON numbers go through their textual form so
/// no binary float ever touches the value.
fn parse_decimal(raw: &Value) -> Option<Decimal> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_builds_binance_rows() {
        let rows = vec![
            json!([1704067200000i64, "42000.10", "42100.00", "41900.50", "42050.25", "12.5", 1704070799999i64, "525000.0", 100, "6.0", "250000.0", "0"]),
            json!([1704070800000i64, "42050.25", "42200.00", "42000.00", "42150.00", "8.25", 1704074399999i64]),
        ];

        let table = CandleTableBuilder::build("BTCUSDT", Timeframe::OneHour, &rows).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.symbol(), "BTCUSDT");
        let first = &table.candles()[0];
        assert_eq!(first.timestamp, 1704067200000);
        assert_eq!(first.open, dec!(42000.10));
        assert_eq!(first.low, dec!(41900.50));
        assert_eq!(first.volume, dec!(12.5));
        assert_eq!(table.latest().unwrap().close, dec!(42150.00));
    }

    #[test]
    fn test_numeric_fields_keep_precision() {
        let rows = vec![json!([1, 0.1, 0.3, 0.1, 0.2, 7, 2])];
        let table = CandleTableBuilder::build("ETHUSDT", Timeframe::OneDay, &rows).unwrap();
        assert_eq!(table.candles()[0].high, dec!(0.3));
        assert_eq!(table.candles()[0].close, dec!(0.2));
    }

    #[test]
    fn test_unparseable_field_names_row_and_field() {
        let rows = vec![
            json!([1, "1", "2", "0.5", "1.5", "10", 2]),
            json!([2, "1", "2", "abc", "1.5", "10", 3]),
        ];
        let err = CandleTableBuilder::build("ETHUSDT", Timeframe::FourHour, &rows).unwrap_err();
        assert!(err.is_processing());
        match err {
            MarketDataError::MalformedCandle {
                timeframe,
                row,
                field,
                value,
            } => {
                assert_eq!(timeframe, "4h");
                assert_eq!(row, 1);
                assert_eq!(field, "low");
                assert!(value.contains("abc"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_short_row_and_bad_timestamp() {
        let err = CandleTableBuilder::build("ETHUSDT", Timeframe::OneHour, &[json!([1, "1", "2"])])
            .unwrap_err();
        assert!(matches!(err, MarketDataError::MalformedCandle { ref field, .. } if field == "row"));

        let err = CandleTableBuilder::build(
            "ETHUSDT",
            Timeframe::OneHour,
            &[json!([null, "1", "2", "1", "1", "1"])],
        )
        .unwrap_err();
        assert!(
            matches!(err, MarketDataError::MalformedCandle { ref field, .. } if field == "open_time")
        );
    }

    #[test]
    fn test_empty_input_builds_empty_table() {
        let table = CandleTableBuilder::build("ETHUSDT", Timeframe::OneHour, &[]).unwrap();
        assert!(table.is_empty());
    }
}
