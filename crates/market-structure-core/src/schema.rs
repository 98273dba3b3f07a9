use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::bar::Bar;
use crate::error::StoreError;

/// Prices are stored as UTF-8 decimal strings so no binary-float rounding
/// ever touches them. The symbol is carried by the file path, not a column.
pub fn bar_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("open", DataType::Utf8, false),
        Field::new("high", DataType::Utf8, false),
        Field::new("low", DataType::Utf8, false),
        Field::new("close", DataType::Utf8, false),
        Field::new("volume", DataType::Int64, false),
        Field::new("vwap", DataType::Utf8, true),
        Field::new("trade_count", DataType::Int64, true),
    ])
}

pub fn bars_to_record_batch(bars: &[Bar]) -> Result<RecordBatch, StoreError> {
    let schema = Arc::new(bar_schema());

    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_micros()).collect();

    let opens: Vec<String> = bars.iter().map(|b| b.open.to_string()).collect();
    let highs: Vec<String> = bars.iter().map(|b| b.high.to_string()).collect();
    let lows: Vec<String> = bars.iter().map(|b| b.low.to_string()).collect();
    let closes: Vec<String> = bars.iter().map(|b| b.close.to_string()).collect();
    let volumes: Vec<i64> = bars.iter().map(|b| b.volume).collect();
    let vwaps: Vec<Option<String>> = bars
        .iter()
        .map(|b| b.vwap.map(|v| v.to_string()))
        .collect();
    let trade_counts: Vec<Option<i64>> = bars.iter().map(|b| b.trade_count).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
        Arc::new(StringArray::from(
            opens.iter().map(|s| s.as_ref()).collect::<Vec<&str>>(),
        )),
        Arc::new(StringArray::from(
            highs.iter().map(|s| s.as_ref()).collect::<Vec<&str>>(),
        )),
        Arc::new(StringArray::from(
            lows.iter().map(|s| s.as_ref()).collect::<Vec<&str>>(),
        )),
        Arc::new(StringArray::from(
            closes.iter().map(|s| s.as_ref()).collect::<Vec<&str>>(),
        )),
        Arc::new(Int64Array::from(volumes)),
        Arc::new(StringArray::from(
            vwaps
                .iter()
                .map(|s| s.as_deref())
                .collect::<Vec<Option<&str>>>(),
        )),
        Arc::new(Int64Array::from(trade_counts)),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

pub fn record_batch_to_bars(batch: &RecordBatch, symbol: &str) -> Result<Vec<Bar>, StoreError> {
    let timestamps = batch
        .column(0)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| StoreError::InvalidData("expected timestamp column".into()))?;

    let opens = batch
        .column(1)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::InvalidData("expected open column".into()))?;

    let highs = batch
        .column(2)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::InvalidData("expected high column".into()))?;

    let lows = batch
        .column(3)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::InvalidData("expected low column".into()))?;

    let closes = batch
        .column(4)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::InvalidData("expected close column".into()))?;

    let volumes = batch
        .column(5)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| StoreError::InvalidData("expected volume column".into()))?;

    let vwaps = batch
        .column(6)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::InvalidData("expected vwap column".into()))?;

    let trade_counts = batch
        .column(7)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| StoreError::InvalidData("expected trade_count column".into()))?;

    let mut bars = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let micros = timestamps.value(i);
        let timestamp = chrono::DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| StoreError::InvalidData(format!("invalid timestamp: {micros}")))?;

        let open = opens
            .value(i)
            .parse()
            .map_err(|e| StoreError::InvalidData(format!("invalid open: {e}")))?;
        let high = highs
            .value(i)
            .parse()
            .map_err(|e| StoreError::InvalidData(format!("invalid high: {e}")))?;
        let low = lows
            .value(i)
            .parse()
            .map_err(|e| StoreError::InvalidData(format!("invalid low: {e}")))?;
        let close = closes
            .value(i)
            .parse()
            .map_err(|e| StoreError::InvalidData(format!("invalid close: {e}")))?;
        let volume = volumes.value(i);

        let vwap = if vwaps.is_null(i) {
            None
        } else {
            Some(
                vwaps
                    .value(i)
                    .parse()
                    .map_err(|e| StoreError::InvalidData(format!("invalid vwap: {e}")))?,
            )
        };
        let trade_count = if trade_counts.is_null(i) {
            None
        } else {
            Some(trade_counts.value(i))
        };

        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            vwap,
            trade_count,
        });
    }

    Ok(bars)
}

pub fn write_parquet(path: &Path, bars: &[Bar]) -> Result<(), StoreError> {
    let batch = bars_to_record_batch(bars)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

pub fn read_parquet(path: &Path, symbol: &str) -> Result<Vec<Bar>, StoreError> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut all_bars = Vec::new();
    for batch in reader {
        let batch = batch?;
        let mut bars = record_batch_to_bars(&batch, symbol)?;
        all_bars.append(&mut bars);
    }

    Ok(all_bars)
}
