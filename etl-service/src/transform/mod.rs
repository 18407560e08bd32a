use std::{fs, fs::File, path::Path};

use arrow::{
    array::{Array, BooleanArray, Float64Array, StringArray},
    record_batch::RecordBatch,
};
use tracing::info;
use warehouse_client::domain::BillingRecord;

use crate::pipeline::{ensure_parent_dir, read_parquet, temp_sibling, EtlError};

/// Normalize the raw columnar snapshot into the canonical cleaned CSV.
///
/// Steps, in order:
/// 1. split `billing_month` ("YYYY-MM") into integer `year` and `month`,
/// 2. drop rows with a null `customer_id` (documented filter, not an error),
/// 3. emit exactly the 11 canonical columns in canonical order.
///
/// A `billing_month` value that does not split into exactly two numeric
/// parts aborts the whole run; there is no per-row recovery. The output file
/// is written to a temp path and renamed on success, so a failed run never
/// leaves a partial CSV at `output`.
pub fn transform(input: &Path, output: &Path) -> Result<Vec<BillingRecord>, EtlError> {
    let records = read_parquet(File::open(input)?)?;
    let rows_in = records.num_rows();

    let mut rows = Vec::with_capacity(rows_in);
    let mut dropped_null_key = 0usize;
    for batch in &records.batches {
        clean_batch(batch, &mut rows, &mut dropped_null_key)?;
    }

    write_cleaned_csv(&rows, output)?;

    info!(
        rows_in,
        rows_out = rows.len(),
        dropped_null_customer_id = dropped_null_key,
        path = %output.display(),
        "cleaned billing records written"
    );

    Ok(rows)
}

/// Split a composite `"YYYY-MM"` billing month into `(year, month)`.
///
/// Values with no separator, more than one separator, or non-numeric parts
/// are schema faults.
pub fn split_billing_month(value: &str) -> Result<(i32, i32), EtlError> {
    let mut parts = value.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(year_str), Some(month_str), None) => {
            let year: i32 = year_str.trim().parse().map_err(|_| {
                EtlError::Schema(format!(
                    "non-numeric year '{year_str}' in billing_month '{value}'"
                ))
            })?;
            let month: i32 = month_str.trim().parse().map_err(|_| {
                EtlError::Schema(format!(
                    "non-numeric month '{month_str}' in billing_month '{value}'"
                ))
            })?;
            Ok((year, month))
        }
        _ => Err(EtlError::Schema(format!(
            "billing_month '{value}' does not split into exactly two parts"
        ))),
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, EtlError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| EtlError::Schema(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| EtlError::Schema(format!("column '{name}' is not a utf8 column")))
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array, EtlError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| EtlError::Schema(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| EtlError::Schema(format!("column '{name}' is not a float64 column")))
}

fn bool_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a BooleanArray, EtlError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| EtlError::Schema(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| EtlError::Schema(format!("column '{name}' is not a boolean column")))
}

fn required<T>(value: Option<T>, name: &str, row: usize) -> Result<T, EtlError> {
    value.ok_or_else(|| EtlError::Schema(format!("null value in column '{name}' at row {row}")))
}

/// Clean one batch, appending canonical rows to `rows`. Rows with a null
/// `customer_id` are skipped and counted in `dropped_null_key`.
fn clean_batch(
    batch: &RecordBatch,
    rows: &mut Vec<BillingRecord>,
    dropped_null_key: &mut usize,
) -> Result<(), EtlError> {
    let customer_id = string_column(batch, "customer_id")?;
    let disco = string_column(batch, "disco")?;
    let billing_month = string_column(batch, "billing_month")?;
    let tariff_band = string_column(batch, "tariff_band")?;
    let kwh = float_column(batch, "kwh")?;
    let price_ngn_kwh = float_column(batch, "price_ngn_kwh")?;
    let amount_billed_ngn = float_column(batch, "amount_billed_ngn")?;
    let amount_paid_ngn = float_column(batch, "amount_paid_ngn")?;
    let paid_on_time = bool_column(batch, "paid_on_time")?;
    let arrears_ngn = float_column(batch, "arrears_ngn")?;

    for row in 0..batch.num_rows() {
        if customer_id.is_null(row) {
            *dropped_null_key += 1;
            continue;
        }

        let month_token = required(value_opt(billing_month, row), "billing_month", row)?;
        let (year, month) = split_billing_month(month_token)?;

        rows.push(BillingRecord {
            customer_id: customer_id.value(row).to_string(),
            disco: required(value_opt(disco, row), "disco", row)?.to_string(),
            year,
            month,
            tariff_band: required(value_opt(tariff_band, row), "tariff_band", row)?.to_string(),
            kwh: required(float_opt(kwh, row), "kwh", row)?,
            price_ngn_kwh: required(float_opt(price_ngn_kwh, row), "price_ngn_kwh", row)?,
            amount_billed_ngn: required(float_opt(amount_billed_ngn, row), "amount_billed_ngn", row)?,
            amount_paid_ngn: required(float_opt(amount_paid_ngn, row), "amount_paid_ngn", row)?,
            paid_on_time: required(bool_opt(paid_on_time, row), "paid_on_time", row)?,
            arrears_ngn: required(float_opt(arrears_ngn, row), "arrears_ngn", row)?,
        });
    }

    Ok(())
}

fn value_opt<'a>(col: &'a StringArray, row: usize) -> Option<&'a str> {
    if col.is_null(row) {
        None
    } else {
        Some(col.value(row))
    }
}

fn float_opt(col: &Float64Array, row: usize) -> Option<f64> {
    if col.is_null(row) {
        None
    } else {
        Some(col.value(row))
    }
}

fn bool_opt(col: &BooleanArray, row: usize) -> Option<bool> {
    if col.is_null(row) {
        None
    } else {
        Some(col.value(row))
    }
}

/// Write the cleaned rows as CSV with a header, atomically.
///
/// The header is written up front rather than left to `serialize`, so the
/// output carries it even when every input row was filtered out.
fn write_cleaned_csv(rows: &[BillingRecord], output: &Path) -> Result<(), EtlError> {
    ensure_parent_dir(output)?;
    let tmp_path = temp_sibling(output)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&tmp_path)?;
    writer.write_record(BillingRecord::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    drop(writer);

    fs::rename(&tmp_path, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RecordSet;
    use arrow::{
        array::ArrayRef,
        datatypes::{DataType, Field, Schema},
    };
    use std::sync::Arc;

    fn raw_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("customer_id", DataType::Utf8, true),
            Field::new("disco", DataType::Utf8, false),
            Field::new("billing_month", DataType::Utf8, false),
            Field::new("tariff_band", DataType::Utf8, false),
            Field::new("kwh", DataType::Float64, false),
            Field::new("price_ngn_kwh", DataType::Float64, false),
            Field::new("amount_billed_ngn", DataType::Float64, false),
            Field::new("amount_paid_ngn", DataType::Float64, false),
            Field::new("paid_on_time", DataType::Boolean, false),
            Field::new("arrears_ngn", DataType::Float64, false),
        ]))
    }

    /// The three-row fixture: C1 and C3 are valid, the middle row has a
    /// null customer_id and must be filtered out.
    fn raw_batch() -> RecordBatch {
        RecordBatch::try_new(
            raw_schema(),
            vec![
                Arc::new(StringArray::from(vec![Some("C1"), None, Some("C3")])) as ArrayRef,
                Arc::new(StringArray::from(vec!["DiscoA", "DiscoB", "DiscoA"])),
                Arc::new(StringArray::from(vec!["2023-01", "2023-02", "2023-01"])),
                Arc::new(StringArray::from(vec!["BandX", "BandY", "BandX"])),
                Arc::new(Float64Array::from(vec![100.0, 50.0, 200.0])),
                Arc::new(Float64Array::from(vec![50.0, 60.0, 50.0])),
                Arc::new(Float64Array::from(vec![5000.0, 3000.0, 10000.0])),
                Arc::new(Float64Array::from(vec![4500.0, 3000.0, 7000.0])),
                Arc::new(BooleanArray::from(vec![true, true, false])),
                Arc::new(Float64Array::from(vec![500.0, 0.0, 3000.0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn valid_billing_month_splits_into_year_and_month() {
        assert_eq!(split_billing_month("2023-01").unwrap(), (2023, 1));
        assert_eq!(split_billing_month("1999-12").unwrap(), (1999, 12));
    }

    #[test]
    fn billing_month_without_separator_is_a_schema_fault() {
        let err = split_billing_month("202301").unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
    }

    #[test]
    fn billing_month_with_extra_separator_is_a_schema_fault() {
        let err = split_billing_month("2023-01-15").unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
    }

    #[test]
    fn non_numeric_billing_month_part_is_a_schema_fault() {
        assert!(matches!(
            split_billing_month("2023-Jan").unwrap_err(),
            EtlError::Schema(_)
        ));
        assert!(matches!(
            split_billing_month("YYYY-01").unwrap_err(),
            EtlError::Schema(_)
        ));
    }

    #[test]
    fn null_customer_id_rows_are_dropped() {
        let mut rows = Vec::new();
        let mut dropped = 0;
        clean_batch(&raw_batch(), &mut rows, &mut dropped).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(dropped, 1);
        assert_eq!(rows[0].customer_id, "C1");
        assert_eq!(rows[1].customer_id, "C3");
        assert!(rows.iter().all(|r| r.year == 2023 && r.month == 1));
    }

    #[test]
    fn cleaned_rows_carry_arrears_as_given() {
        let mut rows = Vec::new();
        let mut dropped = 0;
        clean_batch(&raw_batch(), &mut rows, &mut dropped).unwrap();

        // C3 underpaid: arrears stay at the reported 3000, not recomputed.
        assert_eq!(rows[1].arrears_ngn, 3000.0);
        assert_eq!(rows[1].amount_billed_ngn - rows[1].amount_paid_ngn, 3000.0);
    }

    #[test]
    fn missing_source_column_is_a_schema_fault() {
        let schema = Arc::new(Schema::new(vec![Field::new("customer_id", DataType::Utf8, true)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec![Some("C1")])) as ArrayRef],
        )
        .unwrap();

        let mut rows = Vec::new();
        let mut dropped = 0;
        let err = clean_batch(&batch, &mut rows, &mut dropped).unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
    }

    #[test]
    fn null_non_key_value_is_a_schema_fault() {
        // Same columns as raw_schema, but kwh is nullable so the batch can
        // hold the bad value.
        let schema = Arc::new(Schema::new(
            raw_schema()
                .fields()
                .iter()
                .map(|f| {
                    if f.name() == "kwh" {
                        Field::new("kwh", DataType::Float64, true)
                    } else {
                        f.as_ref().clone()
                    }
                })
                .collect::<Vec<_>>(),
        ));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("C1")])) as ArrayRef,
                Arc::new(StringArray::from(vec!["DiscoA"])),
                Arc::new(StringArray::from(vec!["2023-01"])),
                Arc::new(StringArray::from(vec!["BandX"])),
                Arc::new(Float64Array::from(vec![None::<f64>])),
                Arc::new(Float64Array::from(vec![50.0])),
                Arc::new(Float64Array::from(vec![5000.0])),
                Arc::new(Float64Array::from(vec![4500.0])),
                Arc::new(BooleanArray::from(vec![true])),
                Arc::new(Float64Array::from(vec![500.0])),
            ],
        )
        .unwrap();

        let mut rows = Vec::new();
        let mut dropped = 0;
        let err = clean_batch(&batch, &mut rows, &mut dropped).unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
        assert_eq!(dropped, 0);
    }

    #[test]
    fn transform_writes_canonical_csv() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw").join("billing.parquet");
        let out_path = dir.path().join("processed").join("billing.csv");

        let records = RecordSet {
            schema: raw_schema(),
            batches: vec![raw_batch()],
        };
        crate::extract::write_snapshot(&records, &raw_path).unwrap();

        let rows = transform(&raw_path, &out_path).unwrap();
        assert_eq!(rows.len(), 2);

        let contents = std::fs::read_to_string(&out_path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(header, BillingRecord::COLUMNS.join(","));
        // billing_month is gone, split into year/month.
        assert!(!header.contains("billing_month"));
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn transform_keeps_header_when_every_row_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("billing.parquet");
        let out_path = dir.path().join("billing.csv");

        // Both rows have a null customer_id, so the output has no data rows.
        let batch = RecordBatch::try_new(
            raw_schema(),
            vec![
                Arc::new(StringArray::from(vec![None::<&str>, None])) as ArrayRef,
                Arc::new(StringArray::from(vec!["DiscoA", "DiscoB"])),
                Arc::new(StringArray::from(vec!["2023-01", "2023-02"])),
                Arc::new(StringArray::from(vec!["BandX", "BandY"])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(BooleanArray::from(vec![true, false])),
                Arc::new(Float64Array::from(vec![0.0, 0.0])),
            ],
        )
        .unwrap();
        let records = RecordSet {
            schema: raw_schema(),
            batches: vec![batch],
        };
        crate::extract::write_snapshot(&records, &raw_path).unwrap();

        let rows = transform(&raw_path, &out_path).unwrap();
        assert!(rows.is_empty());

        let contents = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(
            contents.lines().next().unwrap(),
            BillingRecord::COLUMNS.join(",")
        );
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn malformed_billing_month_aborts_the_whole_transform() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("billing.parquet");
        let out_path = dir.path().join("billing.csv");

        let batch = RecordBatch::try_new(
            raw_schema(),
            vec![
                Arc::new(StringArray::from(vec![Some("C1"), Some("C2")])) as ArrayRef,
                Arc::new(StringArray::from(vec!["DiscoA", "DiscoA"])),
                Arc::new(StringArray::from(vec!["2023-01", "bogus"])),
                Arc::new(StringArray::from(vec!["BandX", "BandX"])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(BooleanArray::from(vec![true, false])),
                Arc::new(Float64Array::from(vec![0.0, 0.0])),
            ],
        )
        .unwrap();
        let records = RecordSet {
            schema: raw_schema(),
            batches: vec![batch],
        };
        crate::extract::write_snapshot(&records, &raw_path).unwrap();

        let err = transform(&raw_path, &out_path).unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
        // The rename never ran, so no partial output exists.
        assert!(!out_path.exists());
    }
}
