use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::config::CIPHERTEXT_HEADER;
use crate::crypto::CipherTuple;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: io::Error },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush output: {0}")]
    Flush(#[from] io::Error),
}

/// Read the record source at `path`. The header row is skipped and each
/// remaining row's fields are joined with `,` into a single record string.
pub fn read_records(path: &Path) -> Result<Vec<String>, RecordError> {
    let file = File::open(path).map_err(|source| RecordError::Open {
        path: path.display().to_string(),
        source,
    })?;
    read_records_from(file)
}

pub fn read_records_from<R: Read>(reader: R) -> Result<Vec<String>, RecordError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        records.push(row.iter().collect::<Vec<_>>().join(","));
    }
    Ok(records)
}

/// Export ciphertext tuples as a `C1_x,C1_y,C2` table of decimal integers,
/// one row per record in input order.
pub fn write_ciphertexts(path: &Path, tuples: &[CipherTuple]) -> Result<(), RecordError> {
    let file = File::create(path).map_err(|source| RecordError::Open {
        path: path.display().to_string(),
        source,
    })?;
    write_ciphertexts_to(file, tuples)
}

pub fn write_ciphertexts_to<W: Write>(writer: W, tuples: &[CipherTuple]) -> Result<(), RecordError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CIPHERTEXT_HEADER)?;
    for t in tuples {
        wtr.write_record([t.c1x.to_string(), t.c1y.to_string(), t.c2.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn test_read_records_skips_header_and_joins_fields() {
        let data = "PatientID,Timestamp,HeartRate,BloodPressure,Temperature\n\
                    001,2025-03-10 10:00:00,72,120/80,36.7\n\
                    002,2025-03-10 10:01:00,64,110/70,36.2\n";
        let records = read_records_from(data.as_bytes()).unwrap();
        assert_eq!(
            records,
            vec![
                "001,2025-03-10 10:00:00,72,120/80,36.7".to_string(),
                "002,2025-03-10 10:01:00,64,110/70,36.2".to_string(),
            ]
        );
    }

    #[test]
    fn test_read_records_header_only() {
        let records = read_records_from("a,b\n".as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_read_records_missing_file() {
        let err = read_records(Path::new("/nonexistent/records.csv")).unwrap_err();
        assert!(matches!(err, RecordError::Open { .. }));
    }

    #[test]
    fn test_write_ciphertexts_decimal_in_order() {
        let tuples = vec![
            CipherTuple {
                c1x: BigUint::from(1u32),
                c1y: BigUint::from(2u32),
                c2: BigUint::from(3u32),
            },
            CipherTuple {
                c1x: BigUint::from(10u32),
                c1y: BigUint::from(20u32),
                c2: BigUint::from(1u64 << 40),
            },
        ];
        let mut out = Vec::new();
        write_ciphertexts_to(&mut out, &tuples).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "C1_x,C1_y,C2\n1,2,3\n10,20,1099511627776\n");
    }

    #[test]
    fn test_ciphertext_file_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encrypted.csv");
        write_ciphertexts(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "C1_x,C1_y,C2\n");
    }
}
