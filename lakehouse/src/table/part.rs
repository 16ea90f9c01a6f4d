use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use common::{Error, Result};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use sha2::{Digest, Sha256};

/// An encoded part file ready for upload.
pub struct EncodedPart {
    pub bytes: Vec<u8>,
    pub rows: u64,
    pub checksum: String,
}

/// Writes all `batches` into a single Parquet file, tagging it with `metadata`.
pub fn encode_batches(
    batches: &[RecordBatch],
    metadata: Vec<(String, String)>,
) -> Result<EncodedPart> {
    let first = batches
        .first()
        .ok_or_else(|| Error::InvalidInput("No record batches to encode".to_string()))?;

    let writer_props = WriterProperties::builder()
        .set_key_value_metadata(Some(
            metadata
                .into_iter()
                .map(|(key, value)| KeyValue {
                    key,
                    value: Some(value),
                })
                .collect::<Vec<KeyValue>>(),
        ))
        .build();

    let mut buffer: Vec<u8> = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, first.schema(), Some(writer_props))?;

    let mut rows = 0u64;
    for batch in batches {
        writer.write(batch)?;
        rows += batch.num_rows() as u64;
    }
    writer.close()?;

    let mut hasher = Sha256::new();
    hasher.update(&buffer);
    let checksum = format!("{:x}", hasher.finalize());

    Ok(EncodedPart {
        bytes: buffer,
        rows,
        checksum,
    })
}

pub fn decode_batches(data: Vec<u8>) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batches)
}
