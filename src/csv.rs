//! CSV export of accumulated datasets.

use std::io;

use serde_json::Value;

use crate::accumulator::CsvDataset;
use crate::error::PipelineError;

const HEADER: [&str; 5] = ["elapsed time", "receive time", "header.stamp", "topic", "value"];

/// Write every sample of every dataset, one row per sample.
pub fn write_csv<W: io::Write>(writer: W, datasets: &[CsvDataset]) -> Result<(), PipelineError> {
    let mut writer = csv::WriterBuilder::new().from_writer(writer);
    writer.write_record(HEADER)?;
    let mut rows = 0_usize;
    for dataset in datasets {
        for datum in &dataset.data {
            writer.write_record([
                datum.x.to_string(),
                datum.receive_time.to_string(),
                datum
                    .header_stamp
                    .map(|stamp| stamp.to_string())
                    .unwrap_or_default(),
                dataset.label.clone(),
                value_cell(&datum.value),
            ])?;
            rows += 1;
        }
    }
    writer.flush().map_err(csv::Error::from)?;
    tracing::debug!(datasets = datasets.len(), rows, "exported csv");
    Ok(())
}

/// Render the export into a string.
pub fn csv_string(datasets: &[CsvDataset]) -> Result<String, PipelineError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, datasets)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn value_cell(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Datum;
    use crate::time::Time;
    use serde_json::json;

    #[test]
    fn writes_header_and_rows() {
        let datasets = [CsvDataset {
            label: "/odom.v".to_string(),
            data: vec![
                Datum {
                    x: 0.5,
                    y: 2.0,
                    receive_time: Time::new(10, 500_000_000),
                    header_stamp: Some(Time::new(10, 1)),
                    value: json!(2),
                },
                Datum {
                    x: 1.0,
                    y: 1.0,
                    receive_time: Time::new(11, 0),
                    header_stamp: None,
                    value: json!("on"),
                },
            ],
        }];
        let text = csv_string(&datasets).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "elapsed time,receive time,header.stamp,topic,value");
        assert_eq!(lines[1], "0.5,10.500000000,10.000000001,/odom.v,2");
        assert_eq!(lines[2], "1,11.000000000,,/odom.v,on");
        assert_eq!(lines.len(), 3);
    }
}
