use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
};

use log::info;
use serde_json::{Map, Value};

/// A sink for the per epoch metrics of a run.
pub trait MetricLogger {
    /// Records `metrics` for `epoch`.
    fn log(&mut self, epoch: usize, metrics: &[(&str, f64)]) -> io::Result<()>;
}

/// Writes the metrics to the log.
#[derive(Debug, Default)]
pub struct LogMetrics;

impl MetricLogger for LogMetrics {
    fn log(&mut self, epoch: usize, metrics: &[(&str, f64)]) -> io::Result<()> {
        let line = metrics
            .iter()
            .map(|(key, value)| format!("{key}={value:.4}"))
            .collect::<Vec<_>>()
            .join(" ");

        info!(epoch = epoch; "metrics {line}");
        Ok(())
    }
}

/// Appends one JSON object per epoch to a file.
#[derive(Debug)]
pub struct JsonLinesMetrics {
    out: BufWriter<File>,
}

impl JsonLinesMetrics {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            out: BufWriter::new(file),
        })
    }
}

impl MetricLogger for JsonLinesMetrics {
    fn log(&mut self, epoch: usize, metrics: &[(&str, f64)]) -> io::Result<()> {
        let mut record = Map::new();
        record.insert("epoch".to_string(), Value::from(epoch));

        for &(key, value) in metrics {
            record.insert(key.to_string(), Value::from(value));
        }

        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

/// Picks the metrics sink for a run: the given file if any, the log otherwise.
pub fn logger_for(path: Option<&Path>) -> io::Result<Box<dyn MetricLogger>> {
    Ok(match path {
        Some(path) => Box::new(JsonLinesMetrics::create(path)?),
        None => Box::new(LogMetrics),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn json_lines_holds_one_record_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");

        let mut logger = JsonLinesMetrics::create(&path).unwrap();
        logger.log(0, &[("loss", 0.5), ("accuracy", 0.25)]).unwrap();
        logger.log(1, &[("loss", 0.25), ("accuracy", 0.5)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let records: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["epoch"], 1);
        assert_eq!(records[1]["accuracy"], 0.5);
    }
}
