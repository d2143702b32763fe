// src/output.rs - Metrics table, error log and per-image summaries
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;

use crate::channel::Channel;
use crate::config::Config;
use crate::errors::Result;
use crate::histogram::{histogram_headers, AreaHistogram};
use crate::point_analysis::ProximityStats;

/// Area distribution of one channel's accepted regions
#[derive(Debug, Clone, Serialize)]
pub struct ChannelHistogram {
    pub channel: Channel,
    pub histogram: AreaHistogram,
}

/// Everything measured for one image and layer group; one metrics row
#[derive(Debug, Clone, Serialize)]
pub struct ImageMetrics {
    pub image: String,
    /// `zNN-zNN` span of the merged layers
    pub layer_group: String,
    pub total_nuclei: usize,
    pub microglial_nuclei: usize,
    pub neural_nuclei: usize,
    pub other_nuclei: usize,
    pub histograms: Vec<ChannelHistogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity: Option<ProximityStats>,
}

impl ImageMetrics {
    /// Row values in header order
    pub fn to_record(&self) -> Vec<String> {
        let mut record = vec![
            self.image.clone(),
            self.total_nuclei.to_string(),
            self.microglial_nuclei.to_string(),
            self.neural_nuclei.to_string(),
            self.other_nuclei.to_string(),
        ];

        for entry in &self.histograms {
            record.push(entry.histogram.total.to_string());
            record.extend(entry.histogram.bins.iter().map(|count| count.to_string()));
        }

        if let Some(stats) = &self.proximity {
            record.push(format!("{:.6}", stats.mean_count));
            record.push(format!("{:.6}", stats.stddev_count));
        }

        record
    }
}

/// Header row matching `ImageMetrics::to_record` for rows produced under `config`
pub fn metrics_header(config: &Config) -> Vec<String> {
    let mut header: Vec<String> = [
        "image",
        "total nuclei count",
        "microglial nuclei count",
        "neural nuclei count",
        "other nuclei count",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for channel in &config.histogram.channels {
        header.extend(histogram_headers(channel.population(), &config.histogram));
    }

    if config.proximity.enabled {
        header.push("mean microglial proximity count".to_string());
        header.push("stddev microglial proximity count".to_string());
    }

    header
}

/// CSV metrics table; the header is written on creation
pub struct MetricsWriter<W: Write> {
    writer: Writer<W>,
}

impl MetricsWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::from_writer(File::create(path)?, config)
    }
}

impl<W: Write> MetricsWriter<W> {
    pub fn from_writer(inner: W, config: &Config) -> Result<Self> {
        let mut writer = Writer::from_writer(inner);
        writer.write_record(metrics_header(config))?;
        Ok(Self { writer })
    }

    pub fn write_row(&mut self, metrics: &ImageMetrics) -> Result<()> {
        self.writer.write_record(metrics.to_record())?;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn finish(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error().into())
    }
}

/// Plain-text list of images that could not be processed, one per line
pub struct ErrorLog {
    file: File,
}

impl ErrorLog {
    /// Create or truncate the log
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        Ok(Self { file })
    }

    pub fn record(&mut self, entry: &str) -> Result<()> {
        writeln!(self.file, "{}", entry)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Write `summary.json` for one image into its result directory
pub fn write_summary(metrics: &ImageMetrics, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join("summary.json");
    let json = serde_json::to_string_pretty(metrics)?;
    fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_metrics(config: &Config) -> ImageMetrics {
        let mut histogram = AreaHistogram::new(config.histogram.bin_count);
        histogram.add(100.0, config.histogram.bin_width);
        histogram.add(375.0, config.histogram.bin_width);

        ImageMetrics {
            image: "slide_01".to_string(),
            layer_group: "z01-z03".to_string(),
            total_nuclei: 5,
            microglial_nuclei: 2,
            neural_nuclei: 1,
            other_nuclei: 2,
            histograms: vec![ChannelHistogram {
                channel: Channel::Red,
                histogram,
            }],
            proximity: None,
        }
    }

    #[test]
    fn header_and_row_line_up() {
        let config = Config::default();
        let header = metrics_header(&config);
        let record = sample_metrics(&config).to_record();

        assert_eq!(header.len(), 5 + 22);
        assert_eq!(header.len(), record.len());
        assert_eq!(header[5], "microglia count");
        assert_eq!(record[5], "2");
        assert_eq!(record[6 + 4], "1");
        assert_eq!(record[6 + 15], "1");
    }

    #[test]
    fn proximity_columns_are_optional() {
        let mut config = Config::default();
        config.proximity.enabled = true;
        let mut metrics = sample_metrics(&config);
        metrics.proximity = Some(ProximityStats {
            mean_count: 1.5,
            stddev_count: 0.5,
            roi_radius: 40.0,
        });

        let header = metrics_header(&config);
        let record = metrics.to_record();
        assert_eq!(header.len(), record.len());
        assert_eq!(header.last().unwrap(), "stddev microglial proximity count");
        assert_eq!(record.last().unwrap(), "0.500000");
    }

    #[test]
    fn writer_emits_header_then_rows() {
        let config = Config::default();
        let mut writer = MetricsWriter::from_writer(Vec::new(), &config).unwrap();
        writer.write_row(&sample_metrics(&config)).unwrap();
        let bytes = writer.finish().unwrap();

        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("image,total nuclei count,microglial nuclei count"));
        assert!(lines[1].starts_with("slide_01,5,2,1,2,2,0,0,0,0,1"));
    }

    #[test]
    fn error_log_and_summary_files() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("errors.txt");
        let mut log = ErrorLog::create(&log_path).unwrap();
        log.record("data/missing").unwrap();
        log.record("data/broken").unwrap();
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "data/missing\ndata/broken\n");

        let config = Config::default();
        let path = write_summary(&sample_metrics(&config), &dir.path().join("slide_01")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["microglial_nuclei"], 2);
        assert_eq!(value["histograms"][0]["channel"], "red");
        assert_eq!(value["histograms"][0]["histogram"]["total"], 2);
        assert!(value.get("proximity").is_none());
    }
}
