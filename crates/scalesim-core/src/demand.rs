//! Demand profiles, the one-bucket-ahead forecast, and realized arrivals.
//!
//! A profile is a cyclic sequence of request counts, one per fixed-width
//! time bucket. Two formats are read:
//! - **Text**: numbers separated by whitespace or commas, `#` starts a comment.
//! - **JSON**: a single array of numbers.

use rand::Rng;
use rand_distr::{Exp1, StandardNormal};
use scalesim_policies::DemandForecast;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemandError {
    #[error("Failed to read demand profile: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON profile at line {line}: {source}")]
    JsonParse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Unsupported profile format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid sample {value:?} at line {line}: must be a non-negative number")]
    InvalidSample { line: usize, value: String },
    #[error("Demand profile has no samples")]
    Empty,
}

/// Cyclic per-bucket request counts.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandProfile {
    samples: Vec<f64>,
    bucket_secs: f64,
}

impl DemandProfile {
    /// Build a profile, rejecting empty input and negative or non-finite
    /// samples. `bucket_secs` is assumed positive (checked by config).
    pub fn new(samples: Vec<f64>, bucket_secs: f64) -> Result<Self, DemandError> {
        if samples.is_empty() {
            return Err(DemandError::Empty);
        }
        if let Some((i, v)) = samples
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(DemandError::InvalidSample {
                line: i + 1,
                value: v.to_string(),
            });
        }
        Ok(Self {
            samples,
            bucket_secs,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn bucket_secs(&self) -> f64 {
        self.bucket_secs
    }

    /// One full cycle of the profile.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 * self.bucket_secs
    }

    /// Cyclic bucket index for time `t`.
    pub fn bucket_index(&self, t_secs: f64) -> usize {
        let bucket = (t_secs.max(0.0) / self.bucket_secs).floor() as u64;
        (bucket % self.samples.len() as u64) as usize
    }

    pub fn value_at(&self, t_secs: f64) -> f64 {
        self.samples[self.bucket_index(t_secs)]
    }

    /// Every sample multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            samples: self.samples.iter().map(|v| v * factor).collect(),
            bucket_secs: self.bucket_secs,
        }
    }
}

/// Profile shifted one bucket ahead: the value at bucket `i` is the profile
/// value at `(i + 1) mod len`.
#[derive(Debug, Clone)]
pub struct Forecast {
    shifted: DemandProfile,
}

impl Forecast {
    pub fn from_profile(profile: &DemandProfile) -> Self {
        let mut samples = profile.samples.clone();
        samples.rotate_left(1);
        Self {
            shifted: DemandProfile {
                samples,
                bucket_secs: profile.bucket_secs,
            },
        }
    }

    /// Predicted requests in the bucket containing `t`.
    pub fn predicted_count(&self, t_secs: f64) -> f64 {
        self.shifted.value_at(t_secs)
    }
}

impl DemandForecast for Forecast {
    fn predicted_rate(&self, at_secs: f64) -> f64 {
        self.shifted.value_at(at_secs) / self.shifted.bucket_secs
    }

    fn bucket_secs(&self) -> f64 {
        self.shifted.bucket_secs
    }
}

/// The demand that actually arrives: the scaled profile, optionally
/// perturbed by relative Gaussian noise and rounded to whole requests.
#[derive(Debug, Clone)]
pub struct RealizedDemand {
    counts: DemandProfile,
}

impl RealizedDemand {
    pub fn new<R: Rng>(profile: &DemandProfile, noise_std: f64, rng: &mut R) -> Self {
        let samples = profile
            .samples
            .iter()
            .map(|&v| {
                let noise = if noise_std > 0.0 {
                    let z: f64 = rng.sample(StandardNormal);
                    z * noise_std
                } else {
                    0.0
                };
                (v * (1.0 + noise)).round().max(0.0)
            })
            .collect();
        Self {
            counts: DemandProfile {
                samples,
                bucket_secs: profile.bucket_secs,
            },
        }
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts.samples
    }

    /// Total realized requests over one profile cycle.
    pub fn total(&self) -> f64 {
        self.counts.samples.iter().sum()
    }

    /// Earliest time at or after `from_secs` that lies in a bucket with
    /// demand: `from_secs` itself, or the start of a later bucket. `None`
    /// when every bucket is empty.
    pub fn next_active_time(&self, from_secs: f64) -> Option<f64> {
        self.next_active_bucket(from_secs).map(|(t, _)| t)
    }

    /// Like [`Self::next_active_time`], also returning the cyclic index of
    /// the bucket found.
    ///
    /// Buckets are walked by integer index; `k * bucket_secs / bucket_secs`
    /// is not always `k` in floating point.
    fn next_active_bucket(&self, from_secs: f64) -> Option<(f64, usize)> {
        let bucket_secs = self.counts.bucket_secs;
        let len = self.counts.len() as u64;
        let first = (from_secs.max(0.0) / bucket_secs).floor() as u64;
        (first..=first + len).find_map(|k| {
            let idx = (k % len) as usize;
            if self.counts.samples[idx] <= 0.0 {
                return None;
            }
            let start = if k == first {
                from_secs
            } else {
                (k as f64 * bucket_secs).max(from_secs)
            };
            Some((start, idx))
        })
    }

    /// Time of the next arrival after `now_secs`.
    ///
    /// The interarrival time is exponential with mean
    /// `bucket_secs / count` for the bucket containing `now_secs`. Buckets
    /// with no demand are skipped: the draw restarts at the beginning of the
    /// next non-empty bucket.
    pub fn next_arrival<R: Rng>(&self, now_secs: f64, rng: &mut R) -> Option<f64> {
        let (t, idx) = self.next_active_bucket(now_secs)?;
        let count = self.counts.samples[idx];
        let e: f64 = rng.sample(Exp1);
        Some(t + e * self.counts.bucket_secs / count)
    }
}

/// Load a profile from a file in the given format (`"text"` or `"json"`).
pub fn load_profile(path: &Path, format: &str) -> Result<Vec<f64>, DemandError> {
    match format {
        "text" | "txt" => {
            let file = std::fs::File::open(path)?;
            parse_text_profile(BufReader::new(file))
        }
        "json" => parse_json_profile(&std::fs::read_to_string(path)?),
        other => Err(DemandError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse the text format from any reader.
pub fn parse_text_profile<R: Read>(reader: BufReader<R>) -> Result<Vec<f64>, DemandError> {
    let mut samples = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let content = line.split('#').next().unwrap_or("");
        for token in content
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            match token.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => samples.push(v),
                _ => {
                    return Err(DemandError::InvalidSample {
                        line: line_num + 1,
                        value: token.to_string(),
                    })
                }
            }
        }
    }
    if samples.is_empty() {
        return Err(DemandError::Empty);
    }
    Ok(samples)
}

/// Parse the JSON format: one array of non-negative numbers.
pub fn parse_json_profile(content: &str) -> Result<Vec<f64>, DemandError> {
    let samples: Vec<f64> = serde_json::from_str(content).map_err(|e| DemandError::JsonParse {
        line: e.line(),
        source: e,
    })?;
    if samples.is_empty() {
        return Err(DemandError::Empty);
    }
    if let Some(v) = samples.iter().find(|v| **v < 0.0) {
        return Err(DemandError::InvalidSample {
            line: 0,
            value: v.to_string(),
        });
    }
    Ok(samples)
}

/// Write samples in the text format, ten per line.
pub fn write_profile(samples: &[f64], path: &Path) -> Result<(), DemandError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    writeln!(writer, "# requests per bucket, {} buckets", samples.len())?;
    for chunk in samples.chunks(10) {
        let line: Vec<String> = chunk.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(" "))?;
    }
    writer.flush()?;
    Ok(())
}

/// Synthetic day-shaped profile: a sine wave with its trough at bucket 0,
/// optional relative noise, rounded to whole requests.
pub fn generate_diurnal<R: Rng>(
    buckets: usize,
    base: f64,
    amplitude: f64,
    noise: f64,
    rng: &mut R,
) -> Vec<f64> {
    (0..buckets)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / buckets as f64;
            let mean = base - amplitude * phase.cos();
            let z: f64 = if noise > 0.0 {
                rng.sample(StandardNormal)
            } else {
                0.0
            };
            (mean * (1.0 + noise * z)).round().max(0.0)
        })
        .collect()
}
