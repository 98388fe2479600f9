use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use nalgebra::Vector3;
use tracing::warn;

use crate::cloud::PointBatch;

#[derive(Debug, Clone)]
pub struct CloudEntry {
    pub timestamp_ns: u64,
    pub filename: String,
}

/// A recorded cloud stream on disk.
///
/// Layout:
/// ```text
/// <root>/data.csv          timestamp_ns,filename   ('#' starts a comment)
/// <root>/data/<filename>   x,y,z per row; nan/inf mark dropouts
/// ```
#[derive(Debug)]
pub struct CloudSequence {
    root: PathBuf,
    pub entries: Vec<CloudEntry>,
}

impl CloudSequence {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let entries = load_cloud_list(root.join("data.csv"))?;

        for pair in entries.windows(2) {
            if pair[1].timestamp_ns <= pair[0].timestamp_ns {
                bail!(
                    "Cloud timestamps must increase: {} follows {}",
                    pair[1].timestamp_ns,
                    pair[0].timestamp_ns
                );
            }
        }

        Ok(Self { root, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frame_timestamp(&self, idx: usize) -> Option<u64> {
        self.entries.get(idx).map(|e| e.timestamp_ns)
    }

    /// Load the cloud at `idx`.
    pub fn load(&self, idx: usize) -> Result<PointBatch> {
        let entry = self
            .entries
            .get(idx)
            .with_context(|| format!("No cloud at index {}", idx))?;
        let path = self.root.join("data").join(&entry.filename);
        let points = load_points(&path)?;
        Ok(PointBatch::new(entry.timestamp_ns, points))
    }

    /// Load every cloud in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<PointBatch>> + '_ {
        (0..self.len()).map(move |i| self.load(i))
    }
}

fn load_cloud_list(csv_path: PathBuf) -> Result<Vec<CloudEntry>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .from_path(&csv_path)
        .with_context(|| format!("Failed to open {}", csv_path.display()))?;

    let mut entries = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() < 2 {
            continue;
        }
        let ts: u64 = rec[0]
            .trim()
            .parse()
            .with_context(|| format!("Bad timestamp {:?} in {}", &rec[0], csv_path.display()))?;
        entries.push(CloudEntry {
            timestamp_ns: ts,
            filename: rec[1].trim().to_string(),
        });
    }
    Ok(entries)
}

/// Read `x,y,z` rows. A row with a wrong column count still occupies its
/// slot as a non-finite point, so it counts against the valid ratio.
fn load_points(path: &Path) -> Result<Vec<Vector3<f32>>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut points = Vec::new();
    let mut malformed = 0usize;
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() != 3 {
            malformed += 1;
            points.push(Vector3::repeat(f32::NAN));
            continue;
        }
        points.push(Vector3::new(
            parse_coord(&rec[0], path)?,
            parse_coord(&rec[1], path)?,
            parse_coord(&rec[2], path)?,
        ));
    }
    if malformed > 0 {
        warn!(
            "{} malformed rows in {} read as invalid points",
            malformed,
            path.display()
        );
    }
    Ok(points)
}

fn parse_coord(field: &str, path: &Path) -> Result<f32> {
    field
        .trim()
        .parse()
        .with_context(|| format!("Bad coordinate {:?} in {}", field, path.display()))
}
