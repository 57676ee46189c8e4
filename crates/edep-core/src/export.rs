//! Logical export containers and writers.
//!
//! Each sink describes its output as a [`Group`] of named [`Dataset`]s with
//! attributes, bound to an output file and an optional group name
//! ([`SinkExport`]). An [`ExportSet`] merges the exports of every sink into
//! one container per file, rejecting duplicate dataset names. The on-disk
//! encoding is left to a [`ContainerWriter`]; [`JsonWriter`] is the one
//! provided.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::Dtype;

/// Errors that can occur while merging or writing exports.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Two sinks wrote a dataset with the same path into the same file.
    #[error("{file}: dataset {path} is written by more than one detector")]
    Duplicate {
        /// The output file.
        file: PathBuf,
        /// Slash-separated dataset path inside the file.
        path: String,
    },

    /// A name is used both as a group and as a dataset.
    #[error("{file}: {path} is both a group and a dataset")]
    Conflict {
        /// The output file.
        file: PathBuf,
        /// Slash-separated path inside the file.
        path: String,
    },

    /// Creating or writing the output file failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The output file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Encoding the container failed.
    #[error("failed to encode {path}: {source}")]
    Encode {
        /// The output file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Container model
// ---------------------------------------------------------------------------

/// An attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// An unsigned integer.
    Int(u64),
    /// A float.
    Float(f64),
    /// A string.
    Text(String),
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Flat, row-major dataset contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum ArrayData {
    /// Single-precision floats.
    F32(Vec<f32>),
    /// Double-precision floats.
    F64(Vec<f64>),
    /// Unsigned integers.
    U64(Vec<u64>),
    /// Strings.
    Text(Vec<String>),
}

impl ArrayData {
    /// Floats at the requested precision.
    #[allow(clippy::cast_possible_truncation)]
    pub fn floats(values: Vec<f64>, dtype: Dtype) -> Self {
        match dtype {
            Dtype::F64 => Self::F64(values),
            Dtype::F32 => Self::F32(values.into_iter().map(|v| v as f32).collect()),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An N-dimensional array with attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    /// Extent along each dimension; empty for a scalar.
    pub shape: Vec<usize>,
    /// Element type and values.
    #[serde(flatten)]
    pub data: ArrayData,
    /// Attributes, such as `unit` and `num_events`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Dataset {
    /// A dataset with no attributes.
    pub const fn new(shape: Vec<usize>, data: ArrayData) -> Self {
        Self {
            shape,
            data,
            attrs: BTreeMap::new(),
        }
    }

    /// A one-dimensional dataset.
    pub fn vector(data: ArrayData) -> Self {
        Self::new(vec![data.len()], data)
    }

    /// An `N x 3` dataset of 3-vectors, each divided by `unit`.
    pub fn vectors(rows: &[[f64; 3]], unit: f64) -> Self {
        let values = rows.iter().flatten().map(|v| v / unit).collect();
        Self::new(vec![rows.len(), 3], ArrayData::F64(values))
    }

    /// A scalar count.
    pub fn count(value: u64) -> Self {
        Self::new(Vec::new(), ArrayData::U64(vec![value]))
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_owned(), value.into());
        self
    }

    /// Add a `unit` attribute.
    #[must_use]
    pub fn with_unit(self, unit: &str) -> Self {
        self.with_attr("unit", unit)
    }
}

/// A named collection of datasets, subgroups and attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Group {
    /// Attributes.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
    /// Datasets by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub datasets: BTreeMap<String, Dataset>,
    /// Subgroups by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, Self>,
}

impl Group {
    /// An empty group.
    pub const fn new() -> Self {
        Self {
            attrs: BTreeMap::new(),
            datasets: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Add a dataset, replacing any with the same name.
    #[must_use]
    pub fn with_dataset(mut self, name: &str, dataset: Dataset) -> Self {
        self.datasets.insert(name.to_owned(), dataset);
        self
    }

    /// Add a subgroup, replacing any with the same name.
    #[must_use]
    pub fn with_group(mut self, name: &str, group: Self) -> Self {
        self.groups.insert(name.to_owned(), group);
        self
    }

    /// Set an attribute.
    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(key.to_owned(), value.into());
    }

    /// Dataset at a slash-separated path.
    pub fn dataset(&self, path: &str) -> Option<&Dataset> {
        match path.rsplit_once('/') {
            None => self.datasets.get(path),
            Some((groups, name)) => self.group(groups)?.datasets.get(name),
        }
    }

    /// Subgroup at a slash-separated path.
    pub fn group(&self, path: &str) -> Option<&Self> {
        path.split('/')
            .try_fold(self, |group, name| group.groups.get(name))
    }

    /// Total number of datasets in this group and all subgroups.
    pub fn dataset_count(&self) -> usize {
        self.groups
            .values()
            .map(Self::dataset_count)
            .fold(self.datasets.len(), usize::saturating_add)
    }

    /// Move `other` into this group. `prefix` is the path of `self` inside
    /// `file`, used only for error messages.
    fn merge(&mut self, other: Self, file: &Path, prefix: &str) -> Result<(), ExportError> {
        let join = |name: &str| {
            if prefix.is_empty() {
                name.to_owned()
            } else {
                format!("{prefix}/{name}")
            }
        };

        for (name, dataset) in other.datasets {
            if self.groups.contains_key(&name) {
                return Err(ExportError::Conflict {
                    file: file.to_path_buf(),
                    path: join(&name),
                });
            }
            if self.datasets.contains_key(&name) {
                return Err(ExportError::Duplicate {
                    file: file.to_path_buf(),
                    path: join(&name),
                });
            }
            self.datasets.insert(name, dataset);
        }
        for (name, group) in other.groups {
            if self.datasets.contains_key(&name) {
                return Err(ExportError::Conflict {
                    file: file.to_path_buf(),
                    path: join(&name),
                });
            }
            let path = join(&name);
            self.groups.entry(name).or_default().merge(group, file, &path)?;
        }
        self.attrs.extend(other.attrs);
        Ok(())
    }
}

/// One sink's finished output.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkExport {
    /// Output file.
    pub file: PathBuf,
    /// Group inside the file; the root when `None`.
    pub group: Option<String>,
    /// The exported contents.
    pub contents: Group,
}

/// Run identification stamped on every file root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMetadata {
    /// Unique, time-ordered run id.
    pub run_id: Uuid,
    /// When the run finished.
    pub created_at: DateTime<Utc>,
}

impl RunMetadata {
    /// Metadata for a run finishing now.
    pub fn now() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            created_at: Utc::now(),
        }
    }
}

/// Every file a run produces, keyed by path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSet {
    files: BTreeMap<PathBuf, Group>,
}

impl ExportSet {
    /// An empty set.
    pub const fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    /// Merge one sink's export into its file.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Duplicate`] if a dataset path is already taken,
    /// or [`ExportError::Conflict`] if a name is used as both a group and a
    /// dataset.
    pub fn add(&mut self, export: SinkExport) -> Result<(), ExportError> {
        let SinkExport {
            file,
            group,
            contents,
        } = export;
        let root = self.files.entry(file.clone()).or_default();
        match group {
            None => root.merge(contents, &file, ""),
            Some(name) => {
                let wrapped = Group::new().with_group(&name, contents);
                root.merge(wrapped, &file, "")
            }
        }
    }

    /// The container for `file`, if any sink writes to it.
    pub fn file(&self, file: &Path) -> Option<&Group> {
        self.files.get(file)
    }

    /// Output files in path order.
    pub fn files(&self) -> impl Iterator<Item = (&Path, &Group)> {
        self.files.iter().map(|(path, group)| (path.as_path(), group))
    }

    /// Number of output files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no sink produced output.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Stamp each root with `meta` and write every file.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by `writer`.
    pub fn write_all(
        &self,
        writer: &dyn ContainerWriter,
        meta: &RunMetadata,
    ) -> Result<(), ExportError> {
        for (path, root) in &self.files {
            let mut root = root.clone();
            root.set_attr("run_id", meta.run_id.to_string());
            root.set_attr(
                "created_at",
                meta.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            );
            writer.write(path, &root)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Encodes a container to a file.
pub trait ContainerWriter {
    /// Write `root` to `path`, replacing any existing file.
    fn write(&self, path: &Path, root: &Group) -> Result<(), ExportError>;
}

/// Writes containers as pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWriter;

impl ContainerWriter for JsonWriter {
    fn write(&self, path: &Path, root: &Group) -> Result<(), ExportError> {
        let io_error = |source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = File::create(path).map_err(io_error)?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, root).map_err(|source| ExportError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        out.write_all(b"\n").map_err(io_error)?;
        out.flush().map_err(io_error)?;

        info!(
            path = %path.display(),
            datasets = root.dataset_count(),
            "Export written"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn edep(value: f64) -> Dataset {
        Dataset::vector(ArrayData::F64(vec![value]))
            .with_unit("MeV")
            .with_attr("num_events", 10_u64)
    }

    fn export(file: &str, group: Option<&str>, name: &str) -> SinkExport {
        SinkExport {
            file: PathBuf::from(file),
            group: group.map(str::to_owned),
            contents: Group::new().with_dataset(name, edep(1.0)),
        }
    }

    #[test]
    fn float_precision_follows_dtype() {
        assert_eq!(
            ArrayData::floats(vec![0.5, 1.5], Dtype::F32),
            ArrayData::F32(vec![0.5, 1.5])
        );
        assert_eq!(
            ArrayData::floats(vec![0.5], Dtype::F64),
            ArrayData::F64(vec![0.5])
        );
    }

    #[test]
    fn vectors_are_scaled_rows() {
        let d = Dataset::vectors(&[[10.0, 20.0, 30.0], [1.0, 2.0, 3.0]], 10.0);
        assert_eq!(d.shape, vec![2, 3]);
        assert_eq!(d.data, ArrayData::F64(vec![1.0, 2.0, 3.0, 0.1, 0.2, 0.3]));
    }

    #[test]
    fn sinks_sharing_a_file_are_merged() {
        let mut set = ExportSet::new();
        set.add(export("out/a.json", Some("left"), "edep")).unwrap();
        set.add(export("out/a.json", Some("right"), "edep")).unwrap();
        set.add(export("out/a.json", None, "hits")).unwrap();
        set.add(export("out/b.json", None, "edep")).unwrap();

        assert_eq!(set.len(), 2);
        let root = set.file(Path::new("out/a.json")).unwrap();
        assert!(root.dataset("left/edep").is_some());
        assert!(root.dataset("right/edep").is_some());
        assert!(root.dataset("hits").is_some());
        assert_eq!(root.dataset_count(), 3);
    }

    #[test]
    fn duplicate_dataset_is_rejected() {
        let mut set = ExportSet::new();
        set.add(export("a.json", Some("g"), "edep")).unwrap();
        let err = set.add(export("a.json", Some("g"), "edep")).unwrap_err();
        assert!(matches!(err, ExportError::Duplicate { ref path, .. } if path == "g/edep"));

        set.add(export("b.json", None, "edep")).unwrap();
        assert!(matches!(
            set.add(export("b.json", None, "edep")),
            Err(ExportError::Duplicate { .. })
        ));
    }

    #[test]
    fn group_dataset_name_clash_is_rejected() {
        let mut set = ExportSet::new();
        set.add(export("a.json", None, "g")).unwrap();
        assert!(matches!(
            set.add(export("a.json", Some("g"), "edep")),
            Err(ExportError::Conflict { .. })
        ));
    }

    #[test]
    fn json_layout() {
        let root = Group::new()
            .with_dataset("num_events", Dataset::count(4))
            .with_group(
                "gamma",
                Group::new().with_dataset(
                    "energy",
                    Dataset::vector(ArrayData::F32(vec![1.5])).with_unit("MeV"),
                ),
            );
        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["datasets"]["num_events"]["dtype"], "u64");
        assert_eq!(json["datasets"]["num_events"]["shape"], serde_json::json!([]));
        assert_eq!(json["groups"]["gamma"]["datasets"]["energy"]["values"][0], 1.5);
        assert_eq!(json["groups"]["gamma"]["datasets"]["energy"]["attrs"]["unit"], "MeV");
        assert!(json.get("attrs").is_none());
    }

    #[test]
    fn json_writer_creates_directories_and_stamps_root() {
        let dir = std::env::temp_dir().join(format!("edep-export-{}", Uuid::now_v7()));
        let file = dir.join("nested").join("out.json");
        let mut set = ExportSet::new();
        set.add(SinkExport {
            file: file.clone(),
            group: None,
            contents: Group::new().with_dataset("edep", edep(2.0)),
        })
        .unwrap();
        let meta = RunMetadata::now();
        set.write_all(&JsonWriter, &meta).unwrap();

        let text = std::fs::read_to_string(&file).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["attrs"]["run_id"], meta.run_id.to_string());
        assert!(json["attrs"]["created_at"].as_str().unwrap().ends_with('Z'));
        assert_eq!(json["datasets"]["edep"]["attrs"]["num_events"], 10);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
