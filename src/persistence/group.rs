//! Typed group store.
//!
//! A group is a directory holding a `manifest.json` (key-value metadata plus
//! the member list) and one binary file per member array. Vectors and
//! matrices are bincode-encoded; matrices carry their shape so the dimension
//! is inferred from storage on load.

use crate::matrix::{ColMajorMatrix, Feature};
use crate::persistence::error::{PersistenceError, PersistenceResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const MANIFEST_NAME: &str = "manifest.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    metadata: BTreeMap<String, Value>,
    members: Vec<String>,
}

/// A group of named member arrays with a metadata map, durable under one
/// directory.
#[derive(Debug)]
pub struct Group {
    path: PathBuf,
    metadata: BTreeMap<String, Value>,
    members: Vec<String>,
}

impl Group {
    /// Create (or overwrite) a group directory for writing.
    pub fn create(path: &Path) -> PersistenceResult<Self> {
        std::fs::create_dir_all(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            metadata: BTreeMap::new(),
            members: Vec::new(),
        })
    }

    /// Open an existing group for reading.
    pub fn open(path: &Path) -> PersistenceResult<Self> {
        let manifest_path = path.join(MANIFEST_NAME);
        let file = File::open(&manifest_path).map_err(|_| {
            PersistenceError::Format(format!("no manifest at {}", manifest_path.display()))
        })?;
        let manifest: Manifest = serde_json::from_reader(BufReader::new(file))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(PersistenceError::Format(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            metadata: manifest.metadata,
            members: manifest.members,
        })
    }

    /// Record a metadata key-value pair.
    pub fn put_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Look up a metadata value.
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }

    /// Write a member vector.
    pub fn write_vector<T: Serialize>(&mut self, name: &str, data: &[T]) -> PersistenceResult<()> {
        let file = File::create(self.member_path(name))?;
        bincode::serialize_into(BufWriter::new(file), data)?;
        self.add_member(name);
        Ok(())
    }

    /// Read a member vector.
    pub fn read_vector<T: DeserializeOwned>(&self, name: &str) -> PersistenceResult<Vec<T>> {
        if !self.has_member(name) {
            return Err(PersistenceError::MemberNotFound(name.to_string()));
        }
        let file = File::open(self.member_path(name))?;
        bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| PersistenceError::Deserialization(format!("member {name}: {e}")))
    }

    /// Write a member matrix (shape travels with the data).
    pub fn write_matrix<T: Feature>(
        &mut self,
        name: &str,
        matrix: &ColMajorMatrix<T>,
    ) -> PersistenceResult<()> {
        let file = File::create(self.member_path(name))?;
        bincode::serialize_into(BufWriter::new(file), matrix)?;
        self.add_member(name);
        Ok(())
    }

    /// Read a member matrix, optionally truncated to the first `max_cols`
    /// columns.
    pub fn read_matrix<T: Feature>(
        &self,
        name: &str,
        max_cols: Option<usize>,
    ) -> PersistenceResult<ColMajorMatrix<T>> {
        if !self.has_member(name) {
            return Err(PersistenceError::MemberNotFound(name.to_string()));
        }
        let file = File::open(self.member_path(name))?;
        let mut matrix: ColMajorMatrix<T> = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| PersistenceError::Deserialization(format!("member {name}: {e}")))?;
        if let Some(max_cols) = max_cols {
            matrix.truncate_cols(max_cols);
        }
        Ok(matrix)
    }

    /// Flush the manifest. Call once after all members are written.
    pub fn finish(&self) -> PersistenceResult<()> {
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            metadata: self.metadata.clone(),
            members: self.members.clone(),
        };
        let file = File::create(self.path.join(MANIFEST_NAME))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &manifest)?;
        Ok(())
    }

    fn member_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{name}.bin"))
    }

    fn add_member(&mut self, name: &str) {
        if !self.has_member(name) {
            self.members.push(name.to_string());
        }
    }
}

/// Metadata accessors that map onto the core error kinds: a missing key is
/// "not found", a value of the wrong shape is "unsupported datatype".
pub(crate) fn metadata_u64(group: &Group, key: &str) -> crate::Result<u64> {
    let value = group
        .metadata(key)
        .ok_or_else(|| crate::SearchError::MissingMetadata(key.to_string()))?;
    value
        .as_u64()
        .ok_or_else(|| crate::SearchError::UnsupportedDatatype(key.to_string()))
}

pub(crate) fn metadata_f32(group: &Group, key: &str) -> crate::Result<f32> {
    let value = group
        .metadata(key)
        .ok_or_else(|| crate::SearchError::MissingMetadata(key.to_string()))?;
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| crate::SearchError::UnsupportedDatatype(key.to_string()))
}

pub(crate) fn metadata_bool(group: &Group, key: &str) -> crate::Result<bool> {
    let value = group
        .metadata(key)
        .ok_or_else(|| crate::SearchError::MissingMetadata(key.to_string()))?;
    value
        .as_bool()
        .ok_or_else(|| crate::SearchError::UnsupportedDatatype(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_and_matrix_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group");

        let mut group = Group::create(&path).unwrap();
        group.put_metadata("dimension", 4u64);
        group.write_vector("ids", &[7u32, 8, 9]).unwrap();
        let m = ColMajorMatrix::from_flat(2, 2, vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        group.write_matrix("vectors", &m).unwrap();
        group.finish().unwrap();

        let loaded = Group::open(&path).unwrap();
        assert_eq!(metadata_u64(&loaded, "dimension").unwrap(), 4);
        assert_eq!(loaded.read_vector::<u32>("ids").unwrap(), vec![7, 8, 9]);
        assert_eq!(loaded.read_matrix::<f32>("vectors", None).unwrap(), m);
    }

    #[test]
    fn read_matrix_honors_max_cols() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group");

        let mut group = Group::create(&path).unwrap();
        let m = ColMajorMatrix::from_flat(2, 3, vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        group.write_matrix("vectors", &m).unwrap();
        group.finish().unwrap();

        let loaded = Group::open(&path).unwrap();
        let truncated = loaded.read_matrix::<f32>("vectors", Some(2)).unwrap();
        assert_eq!(truncated.num_cols(), 2);
        assert_eq!(truncated.column(1), &[3.0, 4.0]);
    }

    #[test]
    fn missing_member_and_metadata_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group");
        let group = Group::create(&path).unwrap();
        group.finish().unwrap();

        let loaded = Group::open(&path).unwrap();
        assert!(matches!(
            loaded.read_vector::<u32>("nope"),
            Err(PersistenceError::MemberNotFound(_))
        ));
        assert!(matches!(
            metadata_u64(&loaded, "nope"),
            Err(crate::SearchError::MissingMetadata(_))
        ));
    }

    #[test]
    fn wrong_metadata_type_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group");
        let mut group = Group::create(&path).unwrap();
        group.put_metadata("dimension", "not a number");
        group.finish().unwrap();

        let loaded = Group::open(&path).unwrap();
        assert!(matches!(
            metadata_u64(&loaded, "dimension"),
            Err(crate::SearchError::UnsupportedDatatype(_))
        ));
    }

    #[test]
    fn opening_a_missing_group_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Group::open(&dir.path().join("absent")).is_err());
    }
}
