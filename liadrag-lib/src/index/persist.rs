use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::chunk::Chunk;
use crate::index::VectorIndex;
use crate::{Error, Result};

/// File holding the raw vector buffer.
pub const VECTORS_FILE: &str = "vectors.bin";
/// File holding the chunk list as JSON.
pub const CHUNKS_FILE: &str = "chunks.json";

const MAGIC: &[u8; 8] = b"LRAGVEC1";
const FORMAT_VERSION: u32 = 1;
// magic + version + count + dimension
const HEADER_LEN: usize = 8 + 4 + 8 + 4;

impl VectorIndex {
    /// Write both artifacts into `dir`, creating it if needed.
    ///
    /// Each artifact is written to a temporary sibling and renamed into place once
    /// both are complete. The output is a pure function of the index contents, so
    /// saving the same index twice produces identical bytes.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let chunks_json = serde_json::to_vec(&self.chunks)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize chunks: {e}")))?;
        let vectors_bin = self.encode_vectors();

        let chunks_path = dir.join(CHUNKS_FILE);
        let vectors_path = dir.join(VECTORS_FILE);
        let chunks_tmp = tmp_path(&chunks_path);
        let vectors_tmp = tmp_path(&vectors_path);

        fs::write(&chunks_tmp, &chunks_json)?;
        fs::write(&vectors_tmp, &vectors_bin)?;
        fs::rename(&chunks_tmp, &chunks_path)?;
        fs::rename(&vectors_tmp, &vectors_path)?;

        info!(
            dir = %dir.display(),
            chunks = self.len(),
            dimension = self.dimension,
            "index saved"
        );
        Ok(())
    }

    /// Load both artifacts from `dir`.
    ///
    /// A missing or unreadable artifact is [`Error::IndexMissing`]; malformed
    /// content or artifacts that disagree in length are [`Error::IndexCorrupt`].
    pub fn load(dir: &Path) -> Result<Self> {
        let vectors_bin = read_artifact(&dir.join(VECTORS_FILE))?;
        let chunks_json = read_artifact(&dir.join(CHUNKS_FILE))?;

        let (count, dimension, vectors) = decode_vectors(&vectors_bin)?;
        let chunks: Vec<Chunk> = serde_json::from_slice(&chunks_json)
            .map_err(|e| Error::IndexCorrupt(format!("{CHUNKS_FILE}: {e}")))?;

        if chunks.len() != count {
            return Err(Error::IndexCorrupt(format!(
                "{VECTORS_FILE} holds {count} vectors but {CHUNKS_FILE} holds {} chunks",
                chunks.len()
            )));
        }

        info!(dir = %dir.display(), chunks = count, dimension, "index loaded");
        Ok(Self {
            dimension,
            vectors,
            chunks,
        })
    }

    fn encode_vectors(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        for &value in &self.vectors {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::IndexMissing(format!("{} not found", path.display())),
        _ => Error::IndexMissing(format!("{} unreadable: {e}", path.display())),
    })
}

fn decode_vectors(bytes: &[u8]) -> Result<(usize, usize, Vec<f32>)> {
    let corrupt = |msg: String| Error::IndexCorrupt(format!("{VECTORS_FILE}: {msg}"));

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("truncated header ({} bytes)", bytes.len())));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[0..8] != MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }
    let version = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {version}")));
    }
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header[12..20]);
    let count = usize::try_from(u64::from_le_bytes(count_bytes))
        .map_err(|_| corrupt("vector count overflows".to_string()))?;
    let dimension = u32::from_le_bytes([header[20], header[21], header[22], header[23]]) as usize;

    if count == 0 || dimension == 0 {
        return Err(corrupt(format!("empty index ({count} x {dimension})")));
    }
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("payload size overflows".to_string()))?;
    if payload.len() != expected {
        return Err(corrupt(format!(
            "expected {expected} payload bytes, found {}",
            payload.len()
        )));
    }

    let vectors = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((count, dimension, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMetadata;
    use tempfile::TempDir;

    fn sample_index() -> VectorIndex {
        let chunks = vec![
            Chunk {
                id: 0,
                text: "LIADTECH offers AI consulting.".to_string(),
                metadata: ChunkMetadata {
                    source: "about.txt".to_string(),
                    position: 0,
                },
            },
            Chunk {
                id: 1,
                text: "Contact: +33 633 324 384.".to_string(),
                metadata: ChunkMetadata {
                    source: "contact.txt".to_string(),
                    position: 0,
                },
            },
        ];
        let embeddings = vec![vec![0.6, 0.8, -0.0], vec![f32::MIN_POSITIVE, 1.0 / 3.0, 1e-30]];
        VectorIndex::build(chunks, embeddings).unwrap()
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let tmp = TempDir::new().unwrap();
        let index = sample_index();

        index.save(tmp.path()).unwrap();
        let loaded = VectorIndex::load(tmp.path()).unwrap();

        assert_eq!(loaded.chunks(), index.chunks());
        assert_eq!(loaded.dimension(), 3);
        let bits = |v: &VectorIndex| v.vectors.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&loaded), bits(&index));
    }

    #[test]
    fn test_no_tmp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        sample_index().save(tmp.path()).unwrap();

        let mut names: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec![CHUNKS_FILE, VECTORS_FILE]);
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample_index().encode_vectors();
        assert_eq!(&bytes[0..8], b"LRAGVEC1");
        assert_eq!(bytes.len(), HEADER_LEN + 2 * 3 * 4);
        assert_eq!(u64::from_le_bytes(bytes[12..20].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 3);
    }

    #[test]
    fn test_missing_vectors_file() {
        let tmp = TempDir::new().unwrap();
        sample_index().save(tmp.path()).unwrap();
        fs::remove_file(tmp.path().join(VECTORS_FILE)).unwrap();

        let err = VectorIndex::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::IndexMissing(_)), "{err}");
    }

    #[test]
    fn test_missing_chunks_file() {
        let tmp = TempDir::new().unwrap();
        sample_index().save(tmp.path()).unwrap();
        fs::remove_file(tmp.path().join(CHUNKS_FILE)).unwrap();

        let err = VectorIndex::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::IndexMissing(_)), "{err}");
    }

    #[test]
    fn test_truncated_payload() {
        let tmp = TempDir::new().unwrap();
        sample_index().save(tmp.path()).unwrap();
        let path = tmp.path().join(VECTORS_FILE);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

        let err = VectorIndex::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::IndexCorrupt(_)), "{err}");
    }

    #[test]
    fn test_bad_magic() {
        let tmp = TempDir::new().unwrap();
        sample_index().save(tmp.path()).unwrap();
        let path = tmp.path().join(VECTORS_FILE);
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] = b'X';
        fs::write(&path, &bytes).unwrap();

        let err = VectorIndex::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::IndexCorrupt(_)), "{err}");
    }

    #[test]
    fn test_invalid_chunks_json() {
        let tmp = TempDir::new().unwrap();
        sample_index().save(tmp.path()).unwrap();
        fs::write(tmp.path().join(CHUNKS_FILE), b"{not json").unwrap();

        let err = VectorIndex::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::IndexCorrupt(_)), "{err}");
    }

    #[test]
    fn test_tmp_path_appends_suffix() {
        let path = Path::new("/data/index/vectors.bin");
        assert_eq!(tmp_path(path), PathBuf::from("/data/index/vectors.bin.tmp"));
    }
}
