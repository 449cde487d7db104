use crate::error::{Result, UpdaterError};
use crate::plan::{UpdatePlan, UpdateTarget};
use std::io::{Cursor, Read};
use zip::result::ZipError;
use zip::ZipArchive;

/// Largest decompressed entry that will be read into memory (256 MiB).
const MAX_ENTRY_BYTES: u64 = 1 << 28;

/// A binary and its detached signature, taken from one release archive.
#[derive(Clone)]
pub struct ExtractedUpdate {
    pub target: UpdateTarget,
    pub binary: Vec<u8>,
    pub signature: Vec<u8>,
    /// Base name of the payload entry (`noded` or `noded.exe`), used as the
    /// on-disk file name.
    pub file_name: String,
}

impl std::fmt::Debug for ExtractedUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedUpdate")
            .field("target", &self.target)
            .field("file_name", &self.file_name)
            .field("binary_len", &self.binary.len())
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

/// Random-access view over a downloaded release archive held in memory.
pub struct ReleaseArchive {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ReleaseArchive {
    /// Open the downloaded bytes as a zip archive.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self { archive })
    }

    /// Number of entries, directories included.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Extract every target of `plan`, in order. Fails on the first target
    /// whose payload or signature is missing, before anything is written.
    pub fn extract_plan(&mut self, plan: &UpdatePlan) -> Result<Vec<ExtractedUpdate>> {
        plan.targets()
            .iter()
            .map(|target| self.extract(target))
            .collect()
    }

    /// Locate the payload and signature for `target`, matching entries by
    /// base name at any directory depth.
    pub fn extract(&mut self, target: &UpdateTarget) -> Result<ExtractedUpdate> {
        let binary_names = target.binary_names();
        let signature_names = target.signature_names();

        let mut binary: Option<(usize, String)> = None;
        let mut signature: Option<usize> = None;
        // Only names are inspected here; entries are opened in `read_entry`,
        // so unrelated entries with unsupported compression are never decoded.
        for index in 0..self.archive.len() {
            let Some(name) = self.archive.name_for_index(index) else {
                continue;
            };
            if name.ends_with('/') {
                continue;
            }
            let base = base_name(name);
            if binary_names.iter().any(|name| name == base) {
                if binary.is_some() {
                    return Err(duplicate(target, base));
                }
                binary = Some((index, base.to_string()));
            } else if signature_names.iter().any(|name| name == base) {
                if signature.is_some() {
                    return Err(duplicate(target, base));
                }
                signature = Some(index);
            }
        }

        let (binary_index, file_name) =
            binary.ok_or_else(|| UpdaterError::MissingBinary(target.to_string()))?;
        let signature_index =
            signature.ok_or_else(|| UpdaterError::MissingSignature(target.to_string()))?;

        Ok(ExtractedUpdate {
            target: target.clone(),
            binary: self.read_entry(binary_index)?,
            signature: self.read_entry(signature_index)?,
            file_name,
        })
    }

    fn read_entry(&mut self, index: usize) -> Result<Vec<u8>> {
        let entry = self.archive.by_index(index)?;
        let name = entry.name().to_string();
        let mut content = Vec::new();
        entry
            .take(MAX_ENTRY_BYTES + 1)
            .read_to_end(&mut content)
            .map_err(|err| UpdaterError::ArchiveFormat(ZipError::Io(err)))?;
        if content.len() as u64 > MAX_ENTRY_BYTES {
            return Err(UpdaterError::validation(format!(
                "archive entry {name} exceeds {MAX_ENTRY_BYTES} bytes"
            )));
        }
        Ok(content)
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn duplicate(target: &UpdateTarget, name: &str) -> UpdaterError {
    UpdaterError::DuplicateEntry {
        target: target.to_string(),
        name: name.to_string(),
    }
}
