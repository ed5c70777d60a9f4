//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rtx.
//! The Rtx project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! Module images.
//!
//! A module image is a ZIP archive whose directory doubles as the header
//! table. The `module.json` entry carries identity, references and declared
//! attributes; an optional native library entry carries the code. Reading an
//! image never links or runs anything.

use std::fs;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::errors::{Result, RtError};
use crate::module::attributes::RtModuleMetadata;

/// Name of the metadata entry inside a module image.
pub const METADATA_ENTRY: &str = "module.json";

/// Cloned bytes of one module binary. Clones share the buffer.
#[derive(Clone, Debug)]
pub struct RtModuleImage {
    bytes: Arc<[u8]>,
    path: Option<PathBuf>,
    fingerprint: String,
}

impl RtModuleImage {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, path: Option<PathBuf>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let fingerprint = blake3::hash(&bytes).to_hex().to_string();
        RtModuleImage {
            bytes: Arc::from(bytes),
            path,
            fingerprint,
        }
    }

    /// Copy the remainder of `stream` and rewind it to where it was, so the
    /// caller can still read the same bytes afterwards.
    pub fn read_from<R: Read + Seek>(stream: &mut R, path: Option<&Path>) -> Result<Self> {
        let start = stream.stream_position()?;
        let mut bytes = Vec::new();
        let read = stream.read_to_end(&mut bytes);
        stream.seek(SeekFrom::Start(start))?;
        read?;
        Ok(Self::from_bytes(bytes, path.map(Path::to_path_buf)))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self::from_bytes(bytes, Some(path.to_path_buf())))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Path for messages; in-memory images render as `<memory>`.
    pub fn display_path(&self) -> String {
        match &self.path {
            Some(p) => p.display().to_string(),
            None => "<memory>".to_string(),
        }
    }

    /// BLAKE3 hex digest of the image bytes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<&[u8]>>> {
        ZipArchive::new(Cursor::new(&self.bytes[..]))
            .map_err(|e| RtError::bad_image(self.display_path(), format!("unreadable archive: {}", e)))
    }

    pub fn entry_names(&self) -> Result<Vec<String>> {
        let archive = self.archive()?;
        Ok(archive.file_names().map(str::to_string).collect())
    }

    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = self.archive()?;
        let mut file = archive.by_name(name).map_err(|e| {
            RtError::bad_image(self.display_path(), format!("missing entry '{}': {}", name, e))
        })?;
        let mut out = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Decode the metadata entry.
    pub fn metadata(&self) -> Result<RtModuleMetadata> {
        let raw = self.read_entry(METADATA_ENTRY)?;
        serde_json::from_slice(&raw).map_err(|e| {
            RtError::bad_image(
                self.display_path(),
                format!("malformed {}: {}", METADATA_ENTRY, e),
            )
        })
    }

    /// Build an image from metadata and extra entries (for example a native
    /// library). Used by packaging tools and tests.
    pub fn pack(metadata: &RtModuleMetadata, entries: &[(&str, &[u8])]) -> Result<Self> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();

        writer.start_file(METADATA_ENTRY, options)?;
        writer.write_all(&serde_json::to_vec_pretty(metadata)?)?;
        for (name, data) in entries {
            if *name == METADATA_ENTRY {
                return Err(RtError::validation(format!(
                    "entry name '{}' is reserved",
                    METADATA_ENTRY
                )));
            }
            writer.start_file(*name, options)?;
            writer.write_all(data)?;
        }
        let cursor = writer.finish()?;
        Ok(Self::from_bytes(cursor.into_inner(), None))
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.bytes[..])?;
        Ok(())
    }
}
