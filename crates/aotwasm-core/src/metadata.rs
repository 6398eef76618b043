//! Module metadata views.
//!
//! A metadata view identifies a precompiled module by reference instead of
//! carrying its contents. Bundlers ship it in place of the `.wasm` binary so
//! the host does not need to embed the (large) original module.
//!
//! # Layout
//!
//! ```text
//! offset  size  field
//! 0       6     magic "CKWASM"
//! 6       1     version (1)
//! 7       65    checksum: 64 lowercase hex chars + NUL
//! 72      2     name length, little-endian u16
//! 74      n     name, UTF-8
//! ```

use tracing::debug;

use aotwasm_common::RuntimeError;

use crate::checksum::{CHECKSUM_HEX_LEN, Checksum};

/// Magic prefix of every metadata view.
pub const METADATA_MAGIC: [u8; 6] = *b"CKWASM";

/// Layout version written by [`ModuleMetadataView::encode`].
pub const METADATA_VERSION: u8 = 1;

const VERSION_OFFSET: usize = METADATA_MAGIC.len();
const CHECKSUM_OFFSET: usize = VERSION_OFFSET + 1;
const CHECKSUM_FIELD_LEN: usize = CHECKSUM_HEX_LEN + 1;
const NAME_LEN_OFFSET: usize = CHECKSUM_OFFSET + CHECKSUM_FIELD_LEN;
const NAME_OFFSET: usize = NAME_LEN_OFFSET + 2;

/// A decoded metadata view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMetadataView {
    version: u8,
    name: String,
    checksum: Checksum,
}

impl ModuleMetadataView {
    /// Returns `true` if `bytes` start with the metadata magic.
    ///
    /// Only the first six bytes are inspected, so this is safe to call on
    /// arbitrary module contents.
    pub fn is_metadata(bytes: &[u8]) -> bool {
        bytes.len() >= METADATA_MAGIC.len() && bytes[..METADATA_MAGIC.len()] == METADATA_MAGIC
    }

    /// Decode a metadata view.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidMetadata`] if the magic is missing, the
    /// buffer is truncated, the version is unsupported, or a field is
    /// malformed.
    pub fn decode(bytes: &[u8]) -> Result<Self, RuntimeError> {
        if !Self::is_metadata(bytes) {
            return Err(RuntimeError::invalid_metadata("missing magic number"));
        }
        if bytes.len() < NAME_OFFSET {
            return Err(RuntimeError::invalid_metadata(format!(
                "truncated header: {} bytes, expected at least {NAME_OFFSET}",
                bytes.len()
            )));
        }

        let version = bytes[VERSION_OFFSET];
        if version != METADATA_VERSION {
            return Err(RuntimeError::invalid_metadata(format!(
                "unsupported version {version}"
            )));
        }

        let checksum_field = &bytes[CHECKSUM_OFFSET..NAME_LEN_OFFSET];
        if checksum_field[CHECKSUM_HEX_LEN] != 0 {
            return Err(RuntimeError::invalid_metadata(
                "checksum is not NUL-terminated",
            ));
        }
        let checksum = std::str::from_utf8(&checksum_field[..CHECKSUM_HEX_LEN])
            .ok()
            .and_then(|hex| Checksum::from_hex(hex).ok())
            .ok_or_else(|| RuntimeError::invalid_metadata("checksum is not a hex digest"))?;

        let name_len =
            usize::from(u16::from_le_bytes([bytes[NAME_LEN_OFFSET], bytes[NAME_LEN_OFFSET + 1]]));
        let name_bytes = bytes
            .get(NAME_OFFSET..NAME_OFFSET + name_len)
            .ok_or_else(|| {
                RuntimeError::invalid_metadata(format!(
                    "truncated name: declared {name_len} bytes, {} available",
                    bytes.len() - NAME_OFFSET
                ))
            })?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| RuntimeError::invalid_metadata("name is not valid UTF-8"))?
            .to_string();

        if bytes.len() > NAME_OFFSET + name_len {
            debug!(
                trailing = bytes.len() - NAME_OFFSET - name_len,
                "Ignoring trailing bytes after metadata"
            );
        }

        Ok(Self {
            version,
            name,
            checksum,
        })
    }

    /// Encode a metadata view for `name` and `checksum`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidArgument`] if the name is longer than
    /// `u16::MAX` bytes.
    pub fn encode(name: &str, checksum: &Checksum) -> Result<Vec<u8>, RuntimeError> {
        let name_len = u16::try_from(name.len()).map_err(|_| {
            RuntimeError::invalid_argument(format!(
                "module name is {} bytes, at most {} allowed",
                name.len(),
                u16::MAX
            ))
        })?;

        let mut out = Vec::with_capacity(NAME_OFFSET + name.len());
        out.extend_from_slice(&METADATA_MAGIC);
        out.push(METADATA_VERSION);
        out.extend_from_slice(checksum.as_str().as_bytes());
        out.push(0);
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(name.as_bytes());

        Ok(out)
    }

    /// The layout version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The precompiled module's registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The checksum the bundler recorded for the module.
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Split into `(name, checksum)`.
    pub fn into_parts(self) -> (String, Checksum) {
        (self.name, self.checksum)
    }
}
