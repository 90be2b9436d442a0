// The fixed C runtime header distributed alongside emitted code:
// reference-counted string/array/hash primitives, the boxed ZnValue,
// default hash/equals callbacks, and the primitive optional records.
// The compiler core only targets this contract; the header is shipped
// as an embedded asset and copied next to the generated files.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name the generated `#include` refers to.
pub const RUNTIME_HEADER_NAME: &str = "zinc_runtime.h";

/// The full header text, embedded at build time.
pub const RUNTIME_HEADER: &str = include_str!("../assets/zinc_runtime.h");

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to write runtime header to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Copy the runtime header into `dir`, returning the written path. The
/// file is rewritten unconditionally so stale copies from older compiler
/// versions never linger.
pub fn write_runtime_header(dir: &Path) -> Result<PathBuf, RuntimeError> {
    let path = dir.join(RUNTIME_HEADER_NAME);
    log::debug!("writing runtime header to {}", path.display());
    std::fs::write(&path, RUNTIME_HEADER).map_err(|source| RuntimeError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_contains_contract_symbols() {
        for symbol in [
            "ZnString",
            "ZnValue",
            "ZnArray",
            "ZnHash",
            "ZnOpt_int",
            "__zn_str_concat",
            "__zn_str_from_int",
            "__zn_arr_alloc",
            "__zn_hash_alloc",
            "__zn_default_hashcode",
            "__zn_default_equals",
        ] {
            assert!(
                RUNTIME_HEADER.contains(symbol),
                "runtime header is missing {}",
                symbol
            );
        }
    }

    #[test]
    fn test_write_runtime_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_runtime_header(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), RUNTIME_HEADER_NAME);
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, RUNTIME_HEADER);
    }
}
