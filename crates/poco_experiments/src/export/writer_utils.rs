use std::fs::{self, File};
use std::path::Path;

use super::ExportError;

pub(crate) fn ensure_not_empty<T>(items: &[T]) -> Result<(), ExportError> {
    if items.is_empty() {
        return Err(ExportError::Empty);
    }

    Ok(())
}

/// Create the output file, creating missing parent directories first.
pub(crate) fn create_output_file(path: impl AsRef<Path>) -> Result<File, ExportError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

pub(crate) fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
