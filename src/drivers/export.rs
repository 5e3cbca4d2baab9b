use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use crate::drivers::store::Sample;
use crate::drivers::LinkError;
pub const DEFAULT_FILE_NAME: &str = "data.txt";
pub const MIME_TYPE: &str = "text/plain";
/// Renders samples as `<index>,<value>\n` lines, no header.
///
/// Values use the shortest decimal form that parses back to the same `f64`.
pub fn render(samples: &[Sample]) -> String {
    let mut out = String::with_capacity(samples.len() * 12);
    for sample in samples {
        let _ = writeln!(out, "{},{}", sample.index, sample.value);
    }
    out
}
/// Writes `contents` to `dir/file_name` all-or-nothing: the data goes to a
/// temporary file in the same directory which is then renamed over the
/// target. On failure the target is left untouched.
pub fn write_atomically(
    dir: &Path,
    file_name: &str,
    contents: &[u8],
) -> Result<PathBuf, LinkError> {
    let target = dir.join(file_name);
    let export_err = |source| LinkError::Export {
        path: target.clone(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(export_err)?;
    tmp.write_all(contents).map_err(export_err)?;
    tmp.as_file().sync_all().map_err(export_err)?;
    tmp.persist(&target).map_err(|e| export_err(e.error))?;
    log::info!("exported {} bytes to {}", contents.len(), target.display());
    Ok(target)
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn empty_sequence_renders_nothing() {
        assert_eq!(render(&[]), "");
    }
    #[test]
    fn renders_index_value_lines() {
        let samples = [
            Sample { index: 0, value: 1.5 },
            Sample { index: 1, value: 2.25 },
        ];
        assert_eq!(render(&samples), "0,1.5\n1,2.25\n");
    }
    #[test]
    fn whole_numbers_and_negatives() {
        let samples = [
            Sample { index: 0, value: 512.0 },
            Sample { index: 1, value: -0.125 },
        ];
        assert_eq!(render(&samples), "0,512\n1,-0.125\n");
    }
    #[test]
    fn writes_and_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_atomically(dir.path(), DEFAULT_FILE_NAME, b"0,1\n").unwrap();
        assert_eq!(path, dir.path().join("data.txt"));
        write_atomically(dir.path(), DEFAULT_FILE_NAME, b"0,2\n1,3\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0,2\n1,3\n");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
    #[test]
    fn missing_directory_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = write_atomically(&missing, DEFAULT_FILE_NAME, b"0,1\n").unwrap_err();
        assert!(matches!(err, LinkError::Export { ref path, .. } if path == &missing.join("data.txt")));
        assert!(!missing.exists());
    }
}
