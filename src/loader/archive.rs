use crate::loader::LoaderError;
use crate::options::DecodeOptions;
use std::io::{Read, Seek};
use tracing::debug;
use zip::ZipArchive;

pub const NO_PARAMS_MARKER: &str = "noParams.marker";
pub const UPDATER_STATE: &str = "updaterState.bin";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Entries pulled out of a zip container.
#[derive(Debug, Clone, Default)]
pub struct ArchiveEntries {
    pub config_name: String,
    pub config_text: String,
    /// Raw `coefficients.bin`, when present.
    pub coefficients: Option<Vec<u8>>,
    pub no_params_marker: bool,
    pub has_updater_state: bool,
}

/// True for `.zip` file names or buffers starting with a zip local header.
pub fn is_zip(file_name: &str, bytes: &[u8]) -> bool {
    file_name.to_ascii_lowercase().ends_with(".zip") || bytes.starts_with(ZIP_MAGIC)
}

pub fn read_archive<R: Read + Seek>(reader: R, options: &DecodeOptions) -> Result<ArchiveEntries, LoaderError> {
    let mut archive = ZipArchive::new(reader)?;

    let mut config_name: Option<String> = None;
    let mut fallback_json: Option<String> = None;
    let mut entries = ArchiveEntries::default();

    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        let name = file.name().to_string();
        if file.is_dir() {
            continue;
        }
        if name == options.configuration_entry {
            config_name = Some(name.clone());
        } else if fallback_json.is_none() && name.to_ascii_lowercase().ends_with(".json") {
            fallback_json = Some(name.clone());
        }
        if name == options.coefficients_entry {
            entries.coefficients = Some(Vec::new());
        }
        entries.no_params_marker |= name == NO_PARAMS_MARKER;
        entries.has_updater_state |= name == UPDATER_STATE;
    }

    if entries.coefficients.is_some() {
        let blob = read_entry(archive.by_name(&options.coefficients_entry)?, options.max_entry_bytes)?;
        entries.coefficients = Some(blob);
    }

    let config_name = config_name.or(fallback_json).ok_or(LoaderError::MissingConfiguration)?;
    let raw = read_entry(archive.by_name(&config_name)?, options.max_entry_bytes)?;
    entries.config_text = String::from_utf8(raw)
        .map_err(|e| LoaderError::InvalidFormat(format!("{} is not UTF-8: {}", config_name, e)))?;
    entries.config_name = config_name;

    debug!(
        config = %entries.config_name,
        coefficients = entries.coefficients.as_ref().map(Vec::len),
        no_params = entries.no_params_marker,
        updater_state = entries.has_updater_state,
        "read model archive"
    );
    Ok(entries)
}

/// Reads at most `limit` bytes of an entry. The size declared in the
/// central directory is not trusted for allocation.
fn read_entry<R: Read>(file: R, limit: u64) -> Result<Vec<u8>, LoaderError> {
    let mut buf = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut buf)?;
    if buf.len() as u64 > limit {
        return Err(LoaderError::InvalidFormat(format!("zip entry exceeds {} bytes", limit)));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            if name.ends_with('/') {
                writer.add_directory(*name, FileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, FileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_reads_known_entries() {
        let bytes = zip_of(&[
            ("configuration.json", b"{}"),
            ("coefficients.bin", &[1, 2, 3, 4]),
            ("updaterState.bin", b""),
        ]);

        let entries = read_archive(Cursor::new(bytes), &DecodeOptions::default()).unwrap();

        assert_eq!(entries.config_name, "configuration.json");
        assert_eq!(entries.config_text, "{}");
        assert_eq!(entries.coefficients, Some(vec![1, 2, 3, 4]));
        assert!(entries.has_updater_state);
        assert!(!entries.no_params_marker);
    }

    #[test]
    fn test_falls_back_to_first_json_entry() {
        let bytes = zip_of(&[
            ("meta/", b""),
            ("noParams.marker", b""),
            ("model.JSON", b"{\"a\":1}"),
            ("other.json", b"{}"),
        ]);

        let entries = read_archive(Cursor::new(bytes), &DecodeOptions::default()).unwrap();

        assert_eq!(entries.config_name, "model.JSON");
        assert!(entries.no_params_marker);
        assert!(entries.coefficients.is_none());
    }

    #[test]
    fn test_missing_configuration_is_fatal() {
        let bytes = zip_of(&[("coefficients.bin", &[0u8; 8])]);

        let result = read_archive(Cursor::new(bytes), &DecodeOptions::default());

        assert!(matches!(result, Err(LoaderError::MissingConfiguration)));
    }

    #[test]
    fn test_corrupt_container_is_fatal() {
        let result = read_archive(Cursor::new(b"PK\x03\x04garbage".to_vec()), &DecodeOptions::default());
        assert!(matches!(result, Err(LoaderError::Archive(_))));
    }

    #[test]
    fn test_oversized_entry_is_an_error() {
        let bytes = zip_of(&[("configuration.json", b"{}"), ("coefficients.bin", &[0u8; 16])]);
        let options = DecodeOptions {
            max_entry_bytes: 15,
            ..Default::default()
        };

        let result = read_archive(Cursor::new(bytes.clone()), &options);
        assert!(matches!(result, Err(LoaderError::InvalidFormat(msg)) if msg.contains("15 bytes")));

        let options = DecodeOptions {
            max_entry_bytes: 16,
            ..Default::default()
        };
        let entries = read_archive(Cursor::new(bytes), &options).unwrap();
        assert_eq!(entries.coefficients.map(|c| c.len()), Some(16));
    }

    #[test]
    fn test_read_entry_stops_at_limit() {
        let data = [7u8; 32];
        assert_eq!(read_entry(&data[..], 32).unwrap().len(), 32);
        assert!(read_entry(&data[..], 31).is_err());
    }

    #[test]
    fn test_is_zip() {
        assert!(is_zip("Model.ZIP", b"{"));
        assert!(is_zip("model.bin", b"PK\x03\x04rest"));
        assert!(!is_zip("model.json", b"{}"));
    }
}
