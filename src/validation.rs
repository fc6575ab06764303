use std::path::Path;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileRejected {
    #[error("file is {size} bytes, limit is {max}")]
    TooLarge { size: u64, max: u64 },
    #[error("extension `{0}` is not allowed")]
    UnsupportedFormat(String),
}

/// Accepts a file only if it fits the size limit and its extension is on the
/// allow-list (compared case-insensitively, allow-list entries include the dot).
pub fn validate_file(
    filename: &str,
    size: u64,
    allowed_formats: &[String],
    max_size: u64,
) -> Result<(), FileRejected> {
    if size > max_size {
        return Err(FileRejected::TooLarge {
            size,
            max: max_size,
        });
    }

    let extension = extension_of(filename).to_ascii_lowercase();
    if allowed_formats.iter().any(|allowed| *allowed == extension) {
        Ok(())
    } else {
        Err(FileRejected::UnsupportedFormat(extension))
    }
}

pub fn generate_unique_filename(original: &str) -> String {
    let (stem, extension) = split_name(original);
    format!("{}_{}{}", stem, Uuid::new_v4().simple(), extension)
}

pub fn generate_processed_filename(original: &str) -> String {
    let (stem, extension) = split_name(original);
    format!("{}_processed_{}{}", stem, Uuid::new_v4().simple(), extension)
}

pub fn generate_job_id() -> String {
    format!("job_{}", Uuid::new_v4().simple())
}

/// `".png"` for `"a.png"`, `""` when there is no extension.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

fn split_name(filename: &str) -> (&str, String) {
    let extension = extension_of(filename);
    let stem = &filename[..filename.len() - extension.len()];
    (stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec![".jpg".into(), ".jpeg".into(), ".png".into(), ".gif".into()]
    }

    #[test]
    fn accepts_allowed_extensions_case_insensitively() {
        assert_eq!(validate_file("cat.png", 10, &allowed(), 100), Ok(()));
        assert_eq!(validate_file("CAT.JPG", 10, &allowed(), 100), Ok(()));
    }

    #[test]
    fn rejects_extensions_off_the_allow_list() {
        assert_eq!(
            validate_file("notes.txt", 10, &allowed(), 100),
            Err(FileRejected::UnsupportedFormat(".txt".into()))
        );
        assert_eq!(
            validate_file("no_extension", 10, &allowed(), 100),
            Err(FileRejected::UnsupportedFormat(String::new()))
        );
    }

    #[test]
    fn rejects_oversized_files() {
        assert_eq!(
            validate_file("big.png", 101, &allowed(), 100),
            Err(FileRejected::TooLarge { size: 101, max: 100 })
        );
    }

    #[test]
    fn generated_names_keep_stem_and_extension() {
        let unique = generate_unique_filename("holiday.photo.jpg");
        let processed = generate_processed_filename("holiday.jpg");

        assert!(unique.starts_with("holiday.photo_"));
        assert!(unique.ends_with(".jpg"));
        assert!(processed.starts_with("holiday_processed_"));
        assert!(processed.ends_with(".jpg"));
        assert_ne!(generate_unique_filename("a.png"), generate_unique_filename("a.png"));
    }

    #[test]
    fn job_ids_are_unique() {
        let a = generate_job_id();
        let b = generate_job_id();

        assert!(a.starts_with("job_"));
        assert_ne!(a, b);
    }
}
