//! Object naming and content types.

use relay_models::{is_path_safe_job_id, is_valid_job_id, is_valid_output_format};
use sha2::{Digest, Sha256};

use crate::error::{StorageError, StorageResult};

/// Hex chars of the id digest used when an id is not path-safe.
const HASHED_ID_LEN: usize = 32;

/// Deterministic object name for a job's artifact: `{prefix}-{job_id}.{format}`.
///
/// The same inputs always produce the same name, so a repeated finalization
/// overwrites the same object instead of creating a second artifact.
/// Ids outside `[A-Za-z0-9_-]` are replaced by `h{sha256 prefix}`.
pub fn object_name(prefix: &str, job_id: &str, output_format: &str) -> StorageResult<String> {
    if !is_valid_job_id(job_id) {
        return Err(StorageError::invalid_key(format!("job id {:?}", job_id)));
    }
    if !is_valid_output_format(output_format) {
        return Err(StorageError::invalid_key(format!(
            "output format {:?}",
            output_format
        )));
    }

    let key = object_key_for(job_id);
    let format = output_format.to_ascii_lowercase();
    let prefix = prefix.trim_matches('-');
    if prefix.is_empty() {
        Ok(format!("{}.{}", key, format))
    } else {
        Ok(format!("{}-{}.{}", prefix, key, format))
    }
}

fn object_key_for(job_id: &str) -> String {
    if is_path_safe_job_id(job_id) {
        return job_id.to_string();
    }
    let digest = Sha256::digest(job_id.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("h{}", &hex[..HASHED_ID_LEN])
}

/// MIME type for an output format.
pub fn content_type_for(output_format: &str) -> &'static str {
    match output_format.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "aac" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name_is_deterministic() {
        let a = object_name("transcode", "J1", "mp3").unwrap();
        let b = object_name("transcode", "J1", "mp3").unwrap();
        assert_eq!(a, "transcode-J1.mp3");
        assert_eq!(a, b);
    }

    #[test]
    fn test_object_name_distinguishes_jobs_and_formats() {
        assert_ne!(
            object_name("transcode", "J1", "mp3").unwrap(),
            object_name("transcode", "J2", "mp3").unwrap()
        );
        assert_ne!(
            object_name("transcode", "J1", "mp3").unwrap(),
            object_name("transcode", "J1", "wav").unwrap()
        );
    }

    #[test]
    fn test_object_name_normalizes_format_case() {
        assert_eq!(object_name("out", "J1", "MP3").unwrap(), "out-J1.mp3");
    }

    #[test]
    fn test_object_name_without_prefix() {
        assert_eq!(object_name("", "J1", "mp3").unwrap(), "J1.mp3");
    }

    #[test]
    fn test_object_name_hashes_ids_that_are_not_path_safe() {
        let name = object_name("transcode", "job.2024:abc", "mp3").unwrap();
        assert!(name.starts_with("transcode-h"));
        assert!(name.ends_with(".mp3"));
        assert_eq!(name.len(), "transcode-h".len() + HASHED_ID_LEN + ".mp3".len());
        assert!(!name.contains(':'));
        assert_eq!(name, object_name("transcode", "job.2024:abc", "mp3").unwrap());

        let traversal = object_name("transcode", "../J1", "mp3").unwrap();
        assert!(!traversal.contains('/'));
        assert_ne!(traversal, object_name("transcode", "J1", "mp3").unwrap());
    }

    #[test]
    fn test_object_name_rejects_unsafe_input() {
        assert!(object_name("transcode", "J1", "mp3/x").is_err());
        assert!(object_name("transcode", "", "mp3").is_err());
        assert!(object_name("transcode", "has space", "mp3").is_err());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("mp3"), "audio/mpeg");
        assert_eq!(content_type_for("MP4"), "video/mp4");
        assert_eq!(content_type_for("xyz"), "application/octet-stream");
    }
}
