use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::BridgeError;

use super::transform::DestinationDocument;

pub const ACHIEVEMENTS_FILE: &str = "achievements.json";
const TEMP_SUFFIX: &str = "tmp";

/// `<base>/<destination_id>/achievements.json`
pub fn destination_path(base: &Path, destination_id: &str) -> PathBuf {
    base.join(destination_id).join(ACHIEVEMENTS_FILE)
}

/// Serializes with four-space indentation, matching what Goldberg writes itself.
pub fn to_pretty_json(doc: &DestinationDocument) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    doc.serialize(&mut ser)?;
    Ok(buf)
}

/// Replaces the destination file in one step: the document goes to a sibling
/// temp file which is then renamed over the target, so readers only ever see
/// the old or the new content.
pub async fn write_destination(
    base: &Path,
    destination_id: &str,
    doc: &DestinationDocument,
) -> Result<PathBuf, BridgeError> {
    let path = destination_path(base, destination_id);
    let write_err = |source: std::io::Error| BridgeError::Write {
        path: path.clone(),
        source,
    };

    let bytes = to_pretty_json(doc).map_err(|err| write_err(err.into()))?;

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(write_err)?;
    }

    let tmp = path.with_extension(format!("json.{TEMP_SUFFIX}"));
    tokio::fs::write(&tmp, &bytes).await.map_err(write_err)?;
    if let Err(err) = tokio::fs::rename(&tmp, &path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(write_err(err));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::transform::EarnedAchievement;

    fn doc(entries: &[(&str, i64)]) -> DestinationDocument {
        entries
            .iter()
            .map(|(name, time)| {
                (
                    name.to_string(),
                    EarnedAchievement {
                        earned: true,
                        earned_time: *time,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn pretty_json_uses_four_spaces() {
        let text = String::from_utf8(to_pretty_json(&doc(&[("ach1", 5)])).unwrap()).unwrap();
        assert_eq!(
            text,
            "{\n    \"ach1\": {\n        \"earned\": true,\n        \"earned_time\": 5\n    }\n}"
        );
    }

    #[tokio::test]
    async fn creates_profile_directory_and_overwrites() {
        let base = tempfile::tempdir().unwrap();

        let first = write_destination(base.path(), "999", &doc(&[("a", 1)])).await.unwrap();
        assert_eq!(first, base.path().join("999").join("achievements.json"));

        let second = write_destination(base.path(), "999", &doc(&[("a", 1), ("b", 2)]))
            .await
            .unwrap();
        assert_eq!(first, second);

        let written: DestinationDocument =
            serde_json::from_slice(&std::fs::read(&second).unwrap()).unwrap();
        assert_eq!(written, doc(&[("a", 1), ("b", 2)]));
    }

    #[tokio::test]
    async fn leaves_no_temp_file_behind() {
        let base = tempfile::tempdir().unwrap();
        write_destination(base.path(), "42", &doc(&[("a", 1)])).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(base.path().join("42"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("achievements.json")]);
    }
}
