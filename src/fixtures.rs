use include_dir::{include_dir, Dir};
use serde::de::DeserializeOwned;
use serde_json::from_str;
use std::fs;
use std::path::Path;

use crate::error::{QuizError, Result};

static DATA_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/data");

pub const COURSES: &str = "courses.json";
pub const LESSONS: &str = "lessons.json";
pub const ENROLLMENTS: &str = "enrollments.json";

/// Deserialize one of the fixtures compiled into the binary
pub fn read_embedded<T: DeserializeOwned>(file_name: &str) -> Result<T> {
    let file = DATA_DIR
        .get_file(file_name)
        .ok_or_else(|| QuizError::MissingFixture(file_name.to_string()))?;

    let contents = file
        .contents_utf8()
        .ok_or_else(|| QuizError::MissingFixture(file_name.to_string()))?;

    parse(file_name, contents)
}

/// Deserialize a fixture from a catalog directory on disk
pub fn read_from_dir<T: DeserializeOwned>(dir: &Path, file_name: &str) -> Result<T> {
    let path = dir.join(file_name);
    if !path.exists() {
        return Err(QuizError::MissingFixture(path.display().to_string()));
    }
    let contents = fs::read_to_string(&path)?;
    parse(file_name, &contents)
}

fn parse<T: DeserializeOwned>(name: &str, contents: &str) -> Result<T> {
    from_str(contents).map_err(|source| QuizError::Fixture {
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::Value;
    use tempfile::tempdir;

    #[test]
    fn test_read_embedded_courses() {
        let courses: Vec<Value> = read_embedded(COURSES).unwrap();
        assert!(!courses.is_empty());
    }

    #[test]
    fn test_read_embedded_missing() {
        let result: Result<Vec<Value>> = read_embedded("nonexistent.json");
        assert_matches!(result, Err(QuizError::MissingFixture(name)) if name == "nonexistent.json");
    }

    #[test]
    fn test_read_from_dir_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(COURSES), "{ not json").unwrap();
        let result: Result<Vec<Value>> = read_from_dir(dir.path(), COURSES);
        assert_matches!(result, Err(QuizError::Fixture { name, .. }) if name == COURSES);
    }

    #[test]
    fn test_read_from_dir_missing_file() {
        let dir = tempdir().unwrap();
        let result: Result<Vec<Value>> = read_from_dir(dir.path(), LESSONS);
        assert_matches!(result, Err(QuizError::MissingFixture(_)));
    }
}
