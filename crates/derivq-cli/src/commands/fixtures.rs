//! Shared test fixtures for command tests.

use std::path::{Path, PathBuf};

pub const FIXTURE: &str = r#"{
  "entities": [
    {"entity_type": "node", "id": "1", "bundle": "repository_item",
     "fields": {"field_media": [{"entity_type": "media", "id": "10"}]}},
    {"entity_type": "media", "id": "10", "bundle": "image",
     "fields": {
       "field_media_of": [{"entity_type": "node", "id": "1"}],
       "field_media_use": [{"entity_type": "taxonomy_term", "id": "1"}],
       "field_media_image": [{"entity_type": "file", "id": "100"}]
     }}
  ],
  "reference_fields": {
    "node": [{"name": "field_media", "target_type": "media"}],
    "media": [
      {"name": "field_media_of", "target_type": "node"},
      {"name": "field_media_use", "target_type": "taxonomy_term"},
      {"name": "field_media_image", "target_type": "file"}
    ]
  },
  "terms": [
    {"id": "1", "name": "Original File", "uri": "http://pcdm.org/use#OriginalFile"},
    {"id": "2", "name": "Service File", "uri": "http://pcdm.org/use#ServiceFile"}
  ],
  "files": [
    {"id": "100", "uri": "public://postcard.tiff",
     "url": "http://localhost:8000/files/postcard.tiff"}
  ],
  "principal": {"id": "1", "name": "admin", "uri": "http://localhost:8000/user/1"}
}"#;

pub fn task_config(derivative_term_uri: &str) -> String {
    format!(
        r#"
[site]
base_url = "http://localhost:8000"

[[tasks]]
name = "service-file"
source_term_uri = "http://pcdm.org/use#OriginalFile"
derivative_term_uri = "{derivative_term_uri}"

[[tasks]]
name = "thumbnail"
strategy = "field_mapping"
source_field = "field_media"
destination_field = "field_media"
bundle = "image"
"#
    )
}

/// Writes `derivq.toml` and `fixture.json` into `dir`.
pub fn write(dir: &Path, config: &str) -> (PathBuf, PathBuf) {
    let config_path = dir.join("derivq.toml");
    let fixture_path = dir.join("fixture.json");
    std::fs::write(&config_path, config).unwrap();
    std::fs::write(&fixture_path, FIXTURE).unwrap();
    (config_path, fixture_path)
}
