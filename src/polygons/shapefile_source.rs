use geojson::{Feature, JsonObject};
use serde_json::Value;
use shapefile::dbase::{Date, FieldValue};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

use crate::polygons::geometry::feature;

const NAME_FIELD: &str = "sci_name";

#[derive(Debug, thiserror::Error)]
pub enum ShapefileError {
    #[error("No shapefiles found in {0}")]
    NoShapefiles(PathBuf),
    #[error("Failed to read shapefile directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// IUCN range shapefiles in a local directory
#[derive(Debug, Clone)]
pub struct ShapefileSource {
    dir: PathBuf,
}

impl ShapefileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Features of the first shapefile (in file-name order) whose `sci_name`
    /// equals `species`, compared trimmed and case-insensitively.
    ///
    /// Blocking; run it on a blocking thread from async code.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn find_species(&self, species: &str) -> Result<Vec<Feature>, ShapefileError> {
        let wanted = species.trim().to_lowercase();
        let shapefiles = self.list_shapefiles()?;
        if shapefiles.is_empty() {
            return Err(ShapefileError::NoShapefiles(self.dir.clone()));
        }

        for path in shapefiles {
            match read_matching_features(&path, &wanted) {
                Ok(features) if !features.is_empty() => {
                    debug!("Found {} features in {}", features.len(), path.display());
                    return Ok(features);
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("Error reading {}: {}", path.display(), e);
                    continue;
                }
            }
        }

        Ok(Vec::new())
    }

    fn list_shapefiles(&self) -> Result<Vec<PathBuf>, ShapefileError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| ShapefileError::Directory {
            path: self.dir.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("shp"))
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

fn read_matching_features(path: &Path, wanted: &str) -> Result<Vec<Feature>, shapefile::Error> {
    let mut reader = shapefile::Reader::from_path(path)?;
    let source_name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();

    let mut features = Vec::new();
    for item in reader.iter_shapes_and_records() {
        let (shape, record) = item?;

        let Some(FieldValue::Character(Some(name))) = record.get(NAME_FIELD) else {
            continue;
        };
        if name.trim().to_lowercase() != wanted {
            continue;
        }
        let name = name.trim().to_string();

        let geometry = match geo_types::Geometry::<f64>::try_from(shape) {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!("Skipping {} feature without usable geometry: {:?}", name, e);
                continue;
            }
        };

        // Every DBF attribute becomes a property
        let mut properties: JsonObject = record
            .into_iter()
            .map(|(field, value)| (field, field_value_to_json(value)))
            .collect();
        properties.insert("shapefile".to_string(), source_name.clone().into());

        features.push(feature(
            geojson::Geometry::new(geojson::Value::from(&geometry)),
            properties,
        ));
    }

    Ok(features)
}

fn field_value_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(text) => text.map_or(Value::Null, Value::from),
        FieldValue::Memo(text) => Value::from(text),
        FieldValue::Numeric(number) => number.map_or(Value::Null, Value::from),
        FieldValue::Float(number) => number.map_or(Value::Null, |n| Value::from(f64::from(n))),
        FieldValue::Double(number) | FieldValue::Currency(number) => Value::from(number),
        FieldValue::Integer(number) => Value::from(number),
        FieldValue::Logical(flag) => flag.map_or(Value::Null, Value::from),
        FieldValue::Date(date) => date.map_or(Value::Null, |date| Value::from(iso_date(&date))),
        FieldValue::DateTime(datetime) => {
            let time = datetime.time();
            Value::from(format!(
                "{}T{:02}:{:02}:{:02}",
                iso_date(&datetime.date()),
                time.hours(),
                time.minutes(),
                time.seconds()
            ))
        }
    }
}

fn iso_date(date: &Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::dbase::{FieldName, Record, TableWriterBuilder};

    fn write_ranges(path: &Path, rows: &[(&str, &str)]) {
        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("sci_name").unwrap(), 80)
            .add_character_field(FieldName::try_from("category").unwrap(), 10)
            .add_numeric_field(FieldName::try_from("presence").unwrap(), 10, 0)
            .add_logical_field(FieldName::try_from("marine").unwrap());
        let mut writer = shapefile::Writer::from_path(path, table).unwrap();

        for (i, (name, category)) in rows.iter().enumerate() {
            let mut record = Record::default();
            record.insert(
                "sci_name".to_string(),
                FieldValue::Character(Some(name.to_string())),
            );
            record.insert(
                "category".to_string(),
                FieldValue::Character(Some(category.to_string())),
            );
            record.insert("presence".to_string(), FieldValue::Numeric(Some(1.0)));
            record.insert("marine".to_string(), FieldValue::Logical(Some(false)));

            let point = shapefile::Point::new(100.0 + i as f64, 10.0);
            writer.write_shape_and_record(&point, &record).unwrap();
        }
    }

    #[test]
    fn test_matching_features_keep_all_attributes() {
        let dir = tempfile::tempdir().unwrap();
        write_ranges(&dir.path().join("reptiles_part1.shp"), &[("Naja atra", "VU")]);
        write_ranges(
            &dir.path().join("reptiles_part2.shp"),
            &[("Gekko gecko", "LC"), ("Python regius", "NT"), ("Gekko gecko", "LC")],
        );

        let source = ShapefileSource::new(dir.path());
        let features = source.find_species(" gekko GECKO ").unwrap();
        assert_eq!(features.len(), 2);

        let properties = features[0].properties.as_ref().unwrap();
        assert_eq!(properties["sci_name"], "Gekko gecko");
        assert_eq!(properties["category"], "LC");
        assert_eq!(properties["presence"], 1.0);
        assert_eq!(properties["marine"], false);
        assert_eq!(properties["shapefile"], "reptiles_part2");

        let geometry = features[0].geometry.as_ref().unwrap();
        assert!(matches!(geometry.value, geojson::Value::Point(_)));
    }

    #[test]
    fn test_first_matching_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_ranges(&dir.path().join("a_part.shp"), &[("Naja atra", "VU")]);
        write_ranges(&dir.path().join("b_part.shp"), &[("Naja atra", "EN")]);

        let source = ShapefileSource::new(dir.path());
        let features = source.find_species("Naja atra").unwrap();

        assert_eq!(features.len(), 1);
        let properties = features[0].properties.as_ref().unwrap();
        assert_eq!(properties["shapefile"], "a_part");
        assert_eq!(properties["category"], "VU");
    }

    #[test]
    fn test_field_values_map_to_json() {
        assert_eq!(field_value_to_json(FieldValue::Character(None)), Value::Null);
        assert_eq!(field_value_to_json(FieldValue::Integer(3)), Value::from(3));
        assert_eq!(
            field_value_to_json(FieldValue::Date(Some(Date::new(12, 5, 2019)))),
            Value::from("2019-05-12")
        );
        assert_eq!(
            field_value_to_json(FieldValue::Memo("Uetz et al.".to_string())),
            Value::from("Uetz et al.")
        );
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let source = ShapefileSource::new("/definitely/not/here");
        assert!(matches!(
            source.find_species("Gekko gecko"),
            Err(ShapefileError::Directory { .. })
        ));
    }

    #[test]
    fn test_directory_without_shapefiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), "no shapes here").unwrap();

        let source = ShapefileSource::new(dir.path());
        assert!(matches!(
            source.find_species("Gekko gecko"),
            Err(ShapefileError::NoShapefiles(_))
        ));
    }

    #[test]
    fn test_unreadable_shapefile_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.shp"), b"not a shapefile").unwrap();

        let source = ShapefileSource::new(dir.path());
        let features = source.find_species("Gekko gecko").unwrap();
        assert!(features.is_empty());
    }
}
