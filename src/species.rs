use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use utoipa::ToSchema;

/// Queries shorter than this never produce suggestions
pub const MIN_QUERY_LEN: usize = 4;

pub const RD_SOURCE: &str = "RD file";
pub const IUCN_SOURCE: &str = "IUCN file";
pub const BOTH_SOURCES: &str = "Both files";

/// Order name (title-cased file stem) to its species list
pub type HerpOrders = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Suggestion {
    pub name: String,
    pub sources: String,
}

#[derive(Debug, Deserialize)]
struct SpeciesRow {
    #[serde(default)]
    species: String,
}

/// Non-blank, trimmed lines of a species list file
pub fn load_species_file(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            warn!("Error loading {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Every `*.txt` file in `dir` becomes one order
pub fn load_herp_orders(dir: &Path) -> HerpOrders {
    let mut orders = HerpOrders::new();

    for path in species_files(dir) {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        orders.insert(title_case(stem), load_species_file(&path));
    }

    debug!("Loaded {} herp orders from {}", orders.len(), dir.display());
    orders
}

fn species_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Species folder '{}' is not readable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        })
        .collect();
    files.sort();
    files
}

/// Upper-cases the first letter of every alphabetic run, lower-cases the rest
fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut at_word_start = true;

    for c in value.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            result.push(c);
            at_word_start = true;
        }
    }
    result
}

/// Capitalises the genus and keeps the rest of a lowercased binomial as-is
fn format_species_name(species: &str) -> String {
    let mut words = species.split_whitespace();
    let Some(genus) = words.next() else {
        return String::new();
    };

    let mut chars = genus.chars();
    let mut formatted: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    for word in words {
        formatted.push(' ');
        formatted.push_str(word);
    }
    formatted
}

/// Lowercased species names from the reptile-database text files and the IUCN CSV
#[derive(Debug, Clone, Default)]
pub struct SpeciesCatalog {
    rd_species: BTreeSet<String>,
    iucn_species: BTreeSet<String>,
}

impl SpeciesCatalog {
    pub fn new(
        rd_species: impl IntoIterator<Item = String>,
        iucn_species: impl IntoIterator<Item = String>,
    ) -> Self {
        let normalize = |name: String| name.trim().to_lowercase();
        Self {
            rd_species: rd_species
                .into_iter()
                .map(normalize)
                .filter(|name| !name.is_empty())
                .collect(),
            iucn_species: iucn_species
                .into_iter()
                .map(normalize)
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// Reads both sources; an unreadable source contributes nothing
    pub fn load(species_dir: &Path, species_csv: &Path) -> Self {
        let rd_species = species_files(species_dir)
            .iter()
            .flat_map(|path| load_species_file(path))
            .collect::<Vec<_>>();

        let iucn_species = match read_species_csv(species_csv) {
            Ok(species) => species,
            Err(e) => {
                warn!("Error reading {}: {}", species_csv.display(), e);
                Vec::new()
            }
        };

        Self::new(rd_species, iucn_species)
    }

    pub fn suggestions(&self, query: &str) -> Vec<Suggestion> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < MIN_QUERY_LEN {
            return Vec::new();
        }

        let mut suggestions: Vec<Suggestion> = self
            .rd_species
            .union(&self.iucn_species)
            .filter(|species| species.contains(&query))
            .map(|species| {
                let sources = match (
                    self.rd_species.contains(species),
                    self.iucn_species.contains(species),
                ) {
                    (true, true) => BOTH_SOURCES,
                    (true, false) => RD_SOURCE,
                    (false, _) => IUCN_SOURCE,
                };
                Suggestion {
                    name: format_species_name(species),
                    sources: sources.to_string(),
                }
            })
            .collect();

        suggestions.sort_by(|a, b| a.name.cmp(&b.name));
        suggestions
    }
}

fn read_species_csv(path: &Path) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut species = Vec::new();

    for row in reader.deserialize::<SpeciesRow>() {
        let row = row?;
        if !row.species.trim().is_empty() {
            species.push(row.species);
        }
    }
    Ok(species)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SpeciesCatalog {
        SpeciesCatalog::new(
            vec!["Gekko gecko".to_string(), "Gekko japonicus".to_string()],
            vec!["gekko gecko".to_string(), "Naja atra".to_string()],
        )
    }

    #[test]
    fn test_short_query_returns_nothing() {
        assert!(catalog().suggestions("gek").is_empty());
        assert!(catalog().suggestions("   na  ").is_empty());
        assert!(catalog().suggestions("").is_empty());
    }

    #[test]
    fn test_sources_are_labelled() {
        let suggestions = catalog().suggestions("gekko");
        assert_eq!(
            suggestions,
            vec![
                Suggestion {
                    name: "Gekko gecko".to_string(),
                    sources: BOTH_SOURCES.to_string()
                },
                Suggestion {
                    name: "Gekko japonicus".to_string(),
                    sources: RD_SOURCE.to_string()
                },
            ]
        );

        let naja = catalog().suggestions("NAJA");
        assert_eq!(naja[0].name, "Naja atra");
        assert_eq!(naja[0].sources, IUCN_SOURCE);
    }

    #[test]
    fn test_substring_match_anywhere() {
        let suggestions = catalog().suggestions("onicus");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].name, "Gekko japonicus");
    }

    #[test]
    fn test_title_case_matches_file_stems() {
        assert_eq!(title_case("testudines"), "Testudines");
        assert_eq!(title_case("SQUAMATA"), "Squamata");
        assert_eq!(title_case("caudata_extra"), "Caudata_Extra");
    }

    #[test]
    fn test_format_species_name() {
        assert_eq!(format_species_name("gekko gecko"), "Gekko gecko");
        assert_eq!(format_species_name("x"), "X");
        assert_eq!(format_species_name(""), "");
    }
}
