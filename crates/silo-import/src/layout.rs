//! Layout resolution.
//!
//! An import root is a convention-over-configuration directory tree:
//!
//! ```text
//! <root>/data/provenance.json                 group-level provenance
//! <root>/data/<source>/schema.mcf             schema files (sharding legal)
//! <root>/data/<source>/provenance.json        per-source provenance
//! <root>/data/<source>/<table>/data.tmcf      mapping file (at most one)
//! <root>/data/<source>/<table>/output.csv     mapped data files
//! <root>/data/<source>/<table>/nodes.mcf      self-describing data files
//! ```
//!
//! [`Layout::resolve`] turns the flat object listing under `<root>/data/`
//! into this hierarchy, validating the per-table invariants. Stray files and
//! unknown extensions are logged and skipped; only a second mapping file or
//! a mix of the two data representations in one table aborts resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed provenance file name, recognized at group and source level.
pub const PROVENANCE_FILE: &str = "provenance.json";
/// Extension of mapping files.
pub const MAPPING_EXT: &str = ".tmcf";
/// Extension of mapped (tabular) data files.
pub const TABULAR_EXT: &str = ".csv";
/// Extension of self-describing data files and schema files.
pub const GRAPH_EXT: &str = ".mcf";
/// Above this many data files, a table's file list collapses to a wildcard.
pub const GLOB_COMPACTION_THRESHOLD: usize = 5;

/// Parsed provenance metadata for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Display name of the source.
    pub name: String,
    /// Home URL of the source.
    pub url: String,
    /// Optional per-dataset overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasets: Option<Vec<DatasetRef>>,
}

/// One dataset override inside a provenance file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Dataset name.
    pub name: String,
    /// Dataset URL.
    pub url: String,
}

impl Provenance {
    /// Parses a provenance file body.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the JSON does not match the schema.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| {
            Error::Core(silo_core::Error::Serialization {
                message: format!("invalid provenance file: {e}"),
            })
        })
    }
}

/// The data files of one table, in exactly one representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableInput {
    /// Tabular files projected through a mapping file.
    Mapped {
        /// Mapping file name.
        mapping: String,
        /// Data file names, or a single wildcard after compaction.
        data_files: Vec<String>,
    },
    /// Self-describing files needing no mapping.
    SelfDescribing {
        /// Data file names, or a single wildcard after compaction.
        data_files: Vec<String>,
    },
}

impl TableInput {
    /// The data file names, whichever representation.
    #[must_use]
    pub fn data_files(&self) -> &[String] {
        match self {
            Self::Mapped { data_files, .. } | Self::SelfDescribing { data_files } => data_files,
        }
    }
}

/// One data source under the import root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceImport {
    /// Schema file names directly under the source folder.
    pub schema_files: Vec<String>,
    /// Full object name of the source's provenance file, if present.
    pub provenance: Option<String>,
    /// Retained tables by name.
    pub tables: BTreeMap<String, TableInput>,
}

/// A resolved import root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// The import root path, bucket-relative.
    pub root: String,
    /// Full object name of the group-level provenance file, if present.
    pub group_provenance: Option<String>,
    /// Sources by folder name.
    pub sources: BTreeMap<String, SourceImport>,
}

#[derive(Default)]
struct TableFiles {
    mapping: Option<String>,
    tabular: Vec<String>,
    graph: Vec<String>,
}

#[derive(Default)]
struct SourceFiles {
    schema_files: Vec<String>,
    provenance: Option<String>,
    tables: BTreeMap<String, TableFiles>,
}

impl Layout {
    /// Resolves the flat object listing under `<root>/data/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateMappingFile`] when a table folder holds two
    /// mapping files, and [`Error::MixedRepresentations`] when one table
    /// holds both mapped and self-describing data.
    pub fn resolve(root: &str, objects: &[String]) -> Result<Self> {
        let prefix = format!("{}/data/", root.trim_end_matches('/'));
        let mut group_provenance = None;
        let mut sources: BTreeMap<String, SourceFiles> = BTreeMap::new();

        for object in objects {
            if object.ends_with('/') {
                continue;
            }
            let Some(body) = object.strip_prefix(&prefix) else {
                tracing::debug!(%object, "outside data folder, ignoring");
                continue;
            };
            let parts: Vec<&str> = body.split('/').collect();
            match parts.as_slice() {
                [file] => {
                    if *file == PROVENANCE_FILE {
                        group_provenance = Some(object.clone());
                    } else {
                        tracing::debug!(%object, "unrecognized file under data folder, ignoring");
                    }
                }
                [source, file] => {
                    let entry = sources.entry((*source).to_string()).or_default();
                    if *file == PROVENANCE_FILE {
                        if entry.provenance.is_none() {
                            entry.provenance = Some(object.clone());
                        } else {
                            tracing::debug!(%object, "duplicate provenance file, ignoring");
                        }
                    } else if file.ends_with(GRAPH_EXT) {
                        entry.schema_files.push((*file).to_string());
                    } else {
                        tracing::debug!(%object, "unrecognized file under source folder, ignoring");
                    }
                }
                [source, table, file] => {
                    let table_entry = sources
                        .entry((*source).to_string())
                        .or_default()
                        .tables
                        .entry((*table).to_string())
                        .or_default();
                    if file.ends_with(MAPPING_EXT) {
                        if table_entry.mapping.is_some() {
                            return Err(Error::DuplicateMappingFile {
                                source: (*source).to_string(),
                                table: (*table).to_string(),
                            });
                        }
                        table_entry.mapping = Some((*file).to_string());
                    } else if file.ends_with(TABULAR_EXT) {
                        table_entry.tabular.push((*file).to_string());
                    } else if file.ends_with(GRAPH_EXT) {
                        table_entry.graph.push((*file).to_string());
                    } else {
                        tracing::debug!(%object, "unrecognized file under table folder, ignoring");
                    }
                }
                _ => {
                    tracing::debug!(%object, "nested too deep, ignoring");
                }
            }
        }

        let mut resolved = BTreeMap::new();
        for (source_name, source) in sources {
            let mut tables = BTreeMap::new();
            for (table_name, files) in source.tables {
                match validate_table(&source_name, &table_name, files)? {
                    Some(input) => {
                        tables.insert(table_name, input);
                    }
                    None => {
                        tracing::debug!(
                            source = %source_name,
                            table = %table_name,
                            "table has no complete representation, pruning"
                        );
                    }
                }
            }
            resolved.insert(
                source_name,
                SourceImport {
                    schema_files: source.schema_files,
                    provenance: source.provenance,
                    tables,
                },
            );
        }

        Ok(Self {
            root: root.trim_end_matches('/').to_string(),
            group_provenance,
            sources: resolved,
        })
    }

    /// Whether any source retained at least one table.
    #[must_use]
    pub fn has_tables(&self) -> bool {
        self.sources.values().any(|source| !source.tables.is_empty())
    }
}

fn validate_table(source: &str, table: &str, files: TableFiles) -> Result<Option<TableInput>> {
    if !files.graph.is_empty() && (files.mapping.is_some() || !files.tabular.is_empty()) {
        return Err(Error::MixedRepresentations {
            source: source.to_string(),
            table: table.to_string(),
        });
    }
    match files.mapping {
        Some(mapping) if !files.tabular.is_empty() => Ok(Some(TableInput::Mapped {
            mapping,
            data_files: compact(files.tabular, TABULAR_EXT),
        })),
        None if !files.graph.is_empty() => Ok(Some(TableInput::SelfDescribing {
            data_files: compact(files.graph, GRAPH_EXT),
        })),
        _ => Ok(None),
    }
}

fn compact(files: Vec<String>, extension: &str) -> Vec<String> {
    if files.len() > GLOB_COMPACTION_THRESHOLD {
        vec![format!("*{extension}")]
    } else {
        files
    }
}
