//! Manifest construction and rendering.
//!
//! The manifest is the declarative hand-off to the downstream ingestion
//! system: one import entry per retained table, one source entry per data
//! source, and exactly one import-group entry for the batch. All paths use
//! the mounted addressing scheme, and every list is emitted in sorted name
//! order so the rendered manifest is reproducible byte for byte. The text
//! rendering is written to `<root>/internal/config/config.textproto`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use silo_core::paths::mounted_path;

use crate::error::{Error, Result};
use crate::layout::{Layout, Provenance, TableInput};

/// Import-group names longer than this are truncated, a hard limit imposed
/// by the downstream system.
pub const MAX_GROUP_NAME_LEN: usize = 20;
/// URL used when no provenance file names one.
pub const PLACEHOLDER_URL: &str = "https://example.org/";
/// Description carried by every import-group entry.
pub const GROUP_DESCRIPTION: &str = "Custom import group";
/// Record-graph output pattern emitted alongside mapped tables.
pub const GRAPH_PATTERN: &str = "graph.tfrecord@*.gz";
/// Bucket-relative location of the rendered manifest under an import root.
pub const MANIFEST_OBJECT: &str = "internal/config/config.textproto";

/// Category tag of an import entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportCategory {
    /// Statistical data.
    Stats,
    /// Schema definitions.
    Schema,
}

impl ImportCategory {
    fn as_text(self) -> &'static str {
        match self {
            Self::Stats => "STATS",
            Self::Schema => "SCHEMA",
        }
    }
}

/// One external table: a mapping file (for mapped tables) and its data files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalTable {
    /// Mounted path of the mapping file; absent for self-describing tables.
    pub mapping_path: Option<String>,
    /// Mounted data file paths or wildcard patterns.
    pub data_paths: Vec<String>,
}

/// One import entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportEntry {
    /// Import name; the table name doubles as the import name.
    pub name: String,
    /// Category tag.
    pub category: ImportCategory,
    /// Dataset this import belongs to.
    pub dataset: String,
    /// External tables feeding the import.
    pub tables: Vec<ExternalTable>,
    /// Record-graph output patterns, mounted.
    pub graph_urls: Vec<String>,
    /// Whether graph records are generated from the mapping automatically.
    pub auto_generated: bool,
}

/// One dataset inside a source entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    /// Dataset name.
    pub name: String,
    /// Dataset URL.
    pub url: String,
}

/// One data source entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSource {
    /// Source display name.
    pub name: String,
    /// Source URL.
    pub url: String,
    /// Datasets belonging to the source.
    pub datasets: Vec<DatasetInfo>,
}

/// The single import-group entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportGroup {
    /// Group name, at most [`MAX_GROUP_NAME_LEN`] characters.
    pub name: String,
    /// Always true: this is a non-default deployment.
    pub custom: bool,
    /// Fixed description.
    pub description: String,
}

/// Provenance lookup for manifest construction.
///
/// Sources without their own provenance fall back to the group-level file;
/// sources with neither get a synthesized default.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceSet {
    /// Group-level provenance, the fallback for every source.
    pub group: Option<Provenance>,
    /// Per-source provenance by source folder name.
    pub by_source: BTreeMap<String, Provenance>,
}

impl ProvenanceSet {
    fn for_source(&self, source: &str) -> Option<&Provenance> {
        self.by_source.get(source).or(self.group.as_ref())
    }
}

/// Alternate flat input: pre-grouped sources, datasets, and files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportGroupFiles {
    /// Group name, before truncation.
    pub group_name: String,
    /// Dataset names per source.
    pub datasets_by_source: BTreeMap<String, Vec<String>>,
    /// Files per dataset.
    pub files_by_dataset: BTreeMap<String, DataFiles>,
}

/// The files of one dataset in the flat input model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFiles {
    /// Bucket-relative path of the single mapping file.
    pub mapping_file: String,
    /// Bucket-relative data file paths.
    pub data_files: Vec<String>,
}

/// A fully built import manifest. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Import entries, dataset imports first, then the schema entry if any.
    pub imports: Vec<ImportEntry>,
    /// Data source entries, sorted by source name.
    pub sources: Vec<DatasetSource>,
    /// The import-group entry.
    pub group: ImportGroup,
}

impl Manifest {
    /// Builds a manifest from a resolved layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyManifest`] when no source retained any table.
    pub fn from_layout(bucket: &str, layout: &Layout, provenance: &ProvenanceSet) -> Result<Self> {
        let group_name = truncate_group_name(last_segment(&layout.root));
        let mut imports = Vec::new();
        let mut sources = Vec::new();

        for (source_name, source) in &layout.sources {
            let prov = provenance.for_source(source_name);
            let url = prov.map_or(PLACEHOLDER_URL, |p| p.url.as_str()).to_string();
            let display_name = prov.map_or(source_name.as_str(), |p| p.name.as_str()).to_string();

            let datasets = match prov.and_then(|p| p.datasets.as_ref()) {
                Some(datasets) => datasets
                    .iter()
                    .map(|d| DatasetInfo {
                        name: d.name.clone(),
                        url: d.url.clone(),
                    })
                    .collect(),
                None => source
                    .tables
                    .keys()
                    .map(|table| DatasetInfo {
                        name: table.clone(),
                        url: url.clone(),
                    })
                    .collect::<Vec<_>>(),
            };
            if !datasets.is_empty() {
                sources.push(DatasetSource {
                    name: display_name,
                    url,
                    datasets,
                });
            }

            for (table_name, input) in &source.tables {
                let folder = format!("{}/data/{}/{}", layout.root, source_name, table_name);
                imports.push(table_entry(bucket, &folder, table_name, input));
            }
        }

        if imports.is_empty() {
            return Err(Error::EmptyManifest {
                root: layout.root.clone(),
            });
        }

        let schema_patterns: BTreeSet<String> = layout
            .sources
            .iter()
            .filter(|(_, source)| !source.schema_files.is_empty())
            .map(|(name, _)| {
                mounted_path(bucket, &format!("{}/data/{}/*.mcf*", layout.root, name))
            })
            .collect();
        if !schema_patterns.is_empty() {
            imports.push(ImportEntry {
                name: "schema".to_string(),
                category: ImportCategory::Schema,
                dataset: group_name.clone(),
                tables: vec![ExternalTable {
                    mapping_path: None,
                    data_paths: schema_patterns.into_iter().collect(),
                }],
                graph_urls: Vec::new(),
                auto_generated: false,
            });
        }

        Ok(Self {
            imports,
            sources,
            group: group_entry(group_name),
        })
    }

    /// Builds a manifest from the pre-grouped flat input model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyManifest`] when no dataset carries data files.
    pub fn from_group_files(bucket: &str, group: &ImportGroupFiles) -> Result<Self> {
        let group_name = truncate_group_name(&group.group_name);
        let mut imports = Vec::new();
        let mut sources = Vec::new();

        for (source_name, dataset_names) in &group.datasets_by_source {
            let mut dataset_names = dataset_names.clone();
            dataset_names.sort();
            dataset_names.dedup();

            sources.push(DatasetSource {
                name: source_name.clone(),
                url: PLACEHOLDER_URL.to_string(),
                datasets: dataset_names
                    .iter()
                    .map(|name| DatasetInfo {
                        name: name.clone(),
                        url: PLACEHOLDER_URL.to_string(),
                    })
                    .collect(),
            });

            for dataset in &dataset_names {
                let Some(files) = group.files_by_dataset.get(dataset) else {
                    tracing::debug!(%dataset, "dataset has no file record, skipping");
                    continue;
                };
                if files.data_files.is_empty() {
                    tracing::debug!(%dataset, "dataset has no data files, skipping");
                    continue;
                }
                let folder = parent_folder(&files.mapping_file);
                imports.push(ImportEntry {
                    name: dataset.clone(),
                    category: ImportCategory::Stats,
                    dataset: dataset.clone(),
                    tables: vec![ExternalTable {
                        mapping_path: Some(mounted_path(bucket, &files.mapping_file)),
                        data_paths: files
                            .data_files
                            .iter()
                            .map(|f| mounted_path(bucket, f))
                            .collect(),
                    }],
                    graph_urls: vec![mounted_path(
                        bucket,
                        &format!("{folder}/{GRAPH_PATTERN}"),
                    )],
                    auto_generated: true,
                });
            }
        }

        if imports.is_empty() {
            return Err(Error::EmptyManifest {
                root: group.group_name.clone(),
            });
        }

        Ok(Self {
            imports,
            sources,
            group: group_entry(group_name),
        })
    }

    /// The name of the first import entry, used in notifications.
    #[must_use]
    pub fn first_import_name(&self) -> Option<&str> {
        self.imports.first().map(|import| import.name.as_str())
    }

    /// Renders the manifest as deterministic declarative text.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for import in &self.imports {
            out.push_str("import {\n");
            out.push_str(&format!("  name: {:?}\n", import.name));
            out.push_str(&format!("  category: {}\n", import.category.as_text()));
            out.push_str(&format!("  dataset: {:?}\n", import.dataset));
            if import.auto_generated {
                out.push_str("  auto_generated: true\n");
            }
            for url in &import.graph_urls {
                out.push_str(&format!("  graph_url: {url:?}\n"));
            }
            for table in &import.tables {
                out.push_str("  table {\n");
                if let Some(mapping) = &table.mapping_path {
                    out.push_str(&format!("    mapping_path: {mapping:?}\n"));
                }
                for path in &table.data_paths {
                    out.push_str(&format!("    data_path: {path:?}\n"));
                }
                out.push_str("  }\n");
            }
            out.push_str("}\n");
        }
        for source in &self.sources {
            out.push_str("source {\n");
            out.push_str(&format!("  name: {:?}\n", source.name));
            out.push_str(&format!("  url: {:?}\n", source.url));
            for dataset in &source.datasets {
                out.push_str("  dataset {\n");
                out.push_str(&format!("    name: {:?}\n", dataset.name));
                out.push_str(&format!("    url: {:?}\n", dataset.url));
                out.push_str("  }\n");
            }
            out.push_str("}\n");
        }
        out.push_str("group {\n");
        out.push_str(&format!("  name: {:?}\n", self.group.name));
        out.push_str(&format!("  custom: {}\n", self.group.custom));
        out.push_str(&format!("  description: {:?}\n", self.group.description));
        out.push_str("}\n");
        out
    }
}

fn table_entry(bucket: &str, folder: &str, table_name: &str, input: &TableInput) -> ImportEntry {
    match input {
        TableInput::Mapped { mapping, data_files } => ImportEntry {
            name: table_name.to_string(),
            category: ImportCategory::Stats,
            dataset: table_name.to_string(),
            tables: vec![ExternalTable {
                mapping_path: Some(mounted_path(bucket, &format!("{folder}/{mapping}"))),
                data_paths: data_files
                    .iter()
                    .map(|f| mounted_path(bucket, &format!("{folder}/{f}")))
                    .collect(),
            }],
            graph_urls: vec![mounted_path(bucket, &format!("{folder}/{GRAPH_PATTERN}"))],
            auto_generated: true,
        },
        TableInput::SelfDescribing { data_files } => ImportEntry {
            name: table_name.to_string(),
            category: ImportCategory::Stats,
            dataset: table_name.to_string(),
            tables: vec![ExternalTable {
                mapping_path: None,
                data_paths: data_files
                    .iter()
                    .map(|f| mounted_path(bucket, &format!("{folder}/{f}")))
                    .collect(),
            }],
            graph_urls: Vec::new(),
            auto_generated: false,
        },
    }
}

fn group_entry(name: String) -> ImportGroup {
    ImportGroup {
        name,
        custom: true,
        description: GROUP_DESCRIPTION.to_string(),
    }
}

fn last_segment(root: &str) -> &str {
    root.trim_end_matches('/').rsplit('/').next().unwrap_or(root)
}

fn truncate_group_name(name: &str) -> String {
    name.chars().take(MAX_GROUP_NAME_LEN).collect()
}

fn parent_folder(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(folder, _)| folder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_layout() -> Layout {
        Layout::resolve(
            "demo",
            &[
                "demo/data/source1/schema.mcf".to_string(),
                "demo/data/source1/smokepm/data.tmcf".to_string(),
                "demo/data/source1/smokepm/output.csv".to_string(),
                "demo/data/source2/nodes/graph.mcf".to_string(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn builds_entries_for_both_representations() {
        let manifest =
            Manifest::from_layout("b", &demo_layout(), &ProvenanceSet::default()).unwrap();

        let smokepm = &manifest.imports[0];
        assert_eq!(smokepm.name, "smokepm");
        assert_eq!(smokepm.category, ImportCategory::Stats);
        assert!(smokepm.auto_generated);
        assert_eq!(
            smokepm.tables[0].mapping_path.as_deref(),
            Some("/bigstore/b/demo/data/source1/smokepm/data.tmcf")
        );
        assert_eq!(
            smokepm.tables[0].data_paths,
            vec!["/bigstore/b/demo/data/source1/smokepm/output.csv"]
        );
        assert_eq!(
            smokepm.graph_urls,
            vec!["/bigstore/b/demo/data/source1/smokepm/graph.tfrecord@*.gz"]
        );

        let nodes = &manifest.imports[1];
        assert_eq!(nodes.name, "nodes");
        assert!(!nodes.auto_generated);
        assert!(nodes.tables[0].mapping_path.is_none());
        assert!(nodes.graph_urls.is_empty());
        assert_eq!(
            nodes.tables[0].data_paths,
            vec!["/bigstore/b/demo/data/source2/nodes/graph.mcf"]
        );
    }

    #[test]
    fn schema_entry_unions_source_patterns() {
        let manifest =
            Manifest::from_layout("b", &demo_layout(), &ProvenanceSet::default()).unwrap();

        let schema = manifest.imports.last().unwrap();
        assert_eq!(schema.name, "schema");
        assert_eq!(schema.category, ImportCategory::Schema);
        assert_eq!(
            schema.tables[0].data_paths,
            vec!["/bigstore/b/demo/data/source1/*.mcf*"]
        );
    }

    #[test]
    fn no_schema_entry_without_schema_files() {
        let layout = Layout::resolve(
            "demo",
            &[
                "demo/data/source1/smokepm/data.tmcf".to_string(),
                "demo/data/source1/smokepm/output.csv".to_string(),
            ],
        )
        .unwrap();
        let manifest = Manifest::from_layout("b", &layout, &ProvenanceSet::default()).unwrap();
        assert!(manifest
            .imports
            .iter()
            .all(|i| i.category == ImportCategory::Stats));
    }

    #[test]
    fn group_name_is_last_root_segment_truncated() {
        let layout = Layout::resolve(
            "teams/a_very_long_import_group_name",
            &[
                "teams/a_very_long_import_group_name/data/s/t/data.tmcf".to_string(),
                "teams/a_very_long_import_group_name/data/s/t/output.csv".to_string(),
            ],
        )
        .unwrap();
        let manifest = Manifest::from_layout("b", &layout, &ProvenanceSet::default()).unwrap();
        assert_eq!(manifest.group.name, "a_very_long_import_g");
        assert_eq!(manifest.group.name.chars().count(), 20);
        assert!(manifest.group.custom);
        assert_eq!(manifest.group.description, GROUP_DESCRIPTION);
    }

    #[test]
    fn provenance_overrides_default_source() {
        let mut provenance = ProvenanceSet::default();
        provenance.by_source.insert(
            "source1".to_string(),
            Provenance {
                name: "Source One".into(),
                url: "https://one.example/".into(),
                datasets: Some(vec![crate::layout::DatasetRef {
                    name: "custom_dataset".into(),
                    url: "https://one.example/ds".into(),
                }]),
            },
        );

        let manifest = Manifest::from_layout("b", &demo_layout(), &provenance).unwrap();

        let one = manifest.sources.iter().find(|s| s.name == "Source One").unwrap();
        assert_eq!(one.url, "https://one.example/");
        assert_eq!(one.datasets[0].name, "custom_dataset");

        let two = manifest.sources.iter().find(|s| s.name == "source2").unwrap();
        assert_eq!(two.url, PLACEHOLDER_URL);
        assert_eq!(two.datasets[0].name, "nodes");
    }

    #[test]
    fn group_provenance_is_the_fallback() {
        let provenance = ProvenanceSet {
            group: Some(Provenance {
                name: "Group Source".into(),
                url: "https://group.example/".into(),
                datasets: None,
            }),
            by_source: BTreeMap::new(),
        };
        let manifest = Manifest::from_layout("b", &demo_layout(), &provenance).unwrap();
        assert!(manifest.sources.iter().all(|s| s.url == "https://group.example/"));
    }

    #[test]
    fn empty_layout_is_an_error() {
        let layout = Layout::resolve("demo", &["demo/data/source1/junk.bin".to_string()]).unwrap();
        let err = Manifest::from_layout("b", &layout, &ProvenanceSet::default())
            .expect_err("should fail");
        assert!(matches!(err, Error::EmptyManifest { root } if root == "demo"));
    }

    #[test]
    fn ordering_is_stable_regardless_of_input_order() {
        let forward = [
            "demo/data/alpha/t1/data.tmcf".to_string(),
            "demo/data/alpha/t1/output.csv".to_string(),
            "demo/data/beta/t2/data.tmcf".to_string(),
            "demo/data/beta/t2/output.csv".to_string(),
        ];
        let mut reversed = forward.to_vec();
        reversed.reverse();

        let a = Manifest::from_layout(
            "b",
            &Layout::resolve("demo", &forward).unwrap(),
            &ProvenanceSet::default(),
        )
        .unwrap();
        let b = Manifest::from_layout(
            "b",
            &Layout::resolve("demo", &reversed).unwrap(),
            &ProvenanceSet::default(),
        )
        .unwrap();

        assert_eq!(a.to_text(), b.to_text());
        assert_eq!(a.sources[0].name, "alpha");
        assert_eq!(a.sources[1].name, "beta");
    }

    #[test]
    fn text_rendering_is_byte_stable() {
        let layout = Layout::resolve(
            "demo",
            &[
                "demo/data/source1/smokepm/data.tmcf".to_string(),
                "demo/data/source1/smokepm/output.csv".to_string(),
            ],
        )
        .unwrap();
        let manifest = Manifest::from_layout("b", &layout, &ProvenanceSet::default()).unwrap();

        let expected = concat!(
            "import {\n",
            "  name: \"smokepm\"\n",
            "  category: STATS\n",
            "  dataset: \"smokepm\"\n",
            "  auto_generated: true\n",
            "  graph_url: \"/bigstore/b/demo/data/source1/smokepm/graph.tfrecord@*.gz\"\n",
            "  table {\n",
            "    mapping_path: \"/bigstore/b/demo/data/source1/smokepm/data.tmcf\"\n",
            "    data_path: \"/bigstore/b/demo/data/source1/smokepm/output.csv\"\n",
            "  }\n",
            "}\n",
            "source {\n",
            "  name: \"source1\"\n",
            "  url: \"https://example.org/\"\n",
            "  dataset {\n",
            "    name: \"smokepm\"\n",
            "    url: \"https://example.org/\"\n",
            "  }\n",
            "}\n",
            "group {\n",
            "  name: \"demo\"\n",
            "  custom: true\n",
            "  description: \"Custom import group\"\n",
            "}\n",
        );
        assert_eq!(manifest.to_text(), expected);
    }

    #[test]
    fn from_group_files_builds_the_same_shape() {
        let group = ImportGroupFiles {
            group_name: "demo".into(),
            datasets_by_source: BTreeMap::from([(
                "source1".to_string(),
                vec!["smokepm".to_string()],
            )]),
            files_by_dataset: BTreeMap::from([(
                "smokepm".to_string(),
                DataFiles {
                    mapping_file: "demo/data/source1/smokepm/data.tmcf".into(),
                    data_files: vec!["demo/data/source1/smokepm/output.csv".into()],
                },
            )]),
        };

        let manifest = Manifest::from_group_files("b", &group).unwrap();
        assert_eq!(manifest.first_import_name(), Some("smokepm"));
        let import = &manifest.imports[0];
        assert!(import.auto_generated);
        assert_eq!(
            import.graph_urls,
            vec!["/bigstore/b/demo/data/source1/smokepm/graph.tfrecord@*.gz"]
        );
        assert_eq!(manifest.group.name, "demo");
    }

    #[test]
    fn from_group_files_without_data_is_an_error() {
        let group = ImportGroupFiles {
            group_name: "demo".into(),
            datasets_by_source: BTreeMap::new(),
            files_by_dataset: BTreeMap::new(),
        };
        assert!(matches!(
            Manifest::from_group_files("b", &group),
            Err(Error::EmptyManifest { .. })
        ));
    }
}
