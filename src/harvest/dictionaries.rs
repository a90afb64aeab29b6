use anyhow::{Context, Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Association ids that are never harvested, whatever the dictionaries or
/// config say.
pub const EXCLUDED_ORGANIZATIONS: [u32; 2] = [4, 15];

pub const ASSOCIATIONS_FILE: &str = "associations.json";
pub const FORMS_FILE: &str = "forms.json";

const BUILTIN_ASSOCIATIONS: &str = include_str!("../../data/associations.json");
const BUILTIN_FORMS: &str = include_str!("../../data/forms.json");

pub type NameTable = BTreeMap<u32, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource {
    File,
    Builtin,
}

impl TableSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Builtin => "builtin",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dictionaries {
    pub associations: NameTable,
    pub associations_source: TableSource,
    pub forms: NameTable,
    pub forms_source: TableSource,
}

pub fn is_excluded(org_id: u32, extra: &BTreeSet<u32>) -> bool {
    EXCLUDED_ORGANIZATIONS.contains(&org_id) || extra.contains(&org_id)
}

fn parse_table(raw: &str, origin: &str) -> Result<NameTable> {
    let parsed: BTreeMap<String, String> =
        json5::from_str(raw).map_err(|err| anyhow!("failed to parse {origin}: {err}"))?;
    let mut out = NameTable::new();
    for (key, name) in parsed {
        let id = key
            .trim()
            .parse::<u32>()
            .with_context(|| format!("non-numeric id `{key}` in {origin}"))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("empty name for id {id} in {origin}");
        }
        out.insert(id, name.to_string());
    }
    Ok(out)
}

fn load_table(path: &Path, builtin: &str) -> Result<(NameTable, TableSource)> {
    if path.is_file() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let table = parse_table(&raw, &path.display().to_string())?;
        return Ok((table, TableSource::File));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok((parse_table(builtin, &format!("builtin {name}"))?, TableSource::Builtin))
}

pub fn associations_path(data_dir: &Path) -> PathBuf {
    data_dir.join(ASSOCIATIONS_FILE)
}

pub fn forms_path(data_dir: &Path) -> PathBuf {
    data_dir.join(FORMS_FILE)
}

/// Read both name tables from `data_dir`, falling back to the compiled-in
/// copies for whichever file is missing.
pub fn load(data_dir: &Path) -> Result<Dictionaries> {
    let (associations, associations_source) =
        load_table(&associations_path(data_dir), BUILTIN_ASSOCIATIONS)?;
    let (forms, forms_source) = load_table(&forms_path(data_dir), BUILTIN_FORMS)?;
    if forms.is_empty() {
        anyhow::bail!("form dictionary is empty");
    }
    Ok(Dictionaries {
        associations,
        associations_source,
        forms,
        forms_source,
    })
}
