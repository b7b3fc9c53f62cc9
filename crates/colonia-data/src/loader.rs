//! Turns a data directory into engine types.
//!
//! Finds `<base>.{ron,toml,json}` files, parses them by extension, then
//! resolves good names and capacities into a validated [`Catalog`] and a
//! [`LogisticsConfig`].

use crate::schema::{FactoryData, LogisticsData};
use colonia_core::catalog::{Catalog, CatalogBuilder, CatalogError, FactoryKindDef};
use colonia_core::id::GoodType;
use colonia_core::logistics::LogisticsConfig;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },
    /// Same base name present in more than one format.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },
    #[error("unknown good '{name}' in {file}")]
    UnknownGood { file: PathBuf, name: String },
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },
    /// A value that parses but fits no engine type.
    #[error("invalid {field} for '{name}' in {file}: {detail}")]
    InvalidValue {
        file: PathBuf,
        name: String,
        field: &'static str,
        detail: String,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Formats and discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    /// Lookup order when searching a directory.
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }

    pub fn of(path: &Path) -> Result<Format, DataLoadError> {
        let ext = path.extension().and_then(|e| e.to_str());
        Format::ALL
            .into_iter()
            .find(|f| Some(f.extension()) == ext)
            .ok_or_else(|| DataLoadError::UnsupportedFormat {
                file: path.to_path_buf(),
            })
    }
}

/// The single `<base>.<ext>` file in `dir`, if any.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let present: Vec<PathBuf> = Format::ALL
        .iter()
        .map(|f| dir.join(format!("{base_name}.{}", f.extension())))
        .filter(|p| p.exists())
        .collect();
    match present.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(only.clone())),
        [a, b, ..] => Err(DataLoadError::ConflictingFormats {
            a: a.clone(),
            b: b.clone(),
        }),
    }
}

pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Parse `path` as one `T`. A TOML list cannot be a document root, so
/// `toml_key` names the table entry holding it.
fn parse<T: DeserializeOwned>(path: &Path, toml_key: Option<&str>) -> Result<T, DataLoadError> {
    let format = Format::of(path)?;
    let text = std::fs::read_to_string(path)?;
    match (format, toml_key) {
        (Format::Ron, _) => ron::from_str(&text).map_err(|e| parse_error(path, e)),
        (Format::Json, _) => serde_json::from_str(&text).map_err(|e| parse_error(path, e)),
        (Format::Toml, None) => toml::from_str(&text).map_err(|e| parse_error(path, e)),
        (Format::Toml, Some(key)) => {
            let mut table: toml::Table = toml::from_str(&text).map_err(|e| parse_error(path, e))?;
            let value = table
                .remove(key)
                .ok_or_else(|| parse_error(path, format!("no '{key}' entry")))?;
            value
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    parse(path, None)
}

/// A top-level list; see [`parse`] for the TOML layout.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    parse(path, Some(toml_key))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Look up a good by its snake_case name.
pub fn resolve_good(name: &str, file: &Path) -> Result<GoodType, DataLoadError> {
    GoodType::from_name(name).ok_or_else(|| DataLoadError::UnknownGood {
        file: file.to_path_buf(),
        name: name.to_string(),
    })
}

/// Record `name`, failing if it was already seen.
pub fn check_duplicate(
    seen: &mut HashSet<String>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if seen.insert(name.to_string()) {
        Ok(())
    } else {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    }
}

fn capacity(value: i64, name: &str, field: &'static str, file: &Path) -> Result<u32, DataLoadError> {
    u32::try_from(value).map_err(|_| DataLoadError::InvalidValue {
        file: file.to_path_buf(),
        name: name.to_string(),
        field,
        detail: format!("{value} is not a valid capacity"),
    })
}

/// Turn one factory record into a kind definition. Catalog-level rules
/// (batch-sized caps, worker slots) are left to [`CatalogBuilder::build`].
pub fn resolve_factory(data: &FactoryData, file: &Path) -> Result<FactoryKindDef, DataLoadError> {
    if !data.production_rate.is_finite() {
        return Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            name: data.name.clone(),
            field: "production_rate",
            detail: format!("{} is not finite", data.production_rate),
        });
    }
    let input = data
        .input
        .as_deref()
        .map(|name| resolve_good(name, file))
        .transpose()?;
    let output = resolve_good(&data.output, file)?;

    let mut def = FactoryKindDef::new(&data.name, input, output, data.production_rate)
        .with_placement(data.placement);
    def.size = data.size;
    def.max_workers = data.max_workers;
    def.input_capacity = capacity(data.capacities.input, &data.name, "capacities.input", file)?;
    def.output_capacity = capacity(data.capacities.output, &data.name, "capacities.output", file)?;
    def.store_capacity = capacity(data.capacities.store, &data.name, "capacities.store", file)?;
    if let Some(picture) = data.picture {
        def = def.with_picture(picture);
    }
    if let Some(anim) = &data.animation {
        def = def.with_animation(anim.first_frame, anim.frame_count, anim.frame_delay);
    }
    Ok(def)
}

/// Resolve every factory record into a validated catalog.
pub fn build_catalog(factories: &[FactoryData], file: &Path) -> Result<Catalog, DataLoadError> {
    let mut seen = HashSet::new();
    let mut builder = CatalogBuilder::new();
    for data in factories {
        check_duplicate(&mut seen, &data.name, file)?;
        builder.register(resolve_factory(data, file)?)?;
    }
    Ok(builder.build()?)
}

/// Overlay file values on the default logistics tuning.
pub fn resolve_logistics(
    data: &LogisticsData,
    file: &Path,
) -> Result<LogisticsConfig, DataLoadError> {
    let defaults = LogisticsConfig::default();
    let config = LogisticsConfig {
        cadence: data.cadence.unwrap_or(defaults.cadence),
        cadence_offset: data.cadence_offset.unwrap_or(defaults.cadence_offset),
        shipment_limit: data.shipment_limit.unwrap_or(defaults.shipment_limit),
    };
    let invalid = |field, detail: String| DataLoadError::InvalidValue {
        file: file.to_path_buf(),
        name: "logistics".to_string(),
        field,
        detail,
    };
    if config.cadence == 0 {
        return Err(invalid("cadence", "must be at least 1".to_string()));
    }
    if config.cadence_offset >= config.cadence {
        return Err(invalid(
            "cadence_offset",
            format!("{} never fires with cadence {}", config.cadence_offset, config.cadence),
        ));
    }
    if config.shipment_limit == 0 {
        return Err(invalid("shipment_limit", "must be at least 1".to_string()));
    }
    Ok(config)
}
