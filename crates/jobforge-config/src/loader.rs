//! YAML definition loading.
//!
//! Resolves input paths to definition files, parses them, and expands the
//! local tags understood in definition files:
//!
//! - `!include: file.yaml` - the parsed contents of another YAML file
//! - `!include-raw: file.sh` - file contents as a string; a list of files is
//!   joined with newlines
//! - `!include-raw-escape: file.sh` - as above, with braces doubled so the
//!   contents survive template interpolation
//! - `!join: [delimiter, [items]]` - items joined into one string
//!
//! Included files are looked up in the include path, then next to the
//! including file, then in the working directory.

use crate::{ConfigError, ConfigResult, JobBuilderSettings};
use globset::{Glob, GlobSet, GlobSetBuilder};
use jobforge_core::definition::{parse_document, scalar_to_string};
use jobforge_core::{DefinitionStore, RawDefinition};
use serde_yaml::Value;
use serde_yaml::value::TaggedValue;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const YAML_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Include {
    Yaml,
    Raw,
    RawEscape,
    Join,
}

impl Include {
    /// Map a tag to its include kind and whether the spelling is deprecated.
    fn from_tag(tag: &str) -> Option<(Self, bool)> {
        match tag {
            "!include:" => Some((Self::Yaml, false)),
            "!include-raw:" => Some((Self::Raw, false)),
            "!include-raw-escape:" => Some((Self::RawEscape, false)),
            "!join:" => Some((Self::Join, false)),
            "!include" => Some((Self::Yaml, true)),
            "!include-raw" => Some((Self::Raw, true)),
            "!include-raw-escape" => Some((Self::RawEscape, true)),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Yaml => "!include:",
            Self::Raw => "!include-raw:",
            Self::RawEscape => "!include-raw-escape:",
            Self::Join => "!join:",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    pub recursive: bool,
    pub exclude: Vec<String>,
    pub include_path: Vec<PathBuf>,
}

impl From<&JobBuilderSettings> for LoaderOptions {
    fn from(settings: &JobBuilderSettings) -> Self {
        Self {
            recursive: settings.recursive,
            exclude: settings.exclude.clone(),
            include_path: settings.include_path.clone(),
        }
    }
}

pub struct Loader {
    options: LoaderOptions,
    exclude: GlobSet,
}

impl Loader {
    pub fn new(options: LoaderOptions) -> ConfigResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &options.exclude {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidValue {
                field: "exclude".to_string(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let exclude = builder.build().map_err(|e| ConfigError::InvalidValue {
            field: "exclude".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { options, exclude })
    }

    /// Expand input paths into the definition files to read, in order.
    ///
    /// Files named explicitly are always read. Directories contribute their
    /// YAML files, descending into subdirectories when recursive. A file
    /// reached twice is read once.
    pub fn discover(&self, inputs: &[PathBuf]) -> ConfigResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for input in inputs {
            if input.is_dir() {
                self.discover_dir(input, &mut files)?;
            } else {
                files.push(input.clone());
            }
        }

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(files.len());
        for file in files {
            let canonical = std::fs::canonicalize(&file).map_err(|e| ConfigError::io(&file, e))?;
            if seen.insert(canonical) {
                unique.push(file);
            } else {
                warn!(path = %file.display(), "file specified more than once, ignoring duplicate");
            }
        }
        Ok(unique)
    }

    fn discover_dir(&self, dir: &Path, files: &mut Vec<PathBuf>) -> ConfigResult<()> {
        let max_depth = if self.options.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(dir)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(entry.path()));

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && is_yaml(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(())
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let by_name = path
            .file_name()
            .is_some_and(|name| self.exclude.is_match(Path::new(name)));
        if by_name || self.exclude.is_match(path) {
            debug!(path = %path.display(), "excluded from search");
            return true;
        }
        false
    }

    /// Read every definition file reachable from `inputs` into the store.
    pub fn load_into(&self, inputs: &[PathBuf], store: &mut DefinitionStore) -> ConfigResult<usize> {
        let files = self.discover(inputs)?;
        let mut count = 0;
        for file in &files {
            let definitions = self.load_file(file)?;
            count += definitions.len();
            store.ingest(definitions)?;
        }
        info!(files = files.len(), definitions = count, "loaded definitions");
        Ok(count)
    }

    pub fn load_file(&self, path: &Path) -> ConfigResult<Vec<RawDefinition>> {
        debug!(path = %path.display(), "parsing definition file");
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let mut chain = vec![canonical(path)];
        let value = self.parse_yaml(&text, &path.display().to_string(), path.parent(), &mut chain)?;
        Ok(parse_document(&value)?)
    }

    /// Parse definitions from text; includes resolve against `base_dir`.
    pub fn load_str(&self, text: &str, base_dir: Option<&Path>) -> ConfigResult<Vec<RawDefinition>> {
        let value = self.parse_yaml(text, "<string>", base_dir, &mut Vec::new())?;
        Ok(parse_document(&value)?)
    }

    /// `chain` holds the canonical paths of the files being included, outermost first.
    fn parse_yaml(
        &self,
        text: &str,
        origin: &str,
        base_dir: Option<&Path>,
        chain: &mut Vec<PathBuf>,
    ) -> ConfigResult<Value> {
        let yaml_error = |source| ConfigError::Yaml {
            path: origin.to_string(),
            source,
        };
        let mut value: Value = serde_yaml::from_str(text).map_err(yaml_error)?;
        value.apply_merge().map_err(yaml_error)?;
        self.resolve_tags(value, base_dir, chain)
    }

    fn resolve_tags(
        &self,
        value: Value,
        base_dir: Option<&Path>,
        chain: &mut Vec<PathBuf>,
    ) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => {
                let TaggedValue { tag, value } = *tagged;
                let tag_name = format!("!{}", tag.to_string().trim_start_matches('!'));
                match Include::from_tag(&tag_name) {
                    Some((include, deprecated)) => {
                        if deprecated {
                            warn!(tag = %tag_name, replacement = include.tag(), "tag is deprecated");
                        }
                        self.include(include, value, base_dir, chain)
                    }
                    None => Ok(Value::Tagged(Box::new(TaggedValue {
                        tag,
                        value: self.resolve_tags(value, base_dir, chain)?,
                    }))),
                }
            }
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.resolve_tags(item, base_dir, chain))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(mapping) => mapping
                .into_iter()
                .map(|(key, value)| Ok((key, self.resolve_tags(value, base_dir, chain)?)))
                .collect::<ConfigResult<serde_yaml::Mapping>>()
                .map(Value::Mapping),
            other => Ok(other),
        }
    }

    fn include(
        &self,
        include: Include,
        value: Value,
        base_dir: Option<&Path>,
        chain: &mut Vec<PathBuf>,
    ) -> ConfigResult<Value> {
        let bad_tag = |message: String| ConfigError::InvalidTag {
            tag: include.tag().to_string(),
            message,
        };

        match include {
            Include::Join => {
                let Value::Sequence(parts) = value else {
                    return Err(bad_tag("expected [delimiter, [items]]".to_string()));
                };
                let [delimiter, Value::Sequence(items)] = parts.as_slice() else {
                    return Err(bad_tag("expected [delimiter, [items]]".to_string()));
                };
                let delimiter = scalar_to_string(delimiter)
                    .ok_or_else(|| bad_tag("delimiter must be a scalar".to_string()))?;
                let items = items
                    .iter()
                    .map(|item| {
                        scalar_to_string(item)
                            .ok_or_else(|| bad_tag(format!("cannot join {:?}", item)))
                    })
                    .collect::<ConfigResult<Vec<_>>>()?;
                Ok(Value::String(items.join(&delimiter)))
            }
            Include::Yaml => {
                let name = value
                    .as_str()
                    .ok_or_else(|| bad_tag("expected a file name".to_string()))?;
                let path = self.find_file(name, base_dir)?;
                let resolved = canonical(&path);
                if chain.contains(&resolved) {
                    let mut cycle = chain.clone();
                    cycle.push(resolved);
                    return Err(ConfigError::IncludeCycle { chain: cycle });
                }
                debug!(path = %path.display(), "including YAML file");
                let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::io(&path, e))?;

                chain.push(resolved);
                let included = self.parse_yaml(&text, &path.display().to_string(), path.parent(), chain);
                chain.pop();
                included
            }
            Include::Raw | Include::RawEscape => {
                let names = match &value {
                    Value::String(name) => vec![name.as_str()],
                    Value::Sequence(items) => items
                        .iter()
                        .map(|item| item.as_str().ok_or_else(|| bad_tag("expected file names".to_string())))
                        .collect::<ConfigResult<Vec<_>>>()?,
                    _ => return Err(bad_tag("expected a file name or a list of them".to_string())),
                };
                let mut contents = Vec::with_capacity(names.len());
                for name in names {
                    let path = self.find_file(name, base_dir)?;
                    debug!(path = %path.display(), "including raw file");
                    contents.push(std::fs::read_to_string(&path).map_err(|e| ConfigError::io(&path, e))?);
                }
                let text = contents.join("\n");
                if include == Include::RawEscape {
                    Ok(Value::String(escape_braces(&text)))
                } else {
                    Ok(Value::String(text))
                }
            }
        }
    }

    fn find_file(&self, name: &str, base_dir: Option<&Path>) -> ConfigResult<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return if path.is_file() {
                Ok(path.to_path_buf())
            } else {
                Err(ConfigError::IncludeNotFound {
                    name: name.to_string(),
                    searched: Vec::new(),
                })
            };
        }

        let mut searched = self.options.include_path.clone();
        if let Some(dir) = base_dir {
            searched.push(dir.to_path_buf());
        }
        searched.push(PathBuf::from("."));

        let found = searched
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file());
        found.ok_or(ConfigError::IncludeNotFound {
            name: name.to_string(),
            searched,
        })
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| YAML_EXTENSIONS.contains(&ext))
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}
