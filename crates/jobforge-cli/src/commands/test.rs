//! `jobforge test`: render jobs without talking to Jenkins.

use anyhow::{Context, Result};
use jobforge_config::Settings;
use jobforge_xml::{ModuleRegistry, XmlGenerator, XmlJob};
use serde_yaml::{Mapping, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{expand, output_path};

pub fn run(
    settings: &Settings,
    paths: &[PathBuf],
    globs: &[String],
    output: Option<&Path>,
    yaml: bool,
) -> Result<()> {
    let expansion = expand(settings, paths, globs)?;

    if yaml {
        let documents: Vec<Value> = expansion
            .jobs
            .iter()
            .map(|job| Value::Mapping(job.data.clone()))
            .chain(expansion.views.iter().map(|view| {
                let mut wrapped = Mapping::new();
                wrapped.insert(Value::from("view"), Value::Mapping(view.data.clone()));
                Value::Mapping(wrapped)
            }))
            .collect();
        let text = serde_yaml::to_string(&documents)?;
        std::io::stdout().write_all(text.as_bytes())?;
        return Ok(());
    }

    let registry = ModuleRegistry::with_core();
    let generator = XmlGenerator::new(&registry);
    let mut documents = generator.generate_jobs(&expansion.jobs)?;
    documents.sort_by(|a, b| a.name.cmp(&b.name));
    let views = generator.generate_views(&expansion.views)?;
    info!(jobs = documents.len(), views = views.len(), "XML generated");

    match output {
        Some(dir) => write_files(dir, documents.iter().chain(&views)),
        None => write_stdout(documents.iter().chain(&views)),
    }
}

fn write_files<'a>(dir: &Path, documents: impl Iterator<Item = &'a XmlJob>) -> Result<()> {
    for document in documents {
        let path = output_path(dir, &document.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        debug!(path = %path.display(), "Writing XML");
        std::fs::write(&path, document.output()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn write_stdout<'a>(documents: impl Iterator<Item = &'a XmlJob>) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for document in documents {
        info!(job = %document.name, "Job name");
        match stdout.write_all(&document.output()?) {
            Ok(()) => {}
            // The reader went away (`jobforge test ... | head`).
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_one_file_per_job() {
        let input = TempDir::new().unwrap();
        std::fs::write(
            input.path().join("jobs.yaml"),
            r#"
- job:
    name: team/build
    builders:
      - shell: make
- view:
    name: everything
    view-type: all
"#,
        )
        .unwrap();
        let out = TempDir::new().unwrap();

        run(
            &Settings::default(),
            &[input.path().to_path_buf()],
            &[],
            Some(out.path()),
            false,
        )
        .unwrap();

        let job = std::fs::read_to_string(out.path().join("team").join("build")).unwrap();
        assert!(job.contains("<command>make</command>"));
        let view = std::fs::read_to_string(out.path().join("everything")).unwrap();
        assert!(view.contains("<hudson.model.AllView>"));
    }
}
