//! Turning realized jobs and views into XML documents.

use jobforge_core::{RealizedJob, RealizedView};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::XmlResult;
use crate::element::XmlElement;
use crate::registry::ModuleRegistry;

pub const DEFAULT_PROJECT_TYPE: &str = "freestyle";
pub const DEFAULT_VIEW_TYPE: &str = "list";

/// A generated XML document for one job or view.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlJob {
    pub name: String,
    pub root: XmlElement,
}

impl XmlJob {
    pub fn new(name: impl Into<String>, root: XmlElement) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// The pretty-printed document.
    pub fn output(&self) -> XmlResult<Vec<u8>> {
        self.root.to_pretty_xml()
    }

    pub fn output_string(&self) -> XmlResult<String> {
        let bytes = self.output()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Hex md5 digest of [`output`](Self::output).
    pub fn md5(&self) -> XmlResult<String> {
        Ok(format!("{:x}", md5::compute(self.output()?)))
    }
}

pub struct XmlGenerator<'a> {
    registry: &'a ModuleRegistry,
}

impl<'a> XmlGenerator<'a> {
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        Self { registry }
    }

    pub fn generate_job(&self, job: &RealizedJob) -> XmlResult<XmlJob> {
        let project_type = type_attribute(&job.data, "project-type", DEFAULT_PROJECT_TYPE);
        debug!(job = %job.name, %project_type, "generating job XML");

        let mut root = self.registry.project_root(&project_type, &job.data)?;
        for module in self.registry.modules() {
            module.gen_xml(self.registry, &mut root, &job.data)?;
        }
        Ok(XmlJob::new(job.name.clone(), root))
    }

    pub fn generate_view(&self, view: &RealizedView) -> XmlResult<XmlJob> {
        let view_type = type_attribute(&view.data, "view-type", DEFAULT_VIEW_TYPE);
        debug!(view = %view.name, %view_type, "generating view XML");

        let root = self.registry.view_root(&view_type, &view.data)?;
        Ok(XmlJob::new(view.name.clone(), root))
    }

    pub fn generate_jobs(&self, jobs: &[RealizedJob]) -> XmlResult<Vec<XmlJob>> {
        jobs.iter().map(|job| self.generate_job(job)).collect()
    }

    pub fn generate_views(&self, views: &[RealizedView]) -> XmlResult<Vec<XmlJob>> {
        views.iter().map(|view| self.generate_view(view)).collect()
    }
}

fn type_attribute(data: &Mapping, attribute: &str, default: &str) -> String {
    match data.get(attribute) {
        Some(Value::String(kind)) => kind.clone(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XmlError;

    fn job(src: &str) -> RealizedJob {
        let data: Mapping = serde_yaml::from_str(src).unwrap();
        RealizedJob {
            name: data["name"].as_str().unwrap().to_string(),
            data,
        }
    }

    #[test]
    fn test_freestyle_job_document() {
        let registry = ModuleRegistry::with_core();
        let generator = XmlGenerator::new(&registry);
        let xml = generator
            .generate_job(&job(
                r#"
name: foo-27
description: "Runs tox\n\n<!-- Managed by Jenkins Job Builder -->"
node: linux
parameters:
  - string: {name: BRANCH, default: main}
triggers:
  - timed: '@daily'
builders:
  - shell: 'tox -e py27'
publishers:
  - archive: {artifacts: 'dist/*'}
"#,
            ))
            .unwrap();

        let expected = r#"<?xml version="1.0" encoding="utf-8"?>
<project>
  <actions/>
  <description>Runs tox

&lt;!-- Managed by Jenkins Job Builder --&gt;</description>
  <keepDependencies>false</keepDependencies>
  <disabled>false</disabled>
  <blockBuildWhenDownstreamBuilding>false</blockBuildWhenDownstreamBuilding>
  <blockBuildWhenUpstreamBuilding>false</blockBuildWhenUpstreamBuilding>
  <concurrentBuild>false</concurrentBuild>
  <assignedNode>linux</assignedNode>
  <canRoam>false</canRoam>
  <properties>
    <hudson.model.ParametersDefinitionProperty>
      <parameterDefinitions>
        <hudson.model.StringParameterDefinition>
          <name>BRANCH</name>
          <description/>
          <defaultValue>main</defaultValue>
        </hudson.model.StringParameterDefinition>
      </parameterDefinitions>
    </hudson.model.ParametersDefinitionProperty>
  </properties>
  <scm class="hudson.scm.NullSCM"/>
  <triggers class="vector">
    <hudson.triggers.TimerTrigger>
      <spec>@daily</spec>
    </hudson.triggers.TimerTrigger>
  </triggers>
  <builders>
    <hudson.tasks.Shell>
      <command>tox -e py27</command>
    </hudson.tasks.Shell>
  </builders>
  <publishers>
    <hudson.tasks.ArtifactArchiver>
      <artifacts>dist/*</artifacts>
      <latestOnly>false</latestOnly>
    </hudson.tasks.ArtifactArchiver>
  </publishers>
  <buildWrappers/>
</project>
"#;
        assert_eq!(xml.output_string().unwrap(), expected);
    }

    #[test]
    fn test_md5_tracks_content() {
        let registry = ModuleRegistry::with_core();
        let generator = XmlGenerator::new(&registry);
        let a = generator.generate_job(&job("{name: a, description: one}")).unwrap();
        let b = generator.generate_job(&job("{name: a, description: two}")).unwrap();

        let digest = a.md5().unwrap();
        assert_eq!(digest.len(), 32);
        assert_eq!(digest, a.md5().unwrap());
        assert_ne!(digest, b.md5().unwrap());
    }

    #[test]
    fn test_unknown_project_type() {
        let registry = ModuleRegistry::with_core();
        let err = XmlGenerator::new(&registry)
            .generate_job(&job("{name: p, project-type: pipeline}"))
            .unwrap_err();
        assert!(matches!(err, XmlError::UnknownType { attribute: "project-type", .. }));
    }

    #[test]
    fn test_view_defaults_to_list() {
        let registry = ModuleRegistry::with_core();
        let data: Mapping = serde_yaml::from_str("{name: v}").unwrap();
        let view = XmlGenerator::new(&registry)
            .generate_view(&RealizedView {
                name: "v".to_string(),
                data,
            })
            .unwrap();
        assert_eq!(view.root.name, "hudson.model.ListView");
    }
}
