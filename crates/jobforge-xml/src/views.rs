//! View types.

use serde_yaml::{Mapping, Value};

use crate::XmlResult;
use crate::element::XmlElement;
use crate::modules::{bool_text, is_true, required, text};

const COLUMNS: &[(&str, &str)] = &[
    ("status", "hudson.views.StatusColumn"),
    ("weather", "hudson.views.WeatherColumn"),
    ("job", "hudson.views.JobColumn"),
    ("last-success", "hudson.views.LastSuccessColumn"),
    ("last-failure", "hudson.views.LastFailureColumn"),
    ("last-duration", "hudson.views.LastDurationColumn"),
    ("build-button", "hudson.views.BuildButtonColumn"),
    ("last-stable", "hudson.views.LastStableColumn"),
];

const DEFAULT_COLUMNS: &[&str] = &[
    "status",
    "weather",
    "job",
    "last-success",
    "last-failure",
    "last-duration",
    "build-button",
];

/// Elements shared by every view type.
fn view_root(class: &str, data: &Mapping) -> XmlResult<XmlElement> {
    let mut root = XmlElement::new(class);
    root.text_element("name", text(required(data, "name", "view")?));
    root.text_element("description", data.get("description").map(text).unwrap_or_default());
    root.text_element("filterExecutors", bool_text(is_true(data.get("filter-executors"))));
    root.text_element("filterQueue", bool_text(is_true(data.get("filter-queue"))));
    root.push(XmlElement::new("properties").with_attr("class", "hudson.model.View$PropertyList"));
    Ok(root)
}

/// `view-type: all`
pub fn all_root(data: &Mapping) -> XmlResult<XmlElement> {
    view_root("hudson.model.AllView", data)
}

/// `view-type: list`
pub fn list_root(data: &Mapping) -> XmlResult<XmlElement> {
    let mut root = view_root("hudson.model.ListView", data)?;

    let job_names = root.sub_element("jobNames");
    job_names.push(XmlElement::new("comparator").with_attr("class", "hudson.util.CaseInsensitiveComparator"));
    if let Some(Value::Sequence(names)) = data.get("job-name") {
        for name in names {
            job_names.text_element("string", text(name));
        }
    }
    root.sub_element("jobFilters");

    let columns = root.sub_element("columns");
    let requested: Vec<String> = match data.get("columns") {
        Some(Value::Sequence(columns)) => columns.iter().map(text).collect(),
        _ => DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
    };
    for column in &requested {
        if let Some((_, class)) = COLUMNS.iter().find(|(name, _)| *name == column.as_str()) {
            columns.sub_element(*class);
        }
    }

    if let Some(regex) = data.get("regex") {
        root.text_element("includeRegex", text(regex));
    }
    root.text_element("recurse", bool_text(is_true(data.get("recurse"))));
    if let Some(status) = data.get("status-filter") {
        root.text_element("statusFilter", bool_text(is_true(Some(status))));
    }
    Ok(root)
}
