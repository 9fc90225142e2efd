//! Generated deployment descriptors (POM and Ivy XML).
//!
//! Only the coordinates and dependency list are rendered; fuller POM
//! modeling (licenses, parents, plugin sections) belongs to the build tool.

use buildinfo_types::{Coordinate, Module};

/// Repository-relative path for a module's POM.
pub fn pom_path(id: &Coordinate) -> String {
    format!(
        "{}/{}/{}/{}-{}.pom",
        id.group.replace('.', "/"),
        id.name,
        id.version,
        id.name,
        id.version
    )
}

/// Repository-relative path for a module's Ivy descriptor.
pub fn ivy_path(id: &Coordinate) -> String {
    format!(
        "{}/{}/{}/ivy-{}.xml",
        id.group.replace('.', "/"),
        id.name,
        id.version,
        id.version
    )
}

/// Render a minimal POM for the module.
pub fn maven_pom(module: &Module) -> String {
    let mut pom = String::new();
    pom.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    pom.push_str(
        "<project xmlns=\"http://maven.apache.org/POM/4.0.0\">\n  <modelVersion>4.0.0</modelVersion>\n",
    );
    pom.push_str(&format!(
        "  <groupId>{}</groupId>\n  <artifactId>{}</artifactId>\n  <version>{}</version>\n",
        xml_escape(&module.id.group),
        xml_escape(&module.id.name),
        xml_escape(&module.id.version)
    ));
    if !module.dependencies.is_empty() {
        pom.push_str("  <dependencies>\n");
        for dep in &module.dependencies {
            pom.push_str("    <dependency>\n");
            pom.push_str(&format!(
                "      <groupId>{}</groupId>\n      <artifactId>{}</artifactId>\n      <version>{}</version>\n",
                xml_escape(&dep.id.group),
                xml_escape(&dep.id.name),
                xml_escape(&dep.id.version)
            ));
            if let Some(classifier) = &dep.classifier {
                pom.push_str(&format!(
                    "      <classifier>{}</classifier>\n",
                    xml_escape(classifier)
                ));
            }
            pom.push_str("    </dependency>\n");
        }
        pom.push_str("  </dependencies>\n");
    }
    pom.push_str("</project>\n");
    pom
}

/// Render a minimal Ivy descriptor for the module.
pub fn ivy_descriptor(module: &Module) -> String {
    let mut ivy = String::new();
    ivy.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    ivy.push_str("<ivy-module version=\"2.0\">\n");
    ivy.push_str(&format!(
        "  <info organisation=\"{}\" module=\"{}\" revision=\"{}\"/>\n",
        xml_escape(&module.id.group),
        xml_escape(&module.id.name),
        xml_escape(&module.id.version)
    ));
    if !module.dependencies.is_empty() {
        ivy.push_str("  <dependencies>\n");
        for dep in &module.dependencies {
            ivy.push_str(&format!(
                "    <dependency org=\"{}\" name=\"{}\" rev=\"{}\"/>\n",
                xml_escape(&dep.id.group),
                xml_escape(&dep.id.name),
                xml_escape(&dep.id.version)
            ));
        }
        ivy.push_str("  </dependencies>\n");
    }
    ivy.push_str("</ivy-module>\n");
    ivy
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
