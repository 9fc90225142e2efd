//! Dependency and artifact collection.
//!
//! Turns the build tool's finished graph into normalized [`Module`] records:
//! coordinates in triple form, Maven-layout deployment paths, and checksums
//! computed once per artifact file and cached on the record. Traversal
//! follows module declaration order, so identical graphs always collect to
//! identical module lists.

use std::path::Path;

use buildinfo_types::{
    Artifact, Coordinate, Dependency, MalformedCoordinate, Module, UNSPECIFIED_VERSION,
};
use md5::Md5;
use sha1::{Digest, Sha1};

use crate::error::PublishError;
use crate::graph::{BuildGraph, GraphArtifact, GraphDependency, GraphModule};

/// Collect normalized modules from a finished build graph.
///
/// Pure with respect to external state: the only I/O is reading artifact
/// files to compute their checksums.
pub fn collect(graph: &BuildGraph) -> Result<Vec<Module>, PublishError> {
    graph.modules.iter().map(collect_module).collect()
}

fn collect_module(module: &GraphModule) -> Result<Module, PublishError> {
    let module_label = format!("{}:{}:{}", module.group, module.name, module.version);
    let id = Coordinate::new(&module.group, &module.name, &module.version).map_err(|source| {
        PublishError::MalformedCoordinate {
            module: module_label.clone(),
            source,
        }
    })?;

    let dependencies = module
        .dependencies
        .iter()
        .map(|dep| collect_dependency(dep).map_err(|source| PublishError::MalformedCoordinate {
            module: module_label.clone(),
            source,
        }))
        .collect::<Result<Vec<_>, _>>()?;

    let artifacts = module
        .artifacts
        .iter()
        .map(|artifact| collect_artifact(&id, artifact, &module_label))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Module {
        id,
        artifacts,
        dependencies,
    })
}

fn collect_dependency(dep: &GraphDependency) -> Result<Dependency, MalformedCoordinate> {
    let version = if dep.version.is_empty() {
        UNSPECIFIED_VERSION
    } else {
        &dep.version
    };
    let id = Coordinate::new(&dep.group, &dep.name, version)?;
    Ok(Dependency {
        id,
        scopes: dep.scopes.clone(),
        classifier: dep.classifier.clone(),
        extension: dep.extension.clone(),
    })
}

fn collect_artifact(
    id: &Coordinate,
    artifact: &GraphArtifact,
    module_label: &str,
) -> Result<Artifact, PublishError> {
    let file_name = artifact_file_name(id, artifact);
    let (sha1, md5) =
        checksums(&artifact.file).map_err(|source| PublishError::ArtifactRead {
            module: module_label.to_string(),
            path: artifact.file.clone(),
            source,
        })?;

    Ok(Artifact {
        name: file_name.clone(),
        local_path: artifact.file.clone(),
        remote_path: remote_path(id, &file_name),
        sha1,
        md5,
    })
}

/// `name-version[-classifier].extension`
fn artifact_file_name(id: &Coordinate, artifact: &GraphArtifact) -> String {
    match &artifact.classifier {
        Some(classifier) => format!(
            "{}-{}-{}.{}",
            artifact.name, id.version, classifier, artifact.extension
        ),
        None => format!("{}-{}.{}", artifact.name, id.version, artifact.extension),
    }
}

/// Maven layout: `group/with/slashes/name/version/file`.
pub fn remote_path(id: &Coordinate, file_name: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        id.group.replace('.', "/"),
        id.name,
        id.version,
        file_name
    )
}

/// SHA-1 and MD5 of a file, hex-encoded.
fn checksums(path: &Path) -> std::io::Result<(String, String)> {
    let bytes = std::fs::read(path)?;

    let mut sha1 = Sha1::new();
    sha1.update(&bytes);
    let sha1 = hex::encode(sha1.finalize());

    let mut md5 = Md5::new();
    md5.update(&bytes);
    let md5 = hex::encode(md5.finalize());

    Ok((sha1, md5))
}
