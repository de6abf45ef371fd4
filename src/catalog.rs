//! Combined class catalog.
//!
//! Indices `[0, object_count)` name object classes and
//! `[object_count, object_count + identity_count)` name identities. Face
//! identifier class ids are offset by `object_count` when fused. The partition
//! is fixed once the catalog is built.

use anyhow::{anyhow, Result};
use std::path::Path;

const IDENTITY_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassCatalog {
    names: Vec<String>,
    object_count: usize,
}

impl ClassCatalog {
    pub fn new(object_names: Vec<String>, identity_names: Vec<String>) -> Self {
        let object_count = object_names.len();
        let mut names = object_names;
        names.extend(identity_names);
        Self {
            names,
            object_count,
        }
    }

    /// Load object classes from a newline-separated file and identities from
    /// the image files in `faces_dir`. A missing faces directory yields no
    /// identities.
    pub fn load(classes_file: &Path, faces_dir: &Path) -> Result<Self> {
        let object_names = read_object_classes(classes_file)?;
        let identity_names = if faces_dir.is_dir() {
            identity_names_in(faces_dir)?
        } else {
            log::warn!(
                "faces directory {} not found; no identities loaded",
                faces_dir.display()
            );
            Vec::new()
        };
        log::info!(
            "class catalog: {} object classes, {} identities {:?}",
            object_names.len(),
            identity_names.len(),
            identity_names
        );
        Ok(Self::new(object_names, identity_names))
    }

    /// Number of object classes; also the offset applied to identity indices.
    pub fn object_count(&self) -> usize {
        self.object_count
    }

    pub fn identity_count(&self) -> usize {
        self.names.len() - self.object_count
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn object_names(&self) -> &[String] {
        &self.names[..self.object_count]
    }

    pub fn identity_names(&self) -> &[String] {
        &self.names[self.object_count..]
    }

    /// Name for a combined class index.
    pub fn name(&self, class_id: i32) -> Option<&str> {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .map(String::as_str)
    }

    /// Display label in `"name: 0.99"` form. Unknown indices fall back to
    /// `"class <id>"`.
    pub fn label(&self, class_id: i32, confidence: f32) -> String {
        match self.name(class_id) {
            Some(name) => format!("{}: {:.2}", name, confidence),
            None => format!("class {}: {:.2}", class_id, confidence),
        }
    }

    pub fn is_identity(&self, class_id: i32) -> bool {
        usize::try_from(class_id)
            .map(|idx| idx >= self.object_count && idx < self.names.len())
            .unwrap_or(false)
    }
}

fn read_object_classes(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read classes file {}: {}", path.display(), e))?;
    // Line N is class N; blank lines inside the list still hold an index.
    let body = raw.trim();
    if body.is_empty() {
        return Err(anyhow!("classes file {} is empty", path.display()));
    }
    Ok(body.lines().map(|line| line.trim().to_string()).collect())
}

/// Identity names derived from the image files in `dir`: the file stem of
/// every `.jpg`, `.jpeg` or `.png` (case-insensitive), sorted by file name.
pub fn identity_names_in(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| anyhow!("failed to read faces directory {}: {}", dir.display(), e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || !is_identity_image(&path) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.push((file_name, stem.to_string()));
        }
    }
    files.sort();
    Ok(files.into_iter().map(|(_, stem)| stem).collect())
}

fn is_identity_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IDENTITY_IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}
