//! Directory of `{name}.json` template files

use super::model::Template;
use crate::error::{RoiError, RoiResult};
use crate::persist::{read_json, write_json_pretty};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct TemplateStore {
    dir: PathBuf,
    templates: Vec<Template>,
}

impl TemplateStore {
    /// Open (creating if needed) a templates directory and load what it holds
    pub fn open(dir: impl Into<PathBuf>) -> RoiResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| RoiError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut store = Self {
            dir,
            templates: Vec::new(),
        };
        store.load_all()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Re-read every `*.json` file; unparsable files are logged and skipped
    pub fn load_all(&mut self) -> RoiResult<usize> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| RoiError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        self.templates.clear();
        for path in paths {
            match read_json::<Template>(&path) {
                Ok(template) => self.templates.push(template),
                Err(e) => log::warn!("Error loading template {}: {e}", path.display()),
            }
        }

        log::info!(
            "Loaded {} templates from {}",
            self.templates.len(),
            self.dir.display()
        );
        Ok(self.templates.len())
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Write a template, replacing any stored template with the same name
    pub fn save(&mut self, template: Template) -> RoiResult<PathBuf> {
        if template.name.trim().is_empty() {
            return Err(RoiError::InvalidTemplate {
                description: "template name cannot be empty".to_string(),
            });
        }
        if template.name.contains(['/', '\\']) {
            return Err(RoiError::InvalidTemplate {
                description: format!("template name '{}' contains a path separator", template.name),
            });
        }

        let path = self.path_for(&template.name);
        write_json_pretty(&path, &template)?;
        log::info!("Template saved to {}", path.display());

        self.templates.retain(|t| t.name != template.name);
        self.templates.push(template);
        Ok(path)
    }

    pub fn delete(&mut self, name: &str) -> RoiResult<()> {
        let index = self
            .templates
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| RoiError::TemplateNotFound {
                name: name.to_string(),
            })?;

        let path = self.path_for(name);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|source| RoiError::Io {
                path: path.clone(),
                source,
            })?;
        }
        self.templates.remove(index);
        log::info!("Deleted template '{name}'");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn require(&self, name: &str) -> RoiResult<&Template> {
        self.get(name).ok_or_else(|| RoiError::TemplateNotFound {
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }
}
