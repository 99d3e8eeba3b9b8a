//! The entry registry.
//!
//! [`StructContext`] is the read surface downstream consumers program
//! against. [`FileStructContext`] implements it over loose files and jar/zip
//! archives: it owns every backing entry it registers, maps resource keys to
//! entries and class names to parsed headers.
//!
//! The class map is published as an `Arc` snapshot. Scans and reloads take
//! `&mut self`; a reload builds the new map off to the side and replaces the
//! snapshot in one step, so a reader holding the previous snapshot never sees
//! a partly rebuilt table.

use anyhow::{Context, Result, anyhow};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::archive::SharedArchive;
use crate::class::StructClass;
use crate::entry::{ByteStream, StructEntry};
use crate::error::{StoreError, collect_close_failures};
use crate::walk::{DirectoryWalker, relative_key};

pub type ClassMap = HashMap<String, Arc<StructClass>>;

pub trait StructContext {
    /// Read-only snapshot of every registered class, keyed by internal name.
    fn classes(&self) -> Arc<ClassMap>;

    fn get_class(&self, name: &str) -> Option<Arc<StructClass>> {
        self.classes().get(name).cloned()
    }

    /// Current bytes of a class, or `None` if no such class is registered.
    fn read_class(&self, name: &str) -> Result<Option<Vec<u8>>>;

    fn read_class_of(&self, class: &StructClass) -> Result<Option<Vec<u8>>> {
        self.read_class(&class.qualified_name)
    }

    /// Every registered resource key, class resources included.
    fn resources(&self) -> BTreeSet<&str>;

    fn open_resource(&self, name: &str) -> Result<Option<ByteStream>>;

    fn read_resource(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Re-reads every class from its backing entry and swaps in a fresh map.
    fn reload_context(&mut self) -> Result<()>;

    /// Closes every backing entry, attempting all of them even after a failure.
    fn close(&mut self) -> Result<()>;
}

#[derive(Default)]
pub struct FileStructContext {
    entries: HashMap<String, StructEntry>,
    classes: Arc<ClassMap>,
    walker: Option<Box<dyn DirectoryWalker>>,
}

impl FileStructContext {
    /// A context without a directory walker: scanning a directory fails.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_walker(walker: impl DirectoryWalker + 'static) -> Self {
        Self {
            walker: Some(Box::new(walker)),
            ..Self::default()
        }
    }

    /// Registers `path`: a directory, a `.class` file, a `.jar`/`.zip`
    /// archive or, when `own`, any other file as an opaque resource.
    pub fn scan(&mut self, path: &Path, own: bool) -> Result<()> {
        let before = (self.entries.len(), self.classes.len());

        if path.is_dir() {
            self.scan_directory(path, own)?;
        } else {
            let key = file_name_key(path)?;
            self.scan_file(&key, path, own)?;
        }

        info!(
            path = %path.display(),
            own,
            resources = self.entries.len() - before.0,
            classes = self.classes.len() - before.1,
            "scanned"
        );
        Ok(())
    }

    fn scan_file(&mut self, key: &str, path: &Path, own: bool) -> Result<()> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("class") => self.add_class_file(key, path, own),
            Some("jar" | "zip") => self.scan_zip_file(path, own),
            _ if own => self.add_resource(key, StructEntry::file(path)),
            _ => Ok(()),
        }
    }

    fn scan_directory(&mut self, root: &Path, own: bool) -> Result<()> {
        let files = match &self.walker {
            Some(walker) => walker.walk(root)?,
            None => return Err(StoreError::DirectoryScanUnsupported(root.to_path_buf()).into()),
        };
        for path in files {
            let key = relative_key(root, &path);
            self.scan_file(&key, &path, own)?;
        }
        Ok(())
    }

    fn add_class_file(&mut self, key: &str, path: &Path, own: bool) -> Result<()> {
        self.add_resource(key, StructEntry::file(path))?;
        self.register_class(key, own)
    }

    fn scan_zip_file(&mut self, path: &Path, own: bool) -> Result<()> {
        let archive = Arc::new(SharedArchive::open(path)?);
        let mut registered = 0usize;
        let result = self.scan_zip_members(&archive, own, &mut registered);

        if registered == 0 {
            archive.close()?;
            debug!(path = %path.display(), "nothing registered, archive closed");
        }
        result.with_context(|| format!("Failed to scan archive: {}", path.display()))
    }

    fn scan_zip_members(
        &mut self,
        archive: &Arc<SharedArchive>,
        own: bool,
        registered: &mut usize,
    ) -> Result<()> {
        for member in archive.members()? {
            if member.is_dir {
                continue;
            }
            let is_class = member.name.ends_with(".class");
            if !is_class && !own {
                continue;
            }

            let entry = StructEntry::archive(Arc::clone(archive), member.index, &member.name);
            self.add_resource(&member.name, entry)?;
            *registered += 1;
            if is_class {
                self.register_class(&member.name, own)?;
            }
        }
        Ok(())
    }

    fn add_resource(&mut self, key: &str, entry: StructEntry) -> Result<()> {
        if let Some(current) = self.entries.get(key) {
            return Err(StoreError::DuplicateResource {
                key: key.to_string(),
                entry: entry.to_string(),
                current: current.to_string(),
            }
            .into());
        }
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    /// Parses the class behind the just-registered resource `key`.
    fn register_class(&mut self, key: &str, own: bool) -> Result<()> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| anyhow!("resource {key} is not registered"))?;
        let class = StructClass::parse(&entry.read()?, own, key)?;

        if self.classes.contains_key(&class.qualified_name) {
            return Err(StoreError::DuplicateClass(class.qualified_name).into());
        }
        debug!(class = %class.qualified_name, source = key, own, "registered class");
        Arc::make_mut(&mut self.classes).insert(class.qualified_name.clone(), Arc::new(class));
        Ok(())
    }
}

impl StructContext for FileStructContext {
    fn classes(&self) -> Arc<ClassMap> {
        Arc::clone(&self.classes)
    }

    fn get_class(&self, name: &str) -> Option<Arc<StructClass>> {
        self.classes.get(name).cloned()
    }

    fn read_class(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.classes.get(name) {
            Some(class) => self.read_class_of(class),
            None => Ok(None),
        }
    }

    fn read_class_of(&self, class: &StructClass) -> Result<Option<Vec<u8>>> {
        self.read_resource(&class.source)
    }

    fn resources(&self) -> BTreeSet<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    fn open_resource(&self, name: &str) -> Result<Option<ByteStream>> {
        self.entries.get(name).map(StructEntry::open).transpose()
    }

    fn read_resource(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.entries.get(name).map(StructEntry::read).transpose()
    }

    fn reload_context(&mut self) -> Result<()> {
        let mut reloaded = ClassMap::with_capacity(self.classes.len());
        let mut changed = 0usize;

        for old in self.classes.values() {
            let bytes = self.read_class_of(old)?.ok_or_else(|| {
                anyhow!("resource {} of {} is gone", old.source, old.qualified_name)
            })?;
            let class = StructClass::parse(&bytes, old.is_own(), old.source.clone())?;
            if class.content_hash != old.content_hash {
                changed += 1;
            }
            if reloaded.contains_key(&class.qualified_name) {
                return Err(StoreError::DuplicateClass(class.qualified_name).into());
            }
            reloaded.insert(class.qualified_name.clone(), Arc::new(class));
        }

        info!(classes = reloaded.len(), changed, "reloaded context");
        self.classes = Arc::new(reloaded);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for (key, entry) in &self.entries {
            if let Err(err) = entry.close() {
                warn!(resource = %key, error = %err, "failed to close entry");
                failures.push(err.context(format!("Failed to close {key}")));
            }
        }
        collect_close_failures(failures)
    }
}

fn file_name_key(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Path has no file name: {}", path.display()))
}
