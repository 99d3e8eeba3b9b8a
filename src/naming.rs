/// Maps a class resource key to the entry name its rendered source is
/// written under: `a/b/Foo.class` becomes `a/b/Foo.java`.
///
/// With `renamed_class` (internal form) the directory part of the entry is
/// kept and the renamed class's simple name is used instead. Returns `None`
/// for entries that are not class files.
///
/// Nested classes are not filtered: `a/Foo$1.class` maps to `a/Foo$1.java`.
/// Only a class header knows whether it is a root class, so callers that
/// emit one source per top-level class must skip nested ones themselves.
pub fn source_entry_name(entry_name: &str, renamed_class: Option<&str>) -> Option<String> {
    let stem = entry_name.strip_suffix(".class")?;
    match renamed_class {
        Some(class) => {
            let simple = class.rsplit('/').next().unwrap_or(class);
            let dir = entry_name.rfind('/').map_or("", |i| &entry_name[..=i]);
            Some(format!("{dir}{simple}.java"))
        }
        None => Some(format!("{stem}.java")),
    }
}

/// `a/b/Foo` -> `a.b.Foo`
pub fn to_binary_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}
