//! Conversions between the two spellings of a class name.
//!
//! The loader API speaks binary names (`java.lang.Object`), class files store internal
//! names (`java/lang/Object`) and resources are addressed by path (`java/lang/Object.class`).

/// `a.b.C` -> `a/b/C`
pub fn to_internal(binary_name: &str) -> String {
    binary_name.replace('.', "/")
}

/// `a/b/C` -> `a.b.C`
pub fn to_binary(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

/// The path a class is stored under inside a classpath root.
pub fn class_resource_path(binary_name: &str) -> String {
    format!("{}.class", to_internal(binary_name))
}

/// The package a binary name lives in, or `None` for the unnamed package.
pub fn package_of(binary_name: &str) -> Option<&str> {
    binary_name.rfind('.').map(|idx| &binary_name[..idx])
}

/// Whether `name` can be looked up at all. Internal names and descriptors are refused.
pub fn is_binary_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(|c| matches!(c, '/' | '[' | ';'))
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains("..")
}

/// Every package enclosing `package`, most specific first.
pub fn enclosing_packages(package: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(package);
    std::iter::from_fn(move || {
        let current = rest?;
        rest = package_of(current);
        Some(current)
    })
}
