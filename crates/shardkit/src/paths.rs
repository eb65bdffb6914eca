//! Forward-slash path helpers for shard destinations
//!
//! Destinations are artifact paths, not host filesystem paths: they are always
//! joined and compared with `/` so the generated loaders are identical on every
//! platform.

/// Directory part of `path`, `"."` when there is none
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(index) => &path[..index],
        None => ".",
    }
}

/// Final component of `path`
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Join a directory and a file name
pub fn join(dir: &str, file: &str) -> String {
    if dir.is_empty() || dir == "." {
        file.to_owned()
    } else if dir.ends_with('/') {
        format!("{dir}{file}")
    } else {
        format!("{dir}/{file}")
    }
}

/// Path of `to` relative to the directory `from_dir`
pub fn relative(from_dir: &str, to: &str) -> String {
    let from = components(from_dir);
    let target = components(to);

    let common = from
        .iter()
        .zip(&target)
        .take_while(|(left, right)| left == right)
        .count();

    std::iter::repeat_n("..", from.len() - common)
        .chain(target[common..].iter().copied())
        .collect::<Vec<_>>()
        .join("/")
}

fn components(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|component| !component.is_empty() && *component != ".")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirname_and_basename() {
        assert_eq!(dirname("dist/js/main.js"), "dist/js");
        assert_eq!(dirname("main.js"), ".");
        assert_eq!(dirname("/main.js"), "/");
        assert_eq!(basename("dist/js/main.js"), "main.js");
        assert_eq!(basename("main.js"), "main.js");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("dist", "loader-main.js"), "dist/loader-main.js");
        assert_eq!(join("dist/", "a.js"), "dist/a.js");
        assert_eq!(join(".", "a.js"), "a.js");
    }

    #[test]
    fn test_relative() {
        assert_eq!(relative("dist", "dist/vendor.js"), "vendor.js");
        assert_eq!(relative("dist", "dist/deep/vendor.js"), "deep/vendor.js");
        assert_eq!(relative("dist/pages", "dist/vendor.js"), "../vendor.js");
        assert_eq!(relative(".", "vendor.js"), "vendor.js");
    }
}
