use std::fmt;
use std::path::{Component, Path, PathBuf};

//===============
// Path Handling
//===============
#[derive(Debug, PartialEq, Eq)]
pub enum PathValidationError {
    /// Resolves outside the destination directory.
    Escapes,
    /// More than one component where a bare name was required.
    NotSingleComponent,
    InvalidComponent,
    NullByte,
    Empty,
}

impl fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationError::Escapes => write!(f, "Path escapes the destination directory"),
            PathValidationError::NotSingleComponent => write!(f, "Path is not a single name"),
            PathValidationError::InvalidComponent => write!(f, "Path contains invalid component"),
            PathValidationError::NullByte => write!(f, "Path contains null byte"),
            PathValidationError::Empty => write!(f, "Path is empty"),
        }
    }
}

impl std::error::Error for PathValidationError {}

fn check_raw(name: &str) -> Result<(), PathValidationError> {
    if name.is_empty() {
        return Err(PathValidationError::Empty);
    }

    // rust uses C-style APIs so \0 can end str early
    if name.contains('\0') {
        return Err(PathValidationError::NullByte);
    }

    Ok(())
}

/// Lexically resolve `.` and `..` without touching the filesystem.
/// `..` at the root stays at the root, like the kernel does.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

fn leading_parents(path: &Path) -> usize {
    path.components()
        .take_while(|c| matches!(c, Component::ParentDir))
        .count()
}

/// Resolve an untrusted entry name against `dest_dir` and accept it only if
/// the result stays at or below `dest_dir`.
///
/// Containment is decided per path component (`Path::starts_with`), never
/// by string prefix: `/tmp/out-real-evil/x` is not inside `/tmp/out-real`.
/// An absolute entry replaces the base on join and is rejected unless it
/// happens to land inside `dest_dir`. A relative `dest_dir` keeps its own
/// leading `..` components; the result may not climb any further.
pub fn validate_entry_path(dest_dir: &Path, entry_name: &str) -> Result<PathBuf, PathValidationError> {
    check_raw(entry_name)?;

    let base = normalize(dest_dir);
    let candidate = normalize(&base.join(entry_name));

    if candidate.starts_with(&base) && leading_parents(&candidate) == leading_parents(&base) {
        Ok(candidate)
    } else {
        Err(PathValidationError::Escapes)
    }
}

/// Like [`validate_entry_path`] but the result must be strictly inside
/// `dest_dir`: a top-level transfer name may not resolve to the directory
/// itself.
pub fn validate_child_path(dest_dir: &Path, name: &str) -> Result<PathBuf, PathValidationError> {
    let candidate = validate_entry_path(dest_dir, name)?;
    if candidate == normalize(dest_dir) {
        return Err(PathValidationError::InvalidComponent);
    }
    Ok(candidate)
}

/// A bare name usable as one path component (no separators, no `..`).
pub fn validate_component(name: &str) -> Result<(), PathValidationError> {
    check_raw(name)?;

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::Normal(_)), Some(_)) => Err(PathValidationError::NotSingleComponent),
        _ => Err(PathValidationError::InvalidComponent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_nested_entries() {
        let dest = Path::new("/tmp/out/photos");
        assert_eq!(
            validate_entry_path(dest, "a/b/c.jpg").unwrap(),
            PathBuf::from("/tmp/out/photos/a/b/c.jpg")
        );
        assert_eq!(
            validate_entry_path(dest, "./a/../b.jpg").unwrap(),
            PathBuf::from("/tmp/out/photos/b.jpg")
        );
    }

    #[test]
    fn test_accepts_destination_itself() {
        let dest = Path::new("/tmp/out/photos");
        assert_eq!(validate_entry_path(dest, "./").unwrap(), PathBuf::from(dest));
        assert_eq!(validate_entry_path(dest, "a/..").unwrap(), PathBuf::from(dest));
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let dest = Path::new("/tmp/out/photos");
        assert_eq!(
            validate_entry_path(dest, "../../evil.sh"),
            Err(PathValidationError::Escapes)
        );
        assert_eq!(
            validate_entry_path(dest, "a/../../b"),
            Err(PathValidationError::Escapes)
        );
    }

    #[test]
    fn test_rejects_absolute_entry() {
        let dest = Path::new("/tmp/out/photos");
        assert_eq!(
            validate_entry_path(dest, "/etc/passwd"),
            Err(PathValidationError::Escapes)
        );
    }

    // A string-prefix check would accept this: "/tmp/out-real-evil/x"
    // starts with the characters "/tmp/out-real".
    #[test]
    fn test_rejects_sibling_with_shared_prefix() {
        let dest = Path::new("/tmp/out-real");
        assert_eq!(
            validate_entry_path(dest, "../out-real-evil/x"),
            Err(PathValidationError::Escapes)
        );
        assert!("/tmp/out-real-evil/x".starts_with("/tmp/out-real"));
    }

    #[test]
    fn test_relative_destinations_are_bounded() {
        for dest in ["", ".", "..", "out", "../out"] {
            for entry in ["../evil.sh", "../../etc/x", "a/../../b"] {
                assert_eq!(
                    validate_entry_path(Path::new(dest), entry),
                    Err(PathValidationError::Escapes),
                    "{dest:?} + {entry:?}"
                );
            }
        }

        assert_eq!(
            validate_entry_path(Path::new("."), "a/b.txt").unwrap(),
            PathBuf::from("a/b.txt")
        );
        assert_eq!(
            validate_entry_path(Path::new(".."), "x").unwrap(),
            PathBuf::from("../x")
        );
        assert_eq!(
            validate_entry_path(Path::new("../out"), "sub/x").unwrap(),
            PathBuf::from("../out/sub/x")
        );
        assert_eq!(
            validate_child_path(Path::new(""), "."),
            Err(PathValidationError::InvalidComponent)
        );
    }

    #[test]
    fn test_rejects_empty_and_null() {
        let dest = Path::new("/tmp/out");
        assert_eq!(validate_entry_path(dest, ""), Err(PathValidationError::Empty));
        assert_eq!(
            validate_entry_path(dest, "file\0.txt"),
            Err(PathValidationError::NullByte)
        );
    }

    #[test]
    fn test_dotdot_at_root_is_clamped() {
        assert_eq!(normalize(Path::new("/../../etc")), PathBuf::from("/etc"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_child_path_must_not_be_destination() {
        let dest = Path::new("/tmp/out");
        assert!(validate_child_path(dest, "report.pdf").is_ok());
        assert_eq!(
            validate_child_path(dest, "."),
            Err(PathValidationError::InvalidComponent)
        );
        assert_eq!(
            validate_child_path(dest, "../report.pdf"),
            Err(PathValidationError::Escapes)
        );
    }

    #[test]
    fn test_component_validation() {
        assert!(validate_component("7-guitarist-revenge").is_ok());
        assert_eq!(
            validate_component("a/b"),
            Err(PathValidationError::NotSingleComponent)
        );
        assert_eq!(
            validate_component(".."),
            Err(PathValidationError::InvalidComponent)
        );
        assert_eq!(
            validate_component("/abs"),
            Err(PathValidationError::InvalidComponent)
        );
        assert_eq!(validate_component(""), Err(PathValidationError::Empty));
    }
}
