//! Operating-system bridge: command lookup, external processes, modules.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    path.metadata().is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Resolves a command name against `PATH`. A name containing `/` is checked
/// directly and never searched.
pub(crate) fn find_in_path(command: &str) -> Option<PathBuf> {
    if command.is_empty() {
        return None;
    }
    if command.contains('/') {
        let path = PathBuf::from(command);
        return is_executable(&path).then_some(path);
    }
    let path_env = std::env::var_os("PATH")?;
    std::env::split_paths(&path_env)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

/// Runs an external command, inheriting the shell's stdio, and returns its
/// exit status (or -1 when the process was killed by a signal).
pub(crate) fn run_command(path: &Path, args: &[String]) -> std::io::Result<i32> {
    let status = Command::new(path).args(args).status()?;
    Ok(status.code().unwrap_or(-1))
}

/// Resolves a module spec against a `:`-separated module path.
///
/// A slash-free spec is rewritten first: `a.b` becomes `a/b.keel` (the last
/// dot turns into a separator) and a bare name gets the `.keel` extension.
/// The rewritten path is tried directly, then under each module-path entry.
pub(crate) fn resolve_module(spec: &str, module_path: &str) -> Option<PathBuf> {
    let mut rel = spec.to_owned();
    if !rel.contains('/') && !rel.ends_with(".keel") {
        if let Some(dot) = rel.rfind('.') {
            rel.replace_range(dot..=dot, "/");
        }
        rel.push_str(".keel");
    }

    let direct = PathBuf::from(&rel);
    if direct.is_file() {
        return Some(direct);
    }
    if spec.contains('/') {
        return None;
    }
    module_path
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(&rel))
        .find(|candidate| candidate.is_file())
}
