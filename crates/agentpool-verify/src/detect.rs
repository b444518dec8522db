//! Test / type-check command detection (spec §4.D). Project-specific and
//! intentionally small — spec §9 notes implementers may need to supply an
//! explicit command for anything unusual rather than extending this list.

use std::path::Path;

/// Detects a non-placeholder `test` command. Placeholder scripts (the
/// `create-react-app`/npm default `"echo \"Error: no test specified\" && exit 1"`)
/// don't count as a real test command.
pub fn detect_test_command(dir: &Path) -> Option<String> {
    if let Some(script) = package_json_script(dir, "test") {
        if !is_placeholder_script(&script) {
            return Some("npm test".to_string());
        }
    }

    if dir.join("pyproject.toml").is_file() || dir.join("setup.py").is_file() {
        return Some("pytest".to_string());
    }

    if dir.join("go.mod").is_file() {
        return Some("go test ./...".to_string());
    }

    None
}

/// Detects a type-check-capable project. Compile-only for Go, since Go has
/// no separate type checker.
pub fn detect_type_check_command(dir: &Path) -> Option<String> {
    if dir.join("tsconfig.json").is_file() {
        return Some("npx tsc --noEmit".to_string());
    }

    if dir.join("mypy.ini").is_file() || has_mypy_config(dir) {
        return Some("mypy .".to_string());
    }

    if dir.join("go.mod").is_file() {
        return Some("go build ./...".to_string());
    }

    None
}

fn package_json_script(dir: &Path, name: &str) -> Option<String> {
    let contents = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let value: serde_json::Value = serde_json::from_str(&contents).ok()?;
    value
        .get("scripts")?
        .get(name)?
        .as_str()
        .map(|s| s.to_string())
}

fn is_placeholder_script(script: &str) -> bool {
    script.contains("no test specified")
}

fn has_mypy_config(dir: &Path) -> bool {
    std::fs::read_to_string(dir.join("pyproject.toml"))
        .map(|contents| contents.contains("[tool.mypy]"))
        .unwrap_or(false)
}
