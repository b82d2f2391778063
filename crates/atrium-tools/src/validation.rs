//! Server-side tool call validation, run before any approval is
//! ever opened: path traversal, command allow/deny lists, and size limits.
//! A request that fails here never reaches a human reviewer.

use atrium_config::ToolsConfig;
use atrium_core::CoreError;
use serde_json::Value;

/// Rejects any string parameter that looks like a path-traversal attempt.
/// Deliberately conservative: a literal `..` component anywhere is refused,
/// even in tools that are not filesystem tools, since params are untyped.
fn contains_path_traversal(value: &Value) -> bool {
    match value {
        Value::String(s) => s.split(['/', '\\']).any(|segment| segment == ".."),
        Value::Array(items) => items.iter().any(contains_path_traversal),
        Value::Object(map) => map.values().any(contains_path_traversal),
        _ => false,
    }
}

/// True for a POSIX-absolute (`/...`) or Windows-absolute (`C:\...`) path.
/// The client's workspace root is an opaque string this server never
/// dereferences, so there is no root to normalize an absolute path against —
/// any absolute path is necessarily outside it and is refused outright.
fn is_absolute_path(s: &str) -> bool {
    if s.starts_with('/') || s.starts_with('\\') {
        return true;
    }
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn contains_absolute_path(value: &Value) -> bool {
    match value {
        Value::String(s) => is_absolute_path(s),
        Value::Array(items) => items.iter().any(contains_absolute_path),
        Value::Object(map) => map.values().any(contains_absolute_path),
        _ => false,
    }
}

fn command_from_params(params: &Value) -> Option<&str> {
    params.get("command").and_then(Value::as_str)
}

/// Extensions a `write_file` call may never target, regardless of risk
/// tier: these are rejected at validation, before any approval is opened,
/// not merely flagged HIGH by `crate::risk`.
const DANGEROUS_WRITE_EXTENSIONS: &[&str] = &["exe", "bin", "so", "dll"];

fn path_param(params: &Value) -> Option<&str> {
    params.get("path").or_else(|| params.get("file_path")).and_then(Value::as_str)
}

fn extension_of(path: &str) -> Option<String> {
    path.rsplit('.').next().filter(|ext| *ext != path).map(|ext| ext.to_lowercase())
}

/// Package-manager *install* subcommands are denied outright regardless of
/// allow/deny lists: the manager itself (`npm`, `pip`, `apt`, ...) is
/// otherwise a perfectly ordinary, allow-listable binary, but pulling in
/// arbitrary third-party code is the one invocation shape this spec singles
/// out as never approvable.
const PACKAGE_MANAGERS: &[&str] = &["npm", "pip", "pip3", "apt", "apt-get", "yum", "cargo", "gem"];
const INSTALL_SUBCOMMANDS: &[&str] = &["install", "i", "add"];

fn is_package_manager_install(binary: &str, command: &str) -> bool {
    if !PACKAGE_MANAGERS.contains(&binary) {
        return false;
    }
    command.split_whitespace().skip(1).any(|arg| INSTALL_SUBCOMMANDS.contains(&arg))
}

pub fn validate_tool_call(config: &ToolsConfig, tool_name: &str, params: &Value) -> Result<(), CoreError> {
    let encoded_len = serde_json::to_vec(params).map(|b| b.len()).unwrap_or(usize::MAX);
    if encoded_len > config.max_param_bytes {
        return Err(CoreError::Validation(format!(
            "tool {tool_name} params exceed {} bytes",
            config.max_param_bytes
        )));
    }

    if contains_path_traversal(params) {
        return Err(CoreError::Validation(format!(
            "tool {tool_name} params contain a path traversal segment"
        )));
    }

    if contains_absolute_path(params) {
        return Err(CoreError::Validation(format!(
            "tool {tool_name} params contain an absolute path outside the workspace root"
        )));
    }

    if tool_name == "write_file" {
        if let Some(ext) = path_param(params).and_then(extension_of) {
            if DANGEROUS_WRITE_EXTENSIONS.contains(&ext.as_str()) {
                return Err(CoreError::Validation(format!(
                    "write_file to a .{ext} target is not permitted"
                )));
            }
        }
    }

    if let Some(command) = command_from_params(params) {
        let binary = command.split_whitespace().next().unwrap_or(command);
        if config.command_deny_list.iter().any(|d| d == binary) {
            return Err(CoreError::Validation(format!("command {binary} is denied")));
        }
        if is_package_manager_install(binary, command) {
            return Err(CoreError::Validation(format!(
                "command {binary} install operations are denied"
            )));
        }
        // argv[0] *must* be on the allow list — enforced unconditionally, not
        // only when the list happens to be non-empty, so an empty
        // `command_allow_list` denies every command rather than admitting
        // all of them.
        if !config.command_allow_list.iter().any(|a| a == binary) {
            return Err(CoreError::Validation(format!("command {binary} is not on the allow list")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ToolsConfig {
        ToolsConfig::default()
    }

    #[test]
    fn rejects_path_traversal_in_nested_param() {
        let params = json!({"path": "a/../../etc/passwd"});
        let result = validate_tool_call(&config(), "read_file", &params);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_denied_command() {
        let params = json!({"command": "rm -rf /"});
        let result = validate_tool_call(&config(), "execute_command", &params);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_package_manager_install_regardless_of_allow_list() {
        let mut cfg = config();
        cfg.command_allow_list = vec!["npm".to_string()];
        let params = json!({"command": "npm install left-pad"});
        assert!(validate_tool_call(&cfg, "execute_command", &params).is_err());
    }

    #[test]
    fn rejects_absolute_path_outside_workspace_root() {
        let params = json!({"path": "/etc/passwd"});
        assert!(validate_tool_call(&config(), "read_file", &params).is_err());
    }

    #[test]
    fn rejects_write_file_to_dangerous_extension() {
        let params = json!({"path": "dist/tool.exe", "content": ""});
        assert!(validate_tool_call(&config(), "write_file", &params).is_err());
    }

    #[test]
    fn accepts_write_file_to_source_extension() {
        let params = json!({"path": "src/main.rs", "content": "fn main() {}"});
        assert!(validate_tool_call(&config(), "write_file", &params).is_ok());
    }

    #[test]
    fn accepts_benign_params() {
        let params = json!({"path": "src/main.rs"});
        assert!(validate_tool_call(&config(), "read_file", &params).is_ok());
    }

    #[test]
    fn rejects_oversized_params() {
        let mut cfg = config();
        cfg.max_param_bytes = 8;
        let params = json!({"path": "src/main.rs"});
        assert!(validate_tool_call(&cfg, "read_file", &params).is_err());
    }

    #[test]
    fn allow_list_restricts_to_named_commands() {
        let mut cfg = config();
        cfg.command_allow_list = vec!["ls".to_string()];
        assert!(validate_tool_call(&cfg, "execute_command", &json!({"command": "ls -la"})).is_ok());
        assert!(validate_tool_call(&cfg, "execute_command", &json!({"command": "cat secret"})).is_err());
    }
}
