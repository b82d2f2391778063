//! Classifies a tool call into a [`RiskLevel`], following the
//! fixed table in this spec: `read_file`/`list_directory` are always LOW;
//! `write_file` depends on the target extension; `execute_command` depends on
//! which bucket the invoked binary falls into. Anything outside the
//! canonical tool set falls back to a conservative params-based heuristic
//! rather than a blanket MEDIUM, since a future tool's name alone says
//! nothing about its blast radius.

use atrium_core::RiskLevel;
use serde_json::Value;

const LOW_RISK_TOOLS: &[&str] = &["read_file", "list_directory", "search", "web_search"];

/// Text/source/config extensions: a `write_file` call targeting one of these
/// is MEDIUM. Anything else (including no extension at all) is treated as
/// HIGH, since an unrecognized or executable extension is the riskier
/// default.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rst", "json", "yaml", "yml", "toml", "ini", "cfg", "conf", "env", "csv", "xml",
    "html", "css", "rs", "py", "js", "ts", "jsx", "tsx", "go", "java", "c", "h", "cpp", "hpp",
    "rb", "sh", "sql",
];

/// `execute_command`'s information-only subset: read-only, side-effect-free.
const LOW_RISK_COMMANDS: &[&str] =
    &["grep", "find", "ls", "cat", "head", "tail", "wc", "echo", "date", "pwd", "whoami"];

/// Modification subset: mutates project state but through an ordinary,
/// reviewable surface (vcs, package/runtime invocation).
const MEDIUM_RISK_COMMAND_PREFIXES: &[&str] = &["git", "npm", "python", "python3", "node"];

/// Build/packaging/archive subset: compiles, links, or bundles arbitrary
/// bytes — broad enough blast radius to warrant the high-risk timeout.
const HIGH_RISK_COMMANDS: &[&str] = &["gcc", "g++", "clang", "make", "cmake", "tar", "zip", "unzip"];

/// Commands that are never executed regardless of risk tier; caught here too
/// so risk assessment and [`crate::validation::validate_tool_call`] agree
/// rather than one admitting what the other would reject.
const ALWAYS_DENIED_COMMANDS: &[&str] = &["rm", "dd", "mkfs", "sudo", "su"];

pub struct RiskAssessor;

impl RiskAssessor {
    pub fn assess(tool_name: &str, params: &Value) -> RiskLevel {
        match tool_name {
            "write_file" => Self::assess_write_file(params),
            "execute_command" => Self::assess_command(params),
            _ if LOW_RISK_TOOLS.contains(&tool_name) => RiskLevel::Low,
            _ if Self::params_imply_destructive_intent(params) => RiskLevel::High,
            _ => RiskLevel::Medium,
        }
    }

    fn assess_write_file(params: &Value) -> RiskLevel {
        let path = params
            .get("path")
            .or_else(|| params.get("file_path"))
            .and_then(Value::as_str)
            .unwrap_or("");
        match extension_of(path) {
            Some(ext) if TEXT_EXTENSIONS.contains(&ext.as_str()) => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    fn assess_command(params: &Value) -> RiskLevel {
        let command = params.get("command").and_then(Value::as_str).unwrap_or("");
        let binary = command.split_whitespace().next().unwrap_or(command);
        let binary = binary.rsplit('/').next().unwrap_or(binary);

        if ALWAYS_DENIED_COMMANDS.contains(&binary) {
            return RiskLevel::High;
        }
        if LOW_RISK_COMMANDS.contains(&binary) {
            return RiskLevel::Low;
        }
        if HIGH_RISK_COMMANDS.contains(&binary) {
            return RiskLevel::High;
        }
        if MEDIUM_RISK_COMMAND_PREFIXES.contains(&binary) {
            return RiskLevel::Medium;
        }
        if Self::params_imply_destructive_intent(params) {
            return RiskLevel::High;
        }
        RiskLevel::Medium
    }

    fn params_imply_destructive_intent(params: &Value) -> bool {
        match params {
            Value::String(s) => {
                let lower = s.to_lowercase();
                ["--force", "rm -rf", "drop "].iter().any(|needle| lower.contains(needle))
            }
            Value::Object(map) => map.values().any(Self::params_imply_destructive_intent),
            Value::Array(items) => items.iter().any(Self::params_imply_destructive_intent),
            _ => false,
        }
    }
}

fn extension_of(path: &str) -> Option<String> {
    path.rsplit('.').next().filter(|ext| *ext != path).map(|ext| ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_read_only_tools_are_low_risk() {
        assert_eq!(RiskAssessor::assess("read_file", &json!({})), RiskLevel::Low);
        assert_eq!(RiskAssessor::assess("list_directory", &json!({})), RiskLevel::Low);
    }

    #[test]
    fn write_file_to_source_extension_is_medium() {
        let params = json!({"path": "src/main.rs", "content": "fn main() {}"});
        assert_eq!(RiskAssessor::assess("write_file", &params), RiskLevel::Medium);
    }

    #[test]
    fn write_file_to_executable_extension_is_high() {
        let params = json!({"path": "dist/tool.exe", "content": ""});
        assert_eq!(RiskAssessor::assess("write_file", &params), RiskLevel::High);
    }

    #[test]
    fn write_file_with_no_extension_defaults_high() {
        let params = json!({"path": "Makefile.generated"});
        assert_eq!(RiskAssessor::assess("write_file", &params), RiskLevel::High);
    }

    #[test]
    fn information_only_commands_are_low_risk() {
        assert_eq!(RiskAssessor::assess("execute_command", &json!({"command": "grep foo ."})), RiskLevel::Low);
    }

    #[test]
    fn modification_commands_are_medium_risk() {
        assert_eq!(
            RiskAssessor::assess("execute_command", &json!({"command": "git commit -am wip"})),
            RiskLevel::Medium
        );
    }

    #[test]
    fn build_and_archive_commands_are_high_risk() {
        assert_eq!(RiskAssessor::assess("execute_command", &json!({"command": "make all"})), RiskLevel::High);
        assert_eq!(RiskAssessor::assess("execute_command", &json!({"command": "tar -czf out.tar.gz ."})), RiskLevel::High);
    }

    #[test]
    fn always_denied_commands_are_high_risk_even_before_validation_runs() {
        assert_eq!(RiskAssessor::assess("execute_command", &json!({"command": "sudo rm -rf /"})), RiskLevel::High);
    }

    #[test]
    fn unknown_command_defaults_to_medium() {
        assert_eq!(RiskAssessor::assess("execute_command", &json!({"command": "some_custom_tool"})), RiskLevel::Medium);
    }

    #[test]
    fn unknown_tool_defaults_to_medium_risk() {
        assert_eq!(RiskAssessor::assess("summarize_document", &json!({})), RiskLevel::Medium);
    }

    #[test]
    fn unknown_tool_with_forceful_params_escalates_to_high() {
        let params = json!({"args": "git push --force"});
        assert_eq!(RiskAssessor::assess("run_git", &params), RiskLevel::High);
    }
}
