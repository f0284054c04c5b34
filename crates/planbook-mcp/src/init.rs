//! `planbook-mcp init [DATA_DIR]`: register the server with the MCP clients
//! found on PATH, pinning the book it should open.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use planbook_core::store::{data_dir, DIR_ENV};
use serde_json::Value;

type InitResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const SERVER_NAME: &str = "planbook";

/// How a client launches this server. Both config formats are rendered from it.
#[derive(Debug, Clone, PartialEq)]
struct ServerEntry {
    command: String,
    /// Passed as `PLANBOOK_DIR` so every session in the project opens the same book.
    data_dir: PathBuf,
}

impl ServerEntry {
    fn data_dir_text(&self) -> String {
        self.data_dir.to_string_lossy().into_owned()
    }

    fn to_json(&self) -> Value {
        let mut env = serde_json::Map::new();
        env.insert(DIR_ENV.to_string(), Value::String(self.data_dir_text()));
        serde_json::json!({
            "type": "stdio",
            "command": self.command,
            "args": [],
            "env": env,
        })
    }

    fn to_toml(&self) -> toml_edit::Table {
        let mut env = toml_edit::InlineTable::new();
        env.insert(DIR_ENV, self.data_dir_text().into());
        let mut table = toml_edit::Table::new();
        table.insert("command", toml_edit::value(self.command.as_str()));
        table.insert("args", toml_edit::value(toml_edit::Array::new()));
        table.insert("env", toml_edit::value(env));
        table
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Client {
    ClaudeCode,
    Codex,
}

impl Client {
    const ALL: [Client; 2] = [Client::ClaudeCode, Client::Codex];

    fn label(self) -> &'static str {
        match self {
            Client::ClaudeCode => "Claude Code",
            Client::Codex => "Codex",
        }
    }

    fn binary(self) -> &'static str {
        match self {
            Client::ClaudeCode => "claude",
            Client::Codex => "codex",
        }
    }

    fn config_path(self, project: &Path) -> PathBuf {
        match self {
            Client::ClaudeCode => project.join(".mcp.json"),
            Client::Codex => project.join(".codex").join("config.toml"),
        }
    }

    fn installed(self, search_path: &OsStr) -> bool {
        let name = self.binary();
        std::env::split_paths(search_path)
            .any(|dir| dir.join(name).is_file() || dir.join(format!("{name}.exe")).is_file())
    }

    /// Merge `entry` into this client's project config, keeping other servers.
    fn register(self, project: &Path, entry: &ServerEntry) -> InitResult<PathBuf> {
        let path = self.config_path(project);
        let existing = match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let merged = match self {
            Client::ClaudeCode => merge_mcp_json(existing.as_deref(), entry)?,
            Client::Codex => merge_codex_toml(existing.as_deref(), entry),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, merged)?;
        Ok(path)
    }
}

/// An unparseable existing file is replaced.
fn merge_mcp_json(existing: Option<&str>, entry: &ServerEntry) -> InitResult<String> {
    let mut root = existing
        .and_then(|text| serde_json::from_str::<Value>(text).ok())
        .filter(Value::is_object)
        .unwrap_or_else(|| serde_json::json!({}));
    if !root["mcpServers"].is_object() {
        root["mcpServers"] = serde_json::json!({});
    }
    root["mcpServers"][SERVER_NAME] = entry.to_json();
    Ok(serde_json::to_string_pretty(&root)?)
}

fn merge_codex_toml(existing: Option<&str>, entry: &ServerEntry) -> String {
    let mut doc: toml_edit::DocumentMut = existing
        .and_then(|text| text.parse().ok())
        .unwrap_or_default();
    if !doc.contains_table("mcp_servers") {
        let mut servers = toml_edit::Table::new();
        servers.set_implicit(true);
        doc["mcp_servers"] = toml_edit::Item::Table(servers);
    }
    doc["mcp_servers"][SERVER_NAME] = toml_edit::Item::Table(entry.to_toml());
    doc.to_string()
}

/// `data_dir` is resolved against the current directory; without it the
/// default book location (`$PLANBOOK_DIR` or `~/.planbook`) is pinned.
pub fn init_project(data_dir_arg: Option<String>) -> InitResult {
    let project = std::env::current_dir()?;
    let entry = ServerEntry {
        command: std::env::current_exe()?
            .canonicalize()?
            .to_string_lossy()
            .into_owned(),
        data_dir: data_dir_arg.map_or_else(data_dir, |dir| project.join(dir)),
    };

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    let clients: Vec<Client> = Client::ALL
        .into_iter()
        .filter(|c| c.installed(&search_path))
        .collect();
    if clients.is_empty() {
        return Err("neither `claude` nor `codex` found in PATH".into());
    }

    for client in &clients {
        let path = client.register(&project, &entry)?;
        eprintln!("Wrote {}", path.display());
    }
    let labels: Vec<&str> = clients.iter().map(|c| c.label()).collect();
    eprintln!(
        "\nDone. {} will use the book in {}.",
        labels.join(" and "),
        entry.data_dir.display()
    );
    Ok(())
}
