//! Architecture enforcement lint - keeps the layers of the client apart.
//!
//! - `protocol/` is a pure codec: no runtime, no sockets, no session state.
//! - Only `session/` opens sockets or spawns tasks.
//! - `session/` reports through `EventSink` and never reaches for the bus,
//!   which belongs to the host.
//!
//! Text-based: a rule matches the paths a file names, not types.

use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// (directory or file, forbidden pattern, suggestion)
const RULES: &[(&str, &str, &str)] = &[
    ("protocol/", "tokio", "Keep parsing synchronous; do I/O in session/"),
    ("protocol/", "crate::session", "The codec must not know about sessions"),
    ("protocol/", "crate::state", "Return parsed values; let session/ apply them"),
    ("state.rs", "tokio", "Playback state is plain atomics"),
    ("players.rs", "tokio", "The player registry is plain data"),
    ("session/", "crate::bus", "Report through EventSink; the host wires up the bus"),
];

/// Only these may open sockets
const SOCKET_OWNERS: &[&str] = &["session/"];

fn relative(path: &Path) -> String {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    path.strip_prefix(&src_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Skip everything from the first `#[cfg(test)]` on
fn production_part(content: &str) -> &str {
    match content.find("#[cfg(test)]") {
        Some(pos) => &content[..pos],
        None => content,
    }
}

fn analyze_file(path: &Path) -> Vec<(String, String, String)> {
    let name = relative(path);
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return vec![],
    };
    let code = production_part(&content);

    let mut violations = Vec::new();
    let mut check = |pattern: &str, suggestion: &str| {
        for (index, line) in code.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("//") {
                continue;
            }
            if line.contains(pattern) {
                violations.push((
                    format!("{}:{}", name, index + 1),
                    pattern.to_string(),
                    suggestion.to_string(),
                ));
            }
        }
    };

    for (scope, pattern, suggestion) in RULES {
        if name.starts_with(scope) {
            check(pattern, suggestion);
        }
    }
    // main.rs is the host; it only ever talks to the session manager
    if !SOCKET_OWNERS.iter().any(|owner| name.starts_with(owner)) {
        check("TcpStream", "Only session/ may open connections");
    }

    violations
}

#[test]
fn layers_stay_separate() {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");

    let mut all_violations = Vec::new();

    for entry in WalkDir::new(&src_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
    {
        all_violations.extend(analyze_file(entry.path()));
    }

    if !all_violations.is_empty() {
        let mut error_msg = String::from(
            "\n\nARCHITECTURE VIOLATION: layer boundary crossed\n\n\
            protocol/ parses, session/ does I/O and owns state, the host wires\n\
            observers to the bus.\n\n\
            Violations found:\n\n",
        );

        for (location, pattern, suggestion) in &all_violations {
            error_msg.push_str(&format!("  {} \n", location));
            error_msg.push_str(&format!("    Found: {}\n", pattern));
            error_msg.push_str(&format!("    Fix: {}\n\n", suggestion));
        }

        panic!("{}", error_msg);
    }
}

#[test]
fn session_manager_is_the_public_entry_point() {
    let lib = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join("lib.rs");

    let content = fs::read_to_string(&lib).expect("Failed to read lib.rs");

    assert!(
        content.contains("pub use session::SessionManager;"),
        "lib.rs must re-export `SessionManager`"
    );
}
