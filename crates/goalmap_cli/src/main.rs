//! CLI smoke and diagnostics entry point.
//!
//! # Responsibility
//! - Verify `goalmap_core` linkage with deterministic output.
//! - Summarize or drop a cached goal map without starting a sync session.
//!
//! # Invariants
//! - Output is metadata only; goal text is never printed.

use goalmap_core::{CacheKey, GoalMap, LocalCache, SqliteLocalCache, MAX_LEVEL, MIN_LEVEL};
use std::process::ExitCode;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Probe,
    Inspect { db_path: String, project_id: String },
    Clear { db_path: String, project_id: String },
    Usage,
}

fn parse_command(args: &[String]) -> Command {
    match args {
        [] => Command::Probe,
        [cmd, db_path, project_id] if cmd == "inspect" => Command::Inspect {
            db_path: db_path.clone(),
            project_id: project_id.clone(),
        },
        [cmd, db_path, project_id] if cmd == "clear" => Command::Clear {
            db_path: db_path.clone(),
            project_id: project_id.clone(),
        },
        _ => Command::Usage,
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_command(&args) {
        Command::Probe => {
            println!("goalmap_core ping={}", goalmap_core::ping());
            println!("goalmap_core version={}", goalmap_core::core_version());
            ExitCode::SUCCESS
        }
        Command::Inspect {
            db_path,
            project_id,
        } => match inspect(&db_path, &project_id) {
            Ok(lines) => {
                for line in lines {
                    println!("{line}");
                }
                ExitCode::SUCCESS
            }
            Err(message) => {
                eprintln!("inspect failed: {message}");
                ExitCode::FAILURE
            }
        },
        Command::Clear {
            db_path,
            project_id,
        } => match clear(&db_path, &project_id) {
            Ok(line) => {
                println!("{line}");
                ExitCode::SUCCESS
            }
            Err(message) => {
                eprintln!("clear failed: {message}");
                ExitCode::FAILURE
            }
        },
        Command::Usage => {
            eprintln!("usage: goalmap_cli [inspect|clear <cache-db> <project-id>]");
            ExitCode::from(2)
        }
    }
}

fn inspect(db_path: &str, project_id: &str) -> Result<Vec<String>, String> {
    let cache = SqliteLocalCache::open(db_path).map_err(|err| err.to_string())?;
    let key = CacheKey::goal_map(project_id);
    match cache.get(&key).map_err(|err| err.to_string())? {
        Some(map) => Ok(summarize(&key, &map)),
        None => Ok(vec![format!("key={key} cached=false")]),
    }
}

/// Drops the cached snapshot so the next load starts from the remote copy.
fn clear(db_path: &str, project_id: &str) -> Result<String, String> {
    let mut cache = SqliteLocalCache::open(db_path).map_err(|err| err.to_string())?;
    let key = CacheKey::goal_map(project_id);
    let removed = cache.remove(&key).map_err(|err| err.to_string())?;
    Ok(format!("key={key} removed={removed}"))
}

fn summarize(key: &CacheKey, map: &GoalMap) -> Vec<String> {
    let levels = (MIN_LEVEL..=MAX_LEVEL)
        .map(|level| format!("{level}:{}", map.level_count(level)))
        .collect::<Vec<_>>()
        .join(",");
    vec![
        format!("key={key} cached=true"),
        format!("map_id={}", map.id.as_deref().unwrap_or("<unsaved>")),
        format!(
            "nodes={} connections={} levels={levels}",
            map.node_count(),
            map.connections.len()
        ),
        format!(
            "revision={} last_updated={} completed={}",
            map.revision, map.last_updated, map.completed
        ),
        format!("violations={}", map.validate().len()),
    ]
}

#[cfg(test)]
mod tests {
    use super::{clear, inspect, parse_command, summarize, Command};
    use goalmap_core::{CacheKey, GoalMap, LocalCache, SqliteLocalCache};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_probe_inspect_and_usage() {
        assert_eq!(parse_command(&[]), Command::Probe);
        assert_eq!(
            parse_command(&args(&["inspect", "/tmp/cache.db", "p1"])),
            Command::Inspect {
                db_path: "/tmp/cache.db".to_string(),
                project_id: "p1".to_string(),
            }
        );
        assert_eq!(
            parse_command(&args(&["clear", "/tmp/cache.db", "p1"])),
            Command::Clear {
                db_path: "/tmp/cache.db".to_string(),
                project_id: "p1".to_string(),
            }
        );
        assert_eq!(parse_command(&args(&["inspect"])), Command::Usage);
    }

    #[test]
    fn clear_removes_only_the_named_project() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let db_path = path.to_str().unwrap();
        {
            let mut cache = SqliteLocalCache::open(&path).unwrap();
            for project_id in ["p1", "p2"] {
                let mut map = GoalMap::new(project_id, "Success Map");
                map.add_node("Goal", "", 1).unwrap();
                cache.set(&CacheKey::goal_map(project_id), &map).unwrap();
            }
        }

        assert_eq!(clear(db_path, "p1").unwrap(), "key=goal_mapping:p1 removed=true");
        assert_eq!(clear(db_path, "p1").unwrap(), "key=goal_mapping:p1 removed=false");
        assert_eq!(
            inspect(db_path, "p1").unwrap(),
            vec!["key=goal_mapping:p1 cached=false".to_string()]
        );
        assert!(inspect(db_path, "p2")
            .unwrap()
            .contains(&"key=goal_mapping:p2 cached=true".to_string()));
    }

    #[test]
    fn summary_omits_goal_text() {
        let mut map = GoalMap::new("p1", "Success Map");
        map.add_node("Secret plan", "", 2).unwrap();

        let lines = summarize(&CacheKey::goal_map("p1"), &map);

        assert!(lines.iter().all(|line| !line.contains("Secret plan")));
        assert!(lines.contains(&"map_id=<unsaved>".to_string()));
        assert!(lines.iter().any(|line| line.contains("levels=1:0,2:1")));
    }
}
