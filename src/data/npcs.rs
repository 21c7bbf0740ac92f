//! NPC schedule definitions, one JSON file per townsperson.
//!
//! Files are embedded at compile time so the headless build needs no asset server.

use crate::npcs::definitions::{NpcScheduleDef, NpcScheduleRegistry};

const SCHEDULE_FILES: &[(&str, &str)] = &[
    ("lily.json", include_str!("../../assets/data/schedules/lily.json")),
    ("margaret.json", include_str!("../../assets/data/schedules/margaret.json")),
    ("mayor_rex.json", include_str!("../../assets/data/schedules/mayor_rex.json")),
    ("old_tom.json", include_str!("../../assets/data/schedules/old_tom.json")),
];

/// Parse and sanity-check one schedule file.
pub fn parse_schedule_def(file: &str, source: &str) -> Result<NpcScheduleDef, String> {
    let def: NpcScheduleDef =
        serde_json::from_str(source).map_err(|e| format!("{}: invalid schedule file: {}", file, e))?;
    if def.id.trim().is_empty() {
        return Err(format!("{}: NPC id is empty", file));
    }
    if def.homes.is_empty() {
        return Err(format!("{}: '{}' has no home", file, def.id));
    }
    if def.scripts.is_empty() {
        return Err(format!("{}: '{}' has no schedule scripts", file, def.id));
    }
    Ok(def)
}

/// Load every embedded schedule file. A bad file is reported and skipped.
pub fn populate_schedules(registry: &mut NpcScheduleRegistry) -> Vec<String> {
    let mut problems = Vec::new();
    for (file, source) in SCHEDULE_FILES {
        match parse_schedule_def(file, source) {
            Ok(def) => registry.insert(def),
            Err(e) => problems.push(e),
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_embedded_schedule_parses() {
        let mut registry = NpcScheduleRegistry::default();
        let problems = populate_schedules(&mut registry);
        assert!(problems.is_empty(), "{:?}", problems);
        assert_eq!(registry.sorted_ids(), vec!["lily", "margaret", "mayor_rex", "old_tom"]);
        assert!(registry.get("lily").unwrap().has_script("marriage_Mon"));
    }

    #[test]
    fn test_rejects_file_without_home() {
        let err = parse_schedule_def(
            "ghost.json",
            r#"{ "id": "ghost", "name": "Ghost", "homes": [], "scripts": { "spring": "900 Town 1 1" } }"#,
        )
        .unwrap_err();
        assert!(err.contains("no home"));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(parse_schedule_def("broken.json", "{ not json").is_err());
    }
}
