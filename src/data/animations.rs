//! Animation table and engine tuning, both RON.

use crate::npcs::behaviors::BehaviorCatalog;
use crate::shared::ScheduleConfig;

const ANIMATIONS_RON: &str = include_str!("../../assets/data/animations.ron");
const SCHEDULE_CONFIG_RON: &str = include_str!("../../assets/config/schedule.ron");

pub fn load_behavior_catalog() -> Result<BehaviorCatalog, String> {
    let catalog = BehaviorCatalog::from_ron_str(ANIMATIONS_RON)?;
    for (name, description) in &catalog.animations {
        if description.intro.is_empty() && description.looping.is_empty() {
            return Err(format!("animation '{}' has no frames to play", name));
        }
    }
    Ok(catalog)
}

pub fn load_schedule_config() -> Result<ScheduleConfig, String> {
    let config = ScheduleConfig::from_ron_str(SCHEDULE_CONFIG_RON)?;
    if config.walk_tiles_per_second <= 0.0 {
        return Err("walk_tiles_per_second must be positive".into());
    }
    if config.clock_step_minutes == 0 {
        return Err("clock_step_minutes must be at least 1".into());
    }
    Ok(config)
}
