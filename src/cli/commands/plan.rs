//! cli::commands::plan
//!
//! `gitrun plan`: resolve a manifest and print what a `run` would do,
//! without touching any working tree.

use std::path::PathBuf;

use anyhow::Result;

use super::common::{build_plan_for, locate_manifest, resolve_manifest};
use crate::plan::planner::Plan;

pub async fn run(config: Option<PathBuf>, base_dir: Option<PathBuf>, json: bool) -> Result<i32> {
    let manifest_path = locate_manifest(config.as_deref())?;
    let resolved = resolve_manifest(&manifest_path, base_dir.as_deref()).await?;
    let plan = build_plan_for(&resolved)?;

    if json {
        print_json(&plan);
    } else {
        print_table(&plan);
    }

    Ok(0)
}

fn print_table(plan: &Plan) {
    if plan.is_empty() {
        println!("no actions planned");
        return;
    }
    for action in &plan.actions {
        println!(
            "{:<14} {:<12} {}",
            format!("{:?}", action.action_type),
            format!("{:?}", action.strategy),
            action.spec.target_path.as_path().display(),
        );
    }
    println!("\n{} action(s) planned", plan.len());
}

fn print_json(plan: &Plan) {
    let actions: Vec<_> = plan
        .actions
        .iter()
        .map(|a| {
            serde_json::json!({
                "action_id": a.id.to_hex(),
                "action_type": format!("{:?}", a.action_type),
                "strategy": format!("{:?}", a.strategy),
                "target_path": a.spec.target_path.as_path().display().to_string(),
                "name": a.spec.name.as_str(),
            })
        })
        .collect();
    println!("{}", serde_json::json!({ "actions": actions }));
}
