use anyhow::Result;

use matchday::db::progress_repo;

use super::Workspace;

pub fn run_progress(workspace: &Workspace) -> Result<i32> {
    let db = workspace.open_database()?;
    let rows = progress_repo::list_all(&db)?;
    if rows.is_empty() {
        println!("no extraction runs recorded");
        return Ok(0);
    }

    println!(
        "{:<24} {:<9} {:>6} {:>9} {:>9} {:>6} {:>7}  {:<8}  updated",
        "competition", "season", "total", "attempted", "succeeded", "failed", "skipped", "status"
    );
    for row in rows {
        println!(
            "{:<24} {:<9} {:>6} {:>9} {:>9} {:>6} {:>7}  {:<8}  {}",
            row.competition_slug,
            row.season,
            row.total,
            row.attempted,
            row.succeeded,
            row.failed,
            row.skipped,
            row.run_status,
            row.updated_at
        );
    }
    Ok(0)
}
