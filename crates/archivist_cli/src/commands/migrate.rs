use archivist::db;
use archivist::migration::{Migrator, MigratorTrait};
use console::style;

use crate::MigrateAction;

pub(crate) async fn handle_migrate(
    action: MigrateAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;

    match action {
        MigrateAction::Up => {
            let pending = Migrator::get_pending_migrations(&db).await?.len();
            if pending == 0 {
                println!("Archive schema is up to date.");
                return Ok(());
            }
            println!("Applying {pending} migration(s)...");
            Migrator::up(&db, None).await?;
            println!("{} Migrations applied.", style("✓").green().bold());
        }
        MigrateAction::Down => {
            println!("Rolling back last migration...");
            Migrator::down(&db, Some(1)).await?;
            println!("{} Rollback complete.", style("✓").green().bold());
        }
        MigrateAction::Status => {
            let applied = Migrator::get_applied_migrations(&db).await?;
            let pending = Migrator::get_pending_migrations(&db).await?;
            for migration in &applied {
                println!("  {} {}", style("applied").green(), migration.name());
            }
            for migration in &pending {
                println!("  {} {}", style("pending").yellow(), migration.name());
            }
            println!("{} applied, {} pending", applied.len(), pending.len());
        }
        MigrateAction::Fresh => {
            println!(
                "{} Dropping every archive table and reapplying migrations...",
                style("⚠").yellow()
            );
            Migrator::fresh(&db).await?;
            println!("{} Fresh migration complete.", style("✓").green().bold());
        }
    }

    Ok(())
}
