use archivist::Snowflake;
use archivist::db;
use archivist::repository::{channel_names, count_messages, list_checkpoints};
use archivist::sync::{BackfillState, Checkpoint};
use console::{Term, style};

/// One row of the status listing.
struct StatusRow {
    guild_id: Snowflake,
    channel_id: Snowflake,
    name: String,
    state: &'static str,
    oldest: String,
    newest: String,
    messages: u64,
    last_synced: String,
}

impl StatusRow {
    fn new(checkpoint: &Checkpoint, name: Option<&String>, messages: u64) -> Self {
        let watermark = |id: Option<Snowflake>| id.map_or_else(|| "-".to_string(), |id| id.to_string());
        Self {
            guild_id: checkpoint.guild_id(),
            channel_id: checkpoint.channel_id(),
            name: name.cloned().unwrap_or_else(|| "?".to_string()),
            state: state_label(checkpoint.backfill_state()),
            oldest: watermark(checkpoint.oldest()),
            newest: watermark(checkpoint.newest()),
            messages,
            last_synced: checkpoint
                .last_synced_at()
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        }
    }
}

fn state_label(state: BackfillState) -> &'static str {
    match state {
        BackfillState::NotStarted => "not started",
        BackfillState::InProgress { .. } => "backfilling",
        BackfillState::Complete => "complete",
    }
}

pub(crate) async fn handle_status(
    guild_id: Option<Snowflake>,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;

    let checkpoints = list_checkpoints(&db, guild_id).await?;
    let ids: Vec<Snowflake> = checkpoints.iter().map(Checkpoint::channel_id).collect();
    let names = channel_names(&db, &ids).await?;

    let mut rows = Vec::with_capacity(checkpoints.len());
    for checkpoint in &checkpoints {
        let messages = count_messages(&db, checkpoint.channel_id()).await?;
        rows.push(StatusRow::new(
            checkpoint,
            names.get(&checkpoint.channel_id()),
            messages,
        ));
    }

    if Term::stdout().is_term() {
        print_table(&rows);
    } else {
        for row in &rows {
            tracing::info!(
                guild_id = %row.guild_id,
                channel_id = %row.channel_id,
                name = %row.name,
                state = row.state,
                oldest = %row.oldest,
                newest = %row.newest,
                messages = row.messages,
                last_synced = %row.last_synced,
                "Checkpoint"
            );
        }
    }

    Ok(())
}

fn print_table(rows: &[StatusRow]) {
    if rows.is_empty() {
        println!("No channels archived yet. Run `archivist sync` first.");
        return;
    }

    let name_width = rows.iter().map(|r| r.name.chars().count()).max().unwrap_or(4).max(4);
    println!(
        "{:<20} {:<20} {:<name_width$} {:<12} {:>9} {:<20} {:<20} {}",
        style("GUILD").bold(),
        style("CHANNEL").bold(),
        style("NAME").bold(),
        style("BACKFILL").bold(),
        style("MESSAGES").bold(),
        style("OLDEST").bold(),
        style("NEWEST").bold(),
        style("LAST SYNCED").bold(),
    );

    for row in rows {
        let state = match row.state {
            "complete" => style(row.state).green(),
            "backfilling" => style(row.state).yellow(),
            _ => style(row.state).dim(),
        };
        println!(
            "{:<20} {:<20} {:<name_width$} {:<12} {:>9} {:<20} {:<20} {}",
            row.guild_id.to_string(),
            row.channel_id.to_string(),
            row.name,
            state,
            row.messages,
            row.oldest,
            row.newest,
            row.last_synced,
        );
    }

    let complete = rows.iter().filter(|r| r.state == "complete").count();
    let total: u64 = rows.iter().map(|r| r.messages).sum();
    println!(
        "\n{} channels ({} fully backfilled), {} messages",
        rows.len(),
        complete,
        total
    );
}
