use clap::Args;
use momentum_core::timer::format_clock;
use momentum_core::{Database, SessionLog, SessionRecord};

#[derive(Args)]
pub struct HistoryArgs {
    /// Print the raw session log as JSON
    #[arg(long)]
    json: bool,
    /// Only show the most recent N sessions
    #[arg(long)]
    limit: Option<usize>,
}

fn format_record(record: &SessionRecord) -> String {
    let r = &record.reflection;
    let mut line = format!(
        "{}  activation {}  focus {}  meaningful {}  perfectionism {}",
        record.completed_at.format("%Y-%m-%d %H:%M"),
        format_clock(record.activation_used_secs),
        format_clock(record.focus_secs),
        r.meaningful.map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
        r.perfectionism.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
    );
    if !r.next_task.is_empty() {
        line.push_str(&format!("  next: {}", r.next_task));
    }
    line
}

pub fn run(args: HistoryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let log = SessionLog::new(Database::open()?);
    let records = log.read();
    let skip = args
        .limit
        .map(|n| records.len().saturating_sub(n))
        .unwrap_or(0);
    let shown = &records[skip..];

    if args.json {
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("no sessions yet");
        return Ok(());
    }
    for record in shown {
        println!("{}", format_record(record));
    }
    Ok(())
}
