use std::{
    env,
    io::{self, Write},
    process::{Command, Stdio},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, Weekday};
use tokio::sync::mpsc::UnboundedReceiver;

use academy_calendar::{
    input::{DragDropController, DragError, DropOutcome, DropTarget, Notice, Resolution},
    schedule::{ClockTime, EventId, EventKind, weekday::weekday_from_code},
    storage::{
        config::Config,
        event_store::{ScheduleEventStore, SharedStore, lock_store, shared},
    },
    sync::{BackendGateway, DateRange, HttpGateway, PeriodLoader},
    ui::{WeekLayout, calculate_layout},
};

pub const USAGE: &str = "Usage: academy-calendar [--week [YYYY/MM/DD]] \
[--move <class_id> <weekday_code> <HH:MM>] \
[--transfer <student_id> <from_class> <to_class>]";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CliMode {
    Week(NaiveDate),
    Move {
        date: NaiveDate,
        class_id: u64,
        day: Weekday,
        start: ClockTime,
    },
    Transfer {
        date: NaiveDate,
        student_id: u64,
        from_class: u64,
        to_class: u64,
    },
}

pub fn parse_cli_mode() -> Result<CliMode, String> {
    if env::args().any(|arg| arg == "--help") {
        println!("{}", USAGE);
        std::process::exit(0);
    }
    parse_args(env::args().skip(1), Local::now().date_naive())
}

fn parse_args<I>(args: I, today: NaiveDate) -> Result<CliMode, String>
where
    I: Iterator<Item = String>,
{
    let mut date = today;
    let mut action: Option<CliMode> = None;
    let mut args = args.peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--week" => {
                if let Some(next) = args.next_if(|next| !next.starts_with("--")) {
                    date = NaiveDate::parse_from_str(&next, "%Y/%m/%d")
                        .map_err(|_| format!("Invalid date '{}'. Use YYYY/MM/DD.", next))?;
                }
            }
            "--move" => {
                let class_id = parse_id(args.next(), "class id")?;
                let code = args.next().ok_or("Missing weekday code")?;
                let day = weekday_from_code(&code)
                    .ok_or_else(|| format!("Unknown weekday code '{}'", code))?;
                let time = args.next().ok_or("Missing start time")?;
                let start = ClockTime::parse(&time).map_err(|e| e.to_string())?;
                action = Some(CliMode::Move {
                    date,
                    class_id,
                    day,
                    start,
                });
            }
            "--transfer" => {
                let student_id = parse_id(args.next(), "student id")?;
                let from_class = parse_id(args.next(), "source class id")?;
                let to_class = parse_id(args.next(), "target class id")?;
                action = Some(CliMode::Transfer {
                    date,
                    student_id,
                    from_class,
                    to_class,
                });
            }
            _ => return Err(format!("Unknown argument: {}", arg)),
        }
    }

    // --week may come after the action
    Ok(match action {
        Some(CliMode::Move {
            class_id,
            day,
            start,
            ..
        }) => CliMode::Move {
            date,
            class_id,
            day,
            start,
        },
        Some(CliMode::Transfer {
            student_id,
            from_class,
            to_class,
            ..
        }) => CliMode::Transfer {
            date,
            student_id,
            from_class,
            to_class,
        },
        _ => CliMode::Week(date),
    })
}

fn parse_id(value: Option<String>, what: &str) -> Result<u64, String> {
    let value = value.ok_or_else(|| format!("Missing {}", what))?;
    value
        .parse()
        .map_err(|_| format!("Invalid {} '{}'", what, value))
}

async fn load_week(
    config: &Config,
    date: NaiveDate,
) -> Result<(SharedStore, Arc<dyn BackendGateway>, DateRange)> {
    let gateway: Arc<dyn BackendGateway> = Arc::new(
        HttpGateway::from_config(&config.backend).context("Failed to build HTTP client")?,
    );
    let loader = PeriodLoader::new(Arc::clone(&gateway), config.grid.first_weekday());
    let store = shared(ScheduleEventStore::new());
    let range = loader
        .refresh_week(&store, date)
        .await
        .context("Failed to load the week")?;
    Ok((store, gateway, range))
}

pub async fn run_week(config: &Config, date: NaiveDate) -> Result<()> {
    let (store, _gateway, range) = load_week(config, date).await?;
    let layout = calculate_layout(&lock_store(&store), &config.grid);
    let text = format_week_text(&range, &layout);
    display_with_pager(&text)?;
    Ok(())
}

pub async fn run_move(
    config: &Config,
    date: NaiveDate,
    class_id: u64,
    day: Weekday,
    start: ClockTime,
) -> Result<()> {
    let (store, gateway, _range) = load_week(config, date).await?;
    let (mut controller, mut notices) = DragDropController::new(store, gateway);

    let outcome = controller
        .begin_event_drag(EventId::Class(class_id))
        .and_then(|()| controller.drop_on(DropTarget::Slot { day, start }));
    report(outcome, &mut notices).await
}

pub async fn run_transfer(
    config: &Config,
    date: NaiveDate,
    student_id: u64,
    from_class: u64,
    to_class: u64,
) -> Result<()> {
    let (store, gateway, _range) = load_week(config, date).await?;
    let (mut controller, mut notices) = DragDropController::new(store, gateway);

    let outcome = controller
        .begin_occupant_drag(EventId::Class(from_class), student_id)
        .and_then(|()| controller.drop_on(DropTarget::Event(EventId::Class(to_class))));
    report(outcome, &mut notices).await
}

async fn report(
    outcome: Result<DropOutcome, DragError>,
    notices: &mut UnboundedReceiver<Notice>,
) -> Result<()> {
    let resolution = match outcome {
        Ok(DropOutcome::Applied(ticket)) => ticket
            .resolution()
            .await
            .context("Persistence task failed")?,
        Ok(DropOutcome::Cancelled) => {
            println!("Nothing to change.");
            return Ok(());
        }
        Err(err) => return Err(err).context("Change rejected"),
    };

    while let Ok(notice) = notices.try_recv() {
        eprintln!("{:?}: {}", notice.level, notice.message);
    }

    match resolution {
        Resolution::Committed => {
            println!("Saved.");
            Ok(())
        }
        Resolution::RolledBack => bail!("The backend refused the change; nothing was saved"),
        Resolution::Diverged => bail!("The change failed; reload the week"),
    }
}

fn format_week_text(range: &DateRange, layout: &WeekLayout) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Week of {} to {}",
        range.start.format("%A, %B %d, %Y"),
        range.end.format("%A, %B %d, %Y")
    ));

    let mut any = false;
    for column in &layout.days {
        let cards: Vec<_> = column.hours.iter().flat_map(|row| row.cards.iter()).collect();
        if cards.is_empty() {
            continue;
        }
        any = true;
        lines.push(String::new());
        lines.push(format!("{} ({})", column.day, column.code));
        for card in cards {
            let mut line = format!("- {}-{} {}", card.start, card.end, card.title);
            match card.kind {
                EventKind::Class => line.push_str(&format!(" ({}/{})", card.occupied, card.capacity)),
                EventKind::Rental => line.push_str(" (rental)"),
            }
            if card.lane_count > 1 {
                line.push_str(&format!(" [lane {}/{}]", card.lane + 1, card.lane_count));
            }
            lines.push(line);
        }
    }

    if !any {
        lines.push(String::new());
        lines.push("No events scheduled.".to_string());
    }

    lines.join("\n")
}

fn display_with_pager(text: &str) -> Result<(), io::Error> {
    let pager_value = env::var("PAGER").unwrap_or_else(|_| "less".to_string());
    let mut parts = pager_value.split_whitespace();
    let cmd = match parts.next() {
        Some(c) => c,
        None => {
            print!("{text}");
            return Ok(());
        }
    };
    let args: Vec<&str> = parts.collect();

    match Command::new(cmd).args(&args).stdin(Stdio::piped()).spawn() {
        Ok(mut child) => {
            if let Some(stdin) = child.stdin.as_mut() {
                stdin.write_all(text.as_bytes())?;
            }
            let _ = child.wait();
        }
        Err(_) => {
            print!("{text}");
        }
    }

    Ok(())
}
