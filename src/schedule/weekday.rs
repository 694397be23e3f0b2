use chrono::Weekday;

/// Backend weekday codes, indexed from Sunday.
const WEEKDAY_CODES: [&str; 7] = ["dom", "seg", "ter", "qua", "qui", "sex", "sab"];

/// Grid index of a weekday, Sunday = 0 through Saturday = 6.
pub fn day_index(day: Weekday) -> usize {
    day.num_days_from_sunday() as usize
}

pub fn weekday_from_index(index: usize) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

pub fn weekday_code(day: Weekday) -> &'static str {
    WEEKDAY_CODES[day_index(day)]
}

pub fn weekday_from_code(code: &str) -> Option<Weekday> {
    let code = code.trim().to_ascii_lowercase();
    WEEKDAY_CODES
        .iter()
        .position(|candidate| *candidate == code)
        .and_then(weekday_from_index)
}

/// The seven days of a week column order, starting at `first_day`.
pub fn week_days(first_day: Weekday) -> Vec<Weekday> {
    std::iter::successors(Some(first_day), |day| Some(day.succ()))
        .take(7)
        .collect()
}
