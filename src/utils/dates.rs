use chrono::{Datelike, NaiveDate};

/// Accepts `YYYY-MM-DD`, optionally followed by a time part (`T...` or ` ...`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = match raw.char_indices().nth(10) {
        Some((idx, 'T')) | Some((idx, ' ')) => &raw[..idx],
        Some(_) => return None,
        None => raw,
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Number of calendar days from `start` to `end`, both included.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> Option<i32> {
    if end < start {
        return None;
    }
    i32::try_from((end - start).num_days() + 1).ok()
}

/// Completed years between `birthday` and `today`.
pub fn age_on(birthday: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birthday > today {
        return None;
    }
    let mut age = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

/// The recurrence of `date` in `year`; Feb 29 falls back to Feb 28.
pub fn anniversary_in(date: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
}
