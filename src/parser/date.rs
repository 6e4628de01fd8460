//! Eudora envelope timestamp handling.
//!
//! Eudora separator lines end in a ctime-style timestamp whose fields are in
//! the order `dayname monthname day time year`. RFC-style `Date:` headers
//! want `dayname day monthname year time` (e.g. `Thu 03 Jan 2002 11:42:42`),
//! so messages without an explicit `Date:` get one synthesized here.

use chrono::NaiveDateTime;

/// Field order Eudora writes into the separator line.
const LEGACY_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Canonical field order for the synthesized `Date:` value.
const CANONICAL_FORMAT: &str = "%a %d %b %Y %H:%M:%S";

/// Synthesize a `Date:` header value from an envelope value
/// (`???@??? Thu Jan 03 11:42:42 2002` → `Thu 03 Jan 2002 11:42:42`).
///
/// chrono validates and normalizes when the legacy field order parses; for
/// timestamps chrono rejects (odd weekday spellings, weekday/date
/// mismatches in damaged archives) the fields are reordered textually
/// instead. Returns `None` when the envelope carries no recognizable
/// timestamp at all.
pub fn envelope_date(envelope: &str) -> Option<String> {
    let tokens: Vec<&str> = envelope.split_whitespace().collect();
    // Address token plus the five timestamp fields.
    if tokens.len() < 6 {
        return None;
    }
    let [dayname, monthname, day, time, year] = tokens[tokens.len() - 5..] else {
        return None;
    };

    if !looks_like_word(dayname)
        || !looks_like_word(monthname)
        || !looks_like_day(day)
        || !looks_like_time(time)
        || !looks_like_year(year)
    {
        return None;
    }

    let legacy = format!("{dayname} {monthname} {day} {time} {year}");
    if let Ok(stamp) = NaiveDateTime::parse_from_str(&legacy, LEGACY_FORMAT) {
        return Some(stamp.format(CANONICAL_FORMAT).to_string());
    }

    // Best effort: pure token reorder, day zero-padded to two digits.
    Some(format!("{dayname} {day:0>2} {monthname} {year} {time}"))
}

fn looks_like_word(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic())
}

fn looks_like_day(token: &str) -> bool {
    (1..=2).contains(&token.len()) && token.chars().all(|c| c.is_ascii_digit())
}

fn looks_like_time(token: &str) -> bool {
    token.contains(':') && token.chars().all(|c| c.is_ascii_digit() || c == ':')
}

fn looks_like_year(token: &str) -> bool {
    token.len() == 4 && token.chars().all(|c| c.is_ascii_digit())
}
