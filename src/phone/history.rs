//! Recently called numbers, offered as quick redials.

use std::collections::HashSet;

use crate::models::{CallHistoryEntry, RecentNumber};
use crate::phone::normalize::comparable_digits;

/// How many call records are scanned for recent numbers.
pub const RECENT_CALL_WINDOW: usize = 20;

/// How many recent numbers are offered.
pub const MAX_RECENT_NUMBERS: usize = 10;

/// Distinct counterparts of `history` (newest first), skipping the user's
/// own numbers. Numbers match on their digits, so `+16045551234` and
/// `604-555-1234` count as one.
pub fn recent_numbers(
    history: &[CallHistoryEntry],
    own_numbers: &[String],
    max: usize,
) -> Vec<RecentNumber> {
    let own: HashSet<String> = own_numbers.iter().map(|n| comparable_digits(n)).collect();
    let mut seen = HashSet::new();

    history
        .iter()
        .filter_map(|entry| {
            let phone_number = entry.counterpart()?;
            let digits = comparable_digits(phone_number);
            if digits.is_empty() || own.contains(&digits) || !seen.insert(digits) {
                return None;
            }
            Some(RecentNumber {
                phone_number: phone_number.to_string(),
                direction: entry.direction(),
                last_call_at: entry.started_at,
            })
        })
        .take(max)
        .collect()
}
