//! Per-student profile derivation. Pure reducers over data already
//! fetched: nothing here touches the network or the store.

use chrono::{Datelike, NaiveDate, Utc};

use crate::models::Item;

pub const POINTS_PER_ITEM: u32 = 10;

/// The academic year rolls over in June.
const ACADEMIC_YEAR_CUTOFF_MONTH: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentDetails {
    pub year_joined: String,
    pub branch: String,
    pub year_of_study: String,
}

#[derive(Debug, Clone)]
pub struct StudentProfile {
    pub roll_no: String,
    pub details: Option<StudentDetails>,
    pub reported_items: Vec<Item>,
    pub points: u32,
}

fn branch_name(code: &str) -> &'static str {
    match code {
        "05" | "CS" => "Computer Science & Engineering",
        "12" | "IT" => "Information Technology",
        "04" | "EC" => "Electronics & Communication Engineering",
        "03" | "EE" => "Electrical & Electronics Engineering",
        "02" | "ME" => "Mechanical Engineering",
        "01" | "CE" => "Civil Engineering",
        _ => "Unknown Branch",
    }
}

fn ordinal_suffix(n: i32) -> &'static str {
    match n.rem_euclid(100) {
        11..=13 => "th",
        v => match v % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    }
}

/// Decodes enrollment year and branch from a roll number by fixed offsets:
/// characters 0-1 carry the year (20xx), characters 6-7 the branch code.
/// Returns `None` for roll numbers too short or with a non-numeric year.
pub fn decode_roll_no(roll_no: &str, today: NaiveDate) -> Option<StudentDetails> {
    if roll_no.len() < 8 || !roll_no.is_ascii() {
        return None;
    }

    let year_joined: i32 = format!("20{}", &roll_no[0..2]).parse().ok()?;
    let branch_code = roll_no[6..8].to_uppercase();

    let academic_year = if today.month() < ACADEMIC_YEAR_CUTOFF_MONTH {
        today.year() - 1
    } else {
        today.year()
    };
    let year_of_study = academic_year - year_joined + 1;

    Some(StudentDetails {
        year_joined: year_joined.to_string(),
        branch: branch_name(&branch_code).to_string(),
        year_of_study: format!("{}{} Year", year_of_study, ordinal_suffix(year_of_study)),
    })
}

/// Summarizes a student's activity from the full item set: their reported
/// items, reward points (10 per report) and decoded roll-number details.
pub fn build_profile_at(roll_no: &str, all_items: &[Item], today: NaiveDate) -> StudentProfile {
    let reported_items: Vec<Item> = all_items
        .iter()
        .filter(|item| item.reporter_roll_no == roll_no)
        .cloned()
        .collect();

    StudentProfile {
        roll_no: roll_no.to_string(),
        details: decode_roll_no(roll_no, today),
        points: reported_items.len() as u32 * POINTS_PER_ITEM,
        reported_items,
    }
}

pub fn build_profile(roll_no: &str, all_items: &[Item]) -> StudentProfile {
    build_profile_at(roll_no, all_items, Utc::now().date_naive())
}
