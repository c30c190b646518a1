//! Plain-text rendering of directory data for the terminal.

use std::fmt::Write;

use teamdir_core::{TeamMember, User};

const NAME_WIDTH: usize = 24;
const EMAIL_WIDTH: usize = 28;

/// Format a phone number for display
/// Handles various input formats and normalizes to (XXX) XXX-XXXX
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10]),
        11 if digits.starts_with('1') => {
            format!("({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..11])
        }
        _ => phone.to_string(), // Return original if can't format
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

pub fn member_table(members: &[TeamMember]) -> String {
    if members.is_empty() {
        return "No team members yet\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:<name$}  {:<email$}  {:<14}  ROLE",
        "ID",
        "NAME",
        "EMAIL",
        "PHONE",
        name = NAME_WIDTH,
        email = EMAIL_WIDTH
    );
    for m in members {
        let _ = writeln!(
            out,
            "{:>5}  {:<name$}  {:<email$}  {:<14}  {}",
            m.id,
            truncate(&m.full_name(), NAME_WIDTH),
            truncate(&m.email, EMAIL_WIDTH),
            format_phone(&m.phone_number),
            m.role,
            name = NAME_WIDTH,
            email = EMAIL_WIDTH
        );
    }
    out
}

pub fn member_detail(member: &TeamMember) -> String {
    format!(
        "{} (#{})\n  Email: {}\n  Phone: {}\n  Role:  {} - {}",
        member.full_name(),
        member.id,
        member.email,
        format_phone(&member.phone_number),
        member.role,
        member.role.description()
    )
}

pub fn user_summary(user: &User) -> String {
    let mut out = format!("{} ({})", user.display_name(), user.username);
    let _ = write!(out, "\n  Role: {}", user.effective_role().display_name());
    if let Some(ref email) = user.email {
        let _ = write!(out, "\n  Email: {}", email);
    }
    out
}
