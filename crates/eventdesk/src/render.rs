//! Plain-text and JSON output for one-shot commands.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use eventdesk_core::dashboard::NO_EVENTS_MESSAGE;
use eventdesk_core::models::{Event, User};
use eventdesk_core::Session;

pub fn format_time(value: &DateTime<Utc>) -> String {
    value.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let cut: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn event_lines(events: &[Event]) -> Vec<String> {
    if events.is_empty() {
        return vec![NO_EVENTS_MESSAGE.to_string()];
    }
    let mut lines = vec![format!(
        "{:<5} {:<24} {:<16} {:<16} {:<16} {:<12} {:<6} {:<5}",
        "ID", "TITLE", "LOCATION", "START", "END", "CREATED BY", "PUBLIC", "RSVP"
    )];
    for e in events {
        lines.push(format!(
            "{:<5} {:<24} {:<16} {:<16} {:<16} {:<12} {:<6} {:<5}",
            e.id,
            truncate(&e.title, 24),
            truncate(&e.location, 16),
            format_time(&e.start_time),
            format_time(&e.end_time),
            truncate(e.owner_name(), 12),
            yes_no(e.is_public),
            yes_no(e.is_rsvped),
        ));
    }
    lines
}

pub fn user_lines(users: &[User]) -> Vec<String> {
    let mut lines = vec![format!("{:<5} {:<20} {:<30} {:<10}", "ID", "USERNAME", "EMAIL", "ROLE")];
    for u in users {
        lines.push(format!(
            "{:<5} {:<20} {:<30} {:<10}",
            u.id,
            truncate(&u.username, 20),
            truncate(&u.email, 30),
            u.role
        ));
    }
    lines
}

pub fn print_events(events: &[Event], json: bool) -> Result<()> {
    if json {
        return print_json(events);
    }
    for line in event_lines(events) {
        println!("{}", line);
    }
    Ok(())
}

pub fn print_users(users: &[User], json: bool) -> Result<()> {
    if json {
        return print_json(users);
    }
    for line in user_lines(users) {
        println!("{}", line);
    }
    Ok(())
}

pub fn print_session(session: &Session, json: bool) -> Result<()> {
    if json {
        return print_json(session);
    }
    println!("Username: {}", session.username);
    println!("User ID:  {}", session.user_id);
    println!("Role:     {}", session.role);
    if let Some(exp) = session.expires_at.and_then(|e| DateTime::<Utc>::from_timestamp(e, 0)) {
        println!("Expires:  {}", format_time(&exp));
    }
    Ok(())
}
