//! command.rs — inbound text commands.
//!
//! The first whitespace token picks the command, case-insensitively.
//! Anything unrecognized falls back to the help text, so a stray message
//! never errors. Only `g` can fail to parse, and that failure is a
//! user-facing message, not a fault.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    /// Free-text place lookup, the remainder of the message verbatim.
    Find(String),
    /// Unit step of the viewport center, `d_lat`/`d_lon` in {-1, 0, 1}.
    Pan { d_lat: i32, d_lon: i32 },
    ZoomIn,
    ZoomOut,
    /// Absolute jump; `scale: None` keeps the user's current scale.
    GoTo { lat: f64, lon: f64, scale: Option<f64> },
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Specify at least two coordinates!")]
    TooFewCoordinates,
    #[error("Bad coordinates! {0}")]
    BadNumber(String),
}

pub const HELP: &str = "I can show you free wi-fi networks around some place!

Commands:

/help - show this help
f smth. - find a place by its name, e. g. f Prijepolje
w, a, s, d - move north/west/south/east
e, + - zoom
q, - - unzoom
g lat lon [scale] - go to some geographic coordinates, e. g. g 55.5153754 36.98217 0.009

Also you can send me your geoposition.

Map data (c) OpenStreetMap.org contributors
Wi-fi spot coordinates (c) wigle.net
";

pub fn parse(text: &str) -> Result<Command, ParseError> {
    let first = match text.split_whitespace().next() {
        Some(t) => t,
        None => return Ok(Command::Help),
    };
    let rest = text
        .splitn(2, char::is_whitespace)
        .nth(1)
        .unwrap_or_default();

    match first.to_lowercase().as_str() {
        "/start" | "/help" | "?" => Ok(Command::Help),
        "f" => Ok(Command::Find(rest.to_string())),
        "w" => Ok(Command::Pan { d_lat: 1, d_lon: 0 }),
        "a" => Ok(Command::Pan { d_lat: 0, d_lon: -1 }),
        "s" => Ok(Command::Pan { d_lat: -1, d_lon: 0 }),
        "d" => Ok(Command::Pan { d_lat: 0, d_lon: 1 }),
        "e" | "+" => Ok(Command::ZoomIn),
        "q" | "-" => Ok(Command::ZoomOut),
        "g" => parse_go_to(rest),
        _ => Ok(Command::Help),
    }
}

/// Split on commas and whitespace, parse at most the first three tokens as
/// floats. Two numbers reuse the current scale, three set all fields.
fn parse_go_to(rest: &str) -> Result<Command, ParseError> {
    let mut nums = Vec::with_capacity(3);
    for token in rest.replace(',', " ").split_whitespace().take(3) {
        let value: f64 = token
            .parse()
            .map_err(|_| ParseError::BadNumber(format!("`{token}` is not a number")))?;
        if !value.is_finite() {
            return Err(ParseError::BadNumber(format!("`{token}` is not finite")));
        }
        nums.push(value);
    }
    if nums.len() < 2 {
        return Err(ParseError::TooFewCoordinates);
    }
    Ok(Command::GoTo {
        lat: nums[0],
        lon: nums[1],
        scale: nums.get(2).copied(),
    })
}
