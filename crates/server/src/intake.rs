//! Handshake parsing and nickname policy.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::IntakeError;
use crate::protocol::is_allowed_time_control;

pub const MAX_NICKNAME_LEN: usize = 16;

static NICKNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

/// A validated `<nickname>|<timecontrol>` handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub nickname: String,
    pub time_control: u32,
}

/// Nickname rules: length, charset and a case-insensitive substring blocklist.
#[derive(Debug, Clone, Default)]
pub struct NicknamePolicy {
    blocklist: Vec<String>,
}

impl NicknamePolicy {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let blocklist = entries
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty() && !e.starts_with('#'))
            .collect();
        Self { blocklist }
    }

    /// Load the blocklist file, one entry per line. A missing or unreadable
    /// file leaves the blocklist empty.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => {
                let policy = Self::new(contents.lines());
                tracing::info!(
                    "Loaded nickname blocklist: {} entries from {}",
                    policy.blocklist.len(),
                    path.display()
                );
                policy
            }
            Err(e) => {
                tracing::warn!("Failed to load nickname blocklist from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn check(&self, nickname: &str) -> Result<(), IntakeError> {
        if nickname.is_empty() {
            return Err(IntakeError::EmptyNickname);
        }
        if nickname.chars().count() > MAX_NICKNAME_LEN {
            return Err(IntakeError::NicknameTooLong(MAX_NICKNAME_LEN));
        }
        if !NICKNAME_RE.is_match(nickname) {
            return Err(IntakeError::NicknameCharset);
        }
        let lowered = nickname.to_lowercase();
        if self.blocklist.iter().any(|blocked| lowered.contains(blocked.as_str())) {
            return Err(IntakeError::NicknameBlocked);
        }
        Ok(())
    }
}

/// Parse and validate a handshake line. An absent or empty time control
/// falls back to `default_time_control`; an explicit invalid one is an error.
pub fn parse_handshake(
    line: &str,
    policy: &NicknamePolicy,
    default_time_control: u32,
) -> Result<Handshake, IntakeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(IntakeError::EmptyHandshake);
    }

    let (nickname, time_control) = match line.split_once('|') {
        Some((nick, tc)) => (nick.trim(), Some(tc.trim())),
        None => (line, None),
    };

    policy.check(nickname)?;

    let time_control = match time_control {
        None | Some("") => default_time_control,
        Some(raw) => match raw.parse::<u32>() {
            Ok(secs) if is_allowed_time_control(secs) => secs,
            _ => return Err(IntakeError::InvalidTimeControl(raw.to_string())),
        },
    };

    Ok(Handshake {
        nickname: nickname.to_string(),
        time_control,
    })
}
