//! PGN rendering for in-memory game records.

use crate::game_data::GameData;

/// Render a game as PGN: seven-tag-style header block plus numbered movetext.
pub fn render_pgn(game: &GameData) -> String {
    let meta = &game.metadata;
    let mut pgn = String::new();

    push_header(&mut pgn, "Event", "Casual game");
    push_header(&mut pgn, "Date", meta.date.as_deref().unwrap_or("????.??.??"));
    push_header(&mut pgn, "White", &meta.white);
    push_header(&mut pgn, "Black", &meta.black);
    push_header(&mut pgn, "Result", &meta.result);
    if meta.time_control > 0 {
        push_header(&mut pgn, "TimeControl", &meta.time_control.to_string());
    } else {
        push_header(&mut pgn, "TimeControl", "-");
    }
    pgn.push('\n');

    let san: Vec<&str> = game.moves.iter().map(|m| m.san.as_str()).collect();
    let movetext = format_movetext(&san);
    if movetext.is_empty() {
        pgn.push_str(&meta.result);
    } else {
        pgn.push_str(&movetext);
        pgn.push(' ');
        pgn.push_str(&meta.result);
    }
    pgn
}

/// "e4 e5 Nf3" → "1. e4 e5 2. Nf3"
pub fn format_movetext(san_moves: &[&str]) -> String {
    let mut formatted = String::new();
    for (i, san) in san_moves.iter().enumerate() {
        if i % 2 == 0 {
            if !formatted.is_empty() {
                formatted.push(' ');
            }
            formatted.push_str(&format!("{}. {}", i / 2 + 1, san));
        } else {
            formatted.push_str(&format!(" {}", san));
        }
    }
    formatted
}

fn push_header(pgn: &mut String, key: &str, value: &str) {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    pgn.push_str(&format!("[{} \"{}\"]\n", key, escaped));
}
