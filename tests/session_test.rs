//! Integration tests for the game protocol.
//!
//! Each test starts its own in-process server on ephemeral ports.

mod common;

use std::time::Duration;

use common::TestClient;
use server::framing::MAX_FRAME_LEN;

// ---------------------------------------------------------------------------
// Pairing
// ---------------------------------------------------------------------------

/// First connection plays White, second plays Black, at the default 600s.
#[tokio::test]
async fn pairs_first_seat_as_white() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, None).await;

    assert_eq!(white.recv().await.as_deref(), Some("TIME|600|600"));
    assert_eq!(black.recv().await.as_deref(), Some("TIME|600|600"));
    assert_eq!(server.registry.active_count().await, 1);
    assert_eq!(server.registry.waiting_count().await, 0);
}

/// Players with different time controls are never paired together.
#[tokio::test]
async fn different_time_controls_wait_separately() {
    let server = common::spawn_server().await;
    let mut blitz = TestClient::join(server.game_addr, "alice|180").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut rapid = TestClient::join(server.game_addr, "bob|600").await;

    blitz.assert_silent(Duration::from_millis(200)).await;
    rapid.assert_silent(Duration::from_millis(200)).await;
    assert_eq!(server.registry.waiting_count().await, 2);
    assert_eq!(server.registry.active_count().await, 0);
}

/// A waiting player who disconnects leaves the pool and nobody is paired
/// into the dead session.
#[tokio::test]
async fn waiting_player_disconnect_leaves_pool() {
    let server = common::spawn_server().await;
    let ghost = TestClient::join(server.game_addr, "ghost|0").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(ghost);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.registry.waiting_count().await, 0);

    let (mut white, _black) = common::paired(server.game_addr, Some(0)).await;
    white.assert_silent(Duration::from_millis(100)).await;
}

// ---------------------------------------------------------------------------
// Handshake rejection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejects_invalid_nickname() {
    let server = common::spawn_server().await;
    let mut client = TestClient::join(server.game_addr, "bad nick!|0").await;

    assert_eq!(
        client.recv().await.as_deref(),
        Some("ERROR|Nickname can only contain letters, numbers, and underscores")
    );
    client.expect_closed().await;
    assert_eq!(server.registry.waiting_count().await, 0);
}

#[tokio::test]
async fn rejects_blocked_nickname() {
    let server = common::spawn_server().await;
    let mut client = TestClient::join(server.game_addr, "TheAdmin|0").await;

    assert_eq!(client.recv().await.as_deref(), Some("ERROR|Nickname not allowed"));
    client.expect_closed().await;
}

#[tokio::test]
async fn rejects_unknown_time_control() {
    let server = common::spawn_server().await;
    let mut client = TestClient::join(server.game_addr, "carol|45").await;

    assert_eq!(
        client.recv().await.as_deref(),
        Some("ERROR|Invalid time control: 45")
    );
    client.expect_closed().await;
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// `e2e4` is relayed verbatim and Black can then query its pawn.
#[tokio::test]
async fn relays_move_and_answers_query() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, Some(0)).await;

    white.send("e2e4").await;
    assert_eq!(black.recv().await.as_deref(), Some("e2e4"));

    black.send("MOVES|e7").await;
    assert_eq!(black.recv().await.as_deref(), Some("MOVES|e5,e6"));

    // Asking twice gives the same answer.
    black.send("MOVES|e7").await;
    assert_eq!(black.recv().await.as_deref(), Some("MOVES|e5,e6"));

    // Not White's turn: empty answer.
    white.send("MOVES|d2").await;
    assert_eq!(white.recv().await.as_deref(), Some("MOVES|"));
}

/// A move from an empty square is refused and never reaches the opponent.
#[tokio::test]
async fn move_from_empty_square_is_rejected() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, Some(0)).await;

    white.send("e3e4").await;
    assert_eq!(white.recv().await.as_deref(), Some("ERROR|Illegal move"));
    black.assert_silent(Duration::from_millis(150)).await;

    // The game carries on normally afterwards.
    white.send("d2d4").await;
    assert_eq!(black.recv().await.as_deref(), Some("d2d4"));
}

#[tokio::test]
async fn rejects_out_of_turn_and_malformed_moves() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, Some(0)).await;

    black.send("e7e5").await;
    assert_eq!(black.recv().await.as_deref(), Some("ERROR|Not your turn"));

    white.send("hello").await;
    assert_eq!(white.recv().await.as_deref(), Some("ERROR|Invalid move format"));

    white.send("PING|1").await;
    assert_eq!(white.recv().await.as_deref(), Some("ERROR|Unknown command: PING"));
}

/// Fool's mate ends the game with a relayed final move and closes both seats.
#[tokio::test]
async fn checkmate_ends_game() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, Some(0)).await;

    for (mover_is_white, token) in [(true, "f2f3"), (false, "e7e5"), (true, "g2g4"), (false, "d8h4")] {
        if mover_is_white {
            white.send(token).await;
            assert_eq!(black.recv().await.as_deref(), Some(token));
        } else {
            black.send(token).await;
            assert_eq!(white.recv().await.as_deref(), Some(token));
        }
    }

    assert_eq!(white.recv().await.as_deref(), Some("GAMEOVER|LOSE"));
    assert_eq!(black.recv().await.as_deref(), Some("GAMEOVER|WIN"));
    white.expect_closed().await;
    black.expect_closed().await;
    assert_eq!(server.registry.active_count().await, 0);
}

/// A frame that is not valid UTF-8 is reported to the sender only and the
/// game carries on.
#[tokio::test]
async fn invalid_utf8_frame_is_rejected() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, Some(0)).await;

    white.send_raw(b"e2\xffe4\n").await;
    assert_eq!(white.recv().await.as_deref(), Some("ERROR|Invalid frame encoding"));
    black.assert_silent(Duration::from_millis(150)).await;

    white.send("e2e4").await;
    assert_eq!(black.recv().await.as_deref(), Some("e2e4"));
    assert_eq!(server.registry.active_count().await, 1);
}

/// An oversize frame mid-game is refused, skipped, and the game continues.
#[tokio::test]
async fn oversize_frame_is_rejected() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, Some(0)).await;

    let mut flood = "CHAT|".to_string() + &"x".repeat(MAX_FRAME_LEN * 4);
    flood.push('\n');
    white.send_raw(flood.as_bytes()).await;
    assert_eq!(white.recv().await.as_deref(), Some("ERROR|Frame too long"));
    black.assert_silent(Duration::from_millis(150)).await;

    white.send("e2e4").await;
    assert_eq!(black.recv().await.as_deref(), Some("e2e4"));
}

/// A handshake that never ends is cut off at the frame cap.
#[tokio::test]
async fn oversize_handshake_is_rejected() {
    let server = common::spawn_server().await;
    let mut client = TestClient::connect(server.game_addr).await;

    client.send_raw("a".repeat(MAX_FRAME_LEN + 1).as_bytes()).await;
    assert_eq!(client.recv().await.as_deref(), Some("ERROR|Frame too long"));
    client.expect_closed().await;
    assert_eq!(server.registry.waiting_count().await, 0);
}

// ---------------------------------------------------------------------------
// Chat and disconnects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn relays_chat_with_sender_nickname() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, Some(0)).await;

    white.send("CHAT|good luck | have fun").await;
    assert_eq!(
        black.recv().await.as_deref(),
        Some("CHAT|alice|good luck | have fun")
    );
    white.assert_silent(Duration::from_millis(100)).await;

    black.send("CHAT|").await;
    assert_eq!(black.recv().await.as_deref(), Some("ERROR|Empty chat message"));
}

/// Dropping one seat ends the game for the other with OPPONENT_LEFT.
#[tokio::test]
async fn disconnect_notifies_opponent() {
    let server = common::spawn_server().await;
    let (mut white, black) = common::paired(server.game_addr, Some(0)).await;

    drop(black);
    assert_eq!(white.recv().await.as_deref(), Some("GAMEOVER|OPPONENT_LEFT"));
    white.expect_closed().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.registry.active_count().await, 0);
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Timed games broadcast TIME snapshots on start, on every move and on
/// every clock tick.
#[tokio::test]
async fn timed_game_broadcasts_clock() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, Some(60)).await;

    assert_eq!(white.recv().await.as_deref(), Some("TIME|60|60"));
    assert_eq!(black.recv().await.as_deref(), Some("TIME|60|60"));

    // The tick task keeps sending snapshots while White thinks; Black's
    // clock stays frozen.
    let tick = black.recv().await.expect("Expected a TIME tick");
    assert!(tick.starts_with("TIME|"), "got {tick}");
    assert!(tick.ends_with("|60"), "got {tick}");

    white.send("e2e4").await;
    assert_eq!(black.recv_skipping_time().await.as_deref(), Some("e2e4"));
}

/// Untimed games never send clock frames.
#[tokio::test]
async fn untimed_game_sends_no_clock() {
    let server = common::spawn_server().await;
    let (mut white, mut black) = common::paired(server.game_addr, Some(0)).await;

    white.send("e2e4").await;
    assert_eq!(black.recv().await.as_deref(), Some("e2e4"));
    tokio::time::sleep(Duration::from_millis(200)).await;

    black.send("MOVES|b8").await;
    assert_eq!(black.recv().await.as_deref(), Some("MOVES|a6,c6"));
}

/// Nobody moves in a 60s game: White's flag falls, both seats get the
/// result and the session leaves the registry.
#[tokio::test(start_paused = true)]
async fn flag_fall_ends_timed_game() {
    let server = common::spawn_server().await;
    let mut white = TestClient::join(server.game_addr, "alice|60").await;
    // Spin instead of sleeping: a paused clock would skip any sleep at once.
    while server.registry.waiting_count().await == 0 {
        tokio::task::yield_now().await;
    }
    let mut black = TestClient::join(server.game_addr, "bob|60").await;

    assert_eq!(
        white.lines_until_closed().await,
        vec!["START|WHITE", "TIMEOUT|WHITE", "GAMEOVER|LOSE"]
    );
    assert_eq!(
        black.lines_until_closed().await,
        vec!["START|BLACK", "TIMEOUT|WHITE", "GAMEOVER|WIN"]
    );

    for _ in 0..10 {
        if server.registry.active_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.registry.active_count().await, 0);
}
