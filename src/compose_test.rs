use super::*;

const CONNECTED: ConnectionState = ConnectionState::Connected;

#[test]
fn text_is_trimmed() {
    let out = Draft::new("  hi there \n").prepare(100, CONNECTED).unwrap();
    assert_eq!(out.content, "hi there");
    assert!(out.image_urls.is_empty());
}

#[test]
fn blank_without_images_is_empty() {
    assert_eq!(Draft::new(" \t ").prepare(100, CONNECTED), Err(ComposeError::Empty));
    assert!(Draft::default().is_empty());
}

#[test]
fn images_alone_are_sendable() {
    let mut draft = Draft::default();
    draft.attach("/api/chat/images/2025-01-01/a.png");
    assert!(!draft.is_empty());
    let out = draft.prepare(100, CONNECTED).unwrap();
    assert_eq!(out.content, "");
    assert_eq!(out.image_urls.len(), 1);
}

#[test]
fn length_counts_characters_after_trim() {
    let max = 4;
    assert!(Draft::new(" 聊天室! ").prepare(max, CONNECTED).is_ok());
    assert_eq!(Draft::new("聊天室!!").prepare(max, CONNECTED), Err(ComposeError::TooLong { max }));
}

#[test]
fn requires_connection() {
    for state in [ConnectionState::Disconnected, ConnectionState::Connecting] {
        assert_eq!(Draft::new("hi").prepare(100, state), Err(ComposeError::Disconnected));
    }
}

#[test]
fn clear_resets_draft() {
    let mut draft = Draft::new("x");
    draft.attach("u");
    draft.clear();
    assert_eq!(draft, Draft::default());
}
