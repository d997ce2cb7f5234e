use super::*;

#[test]
fn http_base_maps_to_ws_feed() {
    let endpoint = Endpoint::parse("http://127.0.0.1:3000").unwrap();
    assert_eq!(endpoint.feed_url("global").as_str(), "ws://127.0.0.1:3000/api/chat/ws?room=global");
}

#[test]
fn https_base_maps_to_wss_feed() {
    let endpoint = Endpoint::parse("https://chat.example.com/").unwrap();
    assert_eq!(endpoint.feed_url("global").as_str(), "wss://chat.example.com/api/chat/ws?room=global");
}

#[test]
fn room_is_query_encoded() {
    let endpoint = Endpoint::parse("https://chat.example.com").unwrap();
    let url = endpoint.feed_url("ops & dev/1");
    let room = url
        .query_pairs()
        .find(|(k, _)| k == "room")
        .map(|(_, v)| v.into_owned());
    assert_eq!(room.as_deref(), Some("ops & dev/1"));
    assert!(!url.as_str().contains("& dev"));
}

#[test]
fn blank_room_falls_back_to_global() {
    let endpoint = Endpoint::parse("http://localhost:3000").unwrap();
    assert_eq!(endpoint.feed_url("  ").as_str(), "ws://localhost:3000/api/chat/ws?room=global");
    assert_eq!(normalize_room(" lobby "), "lobby");
}

#[test]
fn path_prefix_is_preserved() {
    let endpoint = Endpoint::parse("https://example.com/new-api/").unwrap();
    assert_eq!(endpoint.feed_url("global").as_str(), "wss://example.com/new-api/api/chat/ws?room=global");
    assert_eq!(endpoint.api_url("/api/status").as_str(), "https://example.com/new-api/api/status");
}

#[test]
fn api_url_drops_base_query() {
    let endpoint = Endpoint::parse("http://localhost:3000/?x=1").unwrap();
    assert_eq!(endpoint.api_url("/api/chat/count").as_str(), "http://localhost:3000/api/chat/count");
}

#[test]
fn rejects_non_http_bases() {
    for raw in ["ftp://example.com", "ws://example.com", "example.com", "", "http://"] {
        assert!(
            matches!(Endpoint::parse(raw), Err(FeedError::InvalidBaseUrl(_))),
            "{raw:?} should be rejected"
        );
    }
}
