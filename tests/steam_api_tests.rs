// Steam API response policy: zero players is a failure, missing count is malformed

use steam_player_tracker::steam_api::{SteamApiError, validate_player_count};

#[test]
fn zero_players_is_rejected() {
    let err = validate_player_count(Some(0)).unwrap_err();
    assert!(matches!(err, SteamApiError::ZeroPlayers));
    assert!(err.to_string().contains("0 players"));
}

#[test]
fn missing_count_is_invalid_response() {
    assert!(matches!(
        validate_player_count(None),
        Err(SteamApiError::InvalidResponse)
    ));
}

#[test]
fn positive_count_passes_through() {
    assert_eq!(validate_player_count(Some(1)).unwrap(), 1);
    assert_eq!(validate_player_count(Some(1_234_567)).unwrap(), 1_234_567);
}
