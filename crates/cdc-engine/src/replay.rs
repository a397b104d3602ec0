use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cdc_protocol::{ReplayHint, ReplayPreset, ReplayStart, StoredOffset};

/// Result of resolving a [`ReplayHint`] against the stored offset: the
/// descriptor to open the stream with, and whether the stored offset should
/// be cleared first (an invalid base64 cursor is discarded, never retried).
pub struct Resolved {
    pub start: ReplayStart,
    pub clear_stored: bool,
}

fn decode_replay_id(b64: &str) -> Option<Vec<u8>> {
    BASE64.decode(b64).ok()
}

/// Implements the replay-start selection table: `latest`/`earliest` map
/// directly to their preset; `custom` decodes the supplied id or falls back
/// to `LATEST` on bad base64 (no clear — the bad id isn't ours to discard);
/// `since` resolves to `EARLIEST` with a local drop-before cutoff; `stored`
/// (the default) prefers a valid stored cursor, falling back to `EARLIEST`
/// and clearing the stored value if it doesn't decode.
pub fn resolve(hint: &ReplayHint, stored: Option<&StoredOffset>, now_ms: i64) -> Resolved {
    match hint {
        ReplayHint::Latest => Resolved {
            start: ReplayStart {
                preset: ReplayPreset::Latest,
                drop_before_ms: None,
            },
            clear_stored: false,
        },
        ReplayHint::Earliest => Resolved {
            start: ReplayStart {
                preset: ReplayPreset::Earliest,
                drop_before_ms: None,
            },
            clear_stored: false,
        },
        ReplayHint::Custom { replay_id_b64 } => match decode_replay_id(replay_id_b64) {
            Some(bytes) => Resolved {
                start: ReplayStart {
                    preset: ReplayPreset::Custom(bytes),
                    drop_before_ms: None,
                },
                clear_stored: false,
            },
            None => Resolved {
                start: ReplayStart {
                    preset: ReplayPreset::Latest,
                    drop_before_ms: None,
                },
                clear_stored: false,
            },
        },
        ReplayHint::Since { since_minutes } => {
            let drop_before_ms = if *since_minutes > 0 { Some(now_ms - since_minutes * 60_000) } else { None };
            Resolved {
                start: ReplayStart {
                    preset: ReplayPreset::Earliest,
                    drop_before_ms,
                },
                clear_stored: false,
            }
        }
        ReplayHint::Stored => match stored.and_then(|s| decode_replay_id(&s.replay_b64)) {
            Some(bytes) => Resolved {
                start: ReplayStart {
                    preset: ReplayPreset::Custom(bytes),
                    drop_before_ms: None,
                },
                clear_stored: false,
            },
            None => Resolved {
                start: ReplayStart {
                    preset: ReplayPreset::Earliest,
                    drop_before_ms: None,
                },
                clear_stored: stored.is_some(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_hint_maps_to_latest_preset() {
        let resolved = resolve(&ReplayHint::Latest, None, 0);
        assert_eq!(resolved.start.preset, ReplayPreset::Latest);
        assert!(!resolved.clear_stored);
    }

    #[test]
    fn custom_with_valid_base64_decodes_bytes() {
        let b64 = BASE64.encode(b"cursor-123");
        let resolved = resolve(&ReplayHint::Custom { replay_id_b64: b64 }, None, 0);
        assert_eq!(resolved.start.preset, ReplayPreset::Custom(b"cursor-123".to_vec()));
    }

    #[test]
    fn custom_with_invalid_base64_falls_back_to_latest() {
        let resolved = resolve(
            &ReplayHint::Custom {
                replay_id_b64: "!!!not-base64".to_owned(),
            },
            None,
            0,
        );
        assert_eq!(resolved.start.preset, ReplayPreset::Latest);
        assert!(!resolved.clear_stored);
    }

    #[test]
    fn since_sets_drop_before_cutoff() {
        let resolved = resolve(&ReplayHint::Since { since_minutes: 5 }, None, 1_700_000_000_000);
        assert_eq!(resolved.start.preset, ReplayPreset::Earliest);
        assert_eq!(resolved.start.drop_before_ms, Some(1_700_000_000_000 - 5 * 60_000));
    }

    #[test]
    fn stored_with_invalid_base64_falls_back_to_earliest_and_clears() {
        let stored = StoredOffset {
            replay_b64: "!!!not-base64".to_owned(),
            commit_ms: None,
        };
        let resolved = resolve(&ReplayHint::Stored, Some(&stored), 0);
        assert_eq!(resolved.start.preset, ReplayPreset::Earliest);
        assert!(resolved.clear_stored);
    }

    #[test]
    fn stored_with_valid_base64_resumes_with_custom_preset() {
        let b64 = BASE64.encode(b"cursor-xyz");
        let stored = StoredOffset {
            replay_b64: b64,
            commit_ms: Some(42),
        };
        let resolved = resolve(&ReplayHint::Stored, Some(&stored), 0);
        assert_eq!(resolved.start.preset, ReplayPreset::Custom(b"cursor-xyz".to_vec()));
        assert!(!resolved.clear_stored);
    }

    #[test]
    fn stored_with_no_prior_offset_defaults_to_earliest() {
        let resolved = resolve(&ReplayHint::Stored, None, 0);
        assert_eq!(resolved.start.preset, ReplayPreset::Earliest);
        assert!(!resolved.clear_stored);
    }
}
