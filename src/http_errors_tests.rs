// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `http_errors.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::status_reasons::{
        REASON_DIRECTORY_UNAVAILABLE, REASON_DISCOVERY_PROTOCOL_ERROR,
        REASON_DISCOVERY_UNREACHABLE, REASON_LISTING_FAILED,
    };

    #[test]
    fn test_input_errors_are_400() {
        for reason in [
            REASON_BAD_REQUEST,
            REASON_MISSING_TARGET,
            REASON_INVALID_CREDENTIALS,
            REASON_INVALID_SEED,
        ] {
            assert_eq!(map_reason_to_http_status(reason), 400, "{reason}");
        }
    }

    #[test]
    fn test_auth_errors_are_401() {
        assert_eq!(map_reason_to_http_status(REASON_DISCOVERY_AUTH_FAILED), 401);
        assert_eq!(map_reason_to_http_status(REASON_DIRECTORY_AUTH_FAILED), 401);
    }

    #[test]
    fn test_upstream_errors_are_502() {
        for reason in [
            REASON_DISCOVERY_PROTOCOL_ERROR,
            REASON_DISCOVERY_UNREACHABLE,
            REASON_LISTING_FAILED,
            REASON_DIRECTORY_UNAVAILABLE,
        ] {
            assert_eq!(map_reason_to_http_status(reason), 502, "{reason}");
        }
    }

    #[test]
    fn test_unknown_reason_is_502() {
        assert_eq!(map_reason_to_http_status("SomethingNew"), 502);
    }
}
