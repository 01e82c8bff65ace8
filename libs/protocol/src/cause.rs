//! Known X2 reset causes.
//!
//! Causes are addressed as `group:value` strings (for example
//! `misc:om-intervention`). The table is closed: anything not listed here is
//! rejected before a reset is sent.

use serde::Serialize;

use crate::error::ProtocolError;

/// Cause used when a reset request does not name one.
pub const DEFAULT_RESET_CAUSE: &str = "misc:om-intervention";

/// X2AP cause group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CauseGroup {
    RadioNetwork,
    Transport,
    Protocol,
    Misc,
}

/// A validated reset cause: group plus the X2AP enumerated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResetCause {
    pub group: CauseGroup,
    pub value: u8,
    #[serde(skip)]
    name: &'static str,
}

const fn cause(name: &'static str, group: CauseGroup, value: u8) -> ResetCause {
    ResetCause { group, value, name }
}

static KNOWN_CAUSES: &[ResetCause] = &[
    cause("radioNetwork:handover-desirable-for-radio-reasons", CauseGroup::RadioNetwork, 0),
    cause("radioNetwork:time-critical-handover", CauseGroup::RadioNetwork, 1),
    cause("radioNetwork:resource-optimisation-handover", CauseGroup::RadioNetwork, 2),
    cause("radioNetwork:reduce-load-in-serving-cell", CauseGroup::RadioNetwork, 3),
    cause("radioNetwork:partial-handover", CauseGroup::RadioNetwork, 4),
    cause("radioNetwork:unknown-new-enb-ue-x2ap-id", CauseGroup::RadioNetwork, 5),
    cause("radioNetwork:unknown-old-enb-ue-x2ap-id", CauseGroup::RadioNetwork, 6),
    cause("radioNetwork:unknown-pair-of-ue-x2ap-id", CauseGroup::RadioNetwork, 7),
    cause("radioNetwork:ho-target-not-allowed", CauseGroup::RadioNetwork, 8),
    cause("radioNetwork:tx2relocoverall-expiry", CauseGroup::RadioNetwork, 9),
    cause("radioNetwork:trelocprep-expiry", CauseGroup::RadioNetwork, 10),
    cause("radioNetwork:cell-not-available", CauseGroup::RadioNetwork, 11),
    cause("radioNetwork:no-radio-resources-available-in-target-cell", CauseGroup::RadioNetwork, 12),
    cause("radioNetwork:invalid-mme-groupid", CauseGroup::RadioNetwork, 13),
    cause("radioNetwork:unknown-mme-code", CauseGroup::RadioNetwork, 14),
    cause("radioNetwork:encryption-and-or-integrity-protection-algorithms-not-supported", CauseGroup::RadioNetwork, 15),
    cause("radioNetwork:reportcharacteristicsempty", CauseGroup::RadioNetwork, 16),
    cause("radioNetwork:noreportperiodicity", CauseGroup::RadioNetwork, 17),
    cause("radioNetwork:existingmeasurementid", CauseGroup::RadioNetwork, 18),
    cause("radioNetwork:unknown-enb-measurement-id", CauseGroup::RadioNetwork, 19),
    cause("radioNetwork:measurement-temporarily-not-available", CauseGroup::RadioNetwork, 20),
    cause("radioNetwork:unspecified", CauseGroup::RadioNetwork, 21),
    cause("transport:transport-resource-unavailable", CauseGroup::Transport, 0),
    cause("transport:unspecified", CauseGroup::Transport, 1),
    cause("protocol:transfer-syntax-error", CauseGroup::Protocol, 0),
    cause("protocol:abstract-syntax-error-reject", CauseGroup::Protocol, 1),
    cause("protocol:abstract-syntax-error-ignore-and-notify", CauseGroup::Protocol, 2),
    cause("protocol:message-not-compatible-with-receiver-state", CauseGroup::Protocol, 3),
    cause("protocol:semantic-error", CauseGroup::Protocol, 4),
    cause("protocol:unspecified", CauseGroup::Protocol, 5),
    cause("protocol:abstract-syntax-error-falsely-constructed-message", CauseGroup::Protocol, 6),
    cause("misc:control-processing-overload", CauseGroup::Misc, 0),
    cause("misc:hardware-failure", CauseGroup::Misc, 1),
    cause("misc:om-intervention", CauseGroup::Misc, 2),
    cause("misc:not-enough-user-plane-processing-resources", CauseGroup::Misc, 3),
    cause("misc:unspecified", CauseGroup::Misc, 4),
];

impl ResetCause {
    /// Look up a cause by name. Matching is case-insensitive.
    pub fn parse(name: &str) -> Result<Self, ProtocolError> {
        let wanted = name.trim();
        KNOWN_CAUSES
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| ProtocolError::UnknownCause(name.to_string()))
    }

    /// The default operational cause.
    pub fn default_cause() -> Self {
        // The default is part of the static table.
        Self::parse(DEFAULT_RESET_CAUSE).unwrap_or(cause(DEFAULT_RESET_CAUSE, CauseGroup::Misc, 2))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All known causes, in table order.
    pub fn known() -> impl Iterator<Item = &'static ResetCause> {
        KNOWN_CAUSES.iter()
    }
}

impl std::fmt::Display for ResetCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_cause() {
        let cause = ResetCause::parse("protocol:semantic-error").unwrap();
        assert_eq!(cause.group, CauseGroup::Protocol);
        assert_eq!(cause.value, 4);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let cause = ResetCause::parse("radioNetwork:Cell-Not-Available").unwrap();
        assert_eq!(cause.group, CauseGroup::RadioNetwork);
        assert_eq!(cause.value, 11);
    }

    #[test]
    fn test_unknown_cause_rejected() {
        assert_eq!(
            ResetCause::parse("XXX"),
            Err(ProtocolError::UnknownCause("XXX".to_string()))
        );
    }

    #[test]
    fn test_default_cause() {
        let cause = ResetCause::default_cause();
        assert_eq!(cause.name(), DEFAULT_RESET_CAUSE);
        assert_eq!(cause.group, CauseGroup::Misc);
    }

    #[test]
    fn test_table_has_unique_names() {
        let mut names: Vec<_> = ResetCause::known().map(|c| c.name()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    proptest::proptest! {
        #[test]
        fn test_parse_never_accepts_unlisted_names(name in "\\PC{0,40}") {
            match ResetCause::parse(&name) {
                Ok(cause) => proptest::prop_assert!(cause.name().eq_ignore_ascii_case(name.trim())),
                Err(e) => proptest::prop_assert_eq!(e, ProtocolError::UnknownCause(name.clone())),
            }
        }
    }
}
