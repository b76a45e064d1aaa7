//! Acknowledgement code enumerations
//!
//! Every well-formed reply that carries an embedded code is mapped through
//! one of these before anything else looks at it. Codes outside the defined
//! range map to `Unknown(code)` and are never treated as success.

use std::fmt;

macro_rules! ack_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($code:literal => $variant:ident : $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                #[doc = $text]
                $variant,
            )+
            /// Code outside the defined range.
            Unknown(u8),
        }

        impl $name {
            /// Map a raw code.
            #[must_use]
            pub fn from_code(code: u8) -> Self {
                match code {
                    $($code => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }

            /// Raw code.
            #[must_use]
            pub fn code(&self) -> u8 {
                match self {
                    $(Self::$variant => $code,)+
                    Self::Unknown(other) => *other,
                }
            }

            /// Human-readable reason.
            #[must_use]
            pub fn description(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                    Self::Unknown(_) => "unknown acknowledgement code",
                }
            }

            /// Only code 0 is success.
            #[must_use]
            pub fn is_ok(&self) -> bool {
                self.code() == 0 && !matches!(self, Self::Unknown(_))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} ({})", self.description(), self.code())
            }
        }
    };
}

ack_enum! {
    /// DRACK - reply to a define-report request (S2F34).
    DefineReportAck {
        0 => Accepted: "accepted",
        1 => OutOfSpace: "denied, insufficient space",
        2 => InvalidFormat: "denied, invalid format",
        3 => DuplicateReport: "denied, RPTID already defined",
        4 => InvalidVariable: "denied, VID does not exist",
    }
}

ack_enum! {
    /// LRACK - reply to a link-event-report request (S2F36).
    LinkReportAck {
        0 => Accepted: "accepted",
        1 => OutOfSpace: "denied, insufficient space",
        2 => InvalidFormat: "denied, invalid format",
        3 => DuplicateLink: "denied, CEID link already defined",
        4 => InvalidEvent: "denied, CEID does not exist",
        5 => InvalidReport: "denied, RPTID does not exist",
    }
}

ack_enum! {
    /// ERACK - reply to an enable/disable-event request (S2F38).
    EnableEventAck {
        0 => Accepted: "accepted",
        1 => Denied: "denied, at least one CEID does not exist",
    }
}

ack_enum! {
    /// HCACK - reply to a host command (S2F42).
    HostCommandAck {
        0 => Performed: "acknowledged, command has been performed",
        1 => InvalidCommand: "command does not exist",
        2 => CannotPerformNow: "cannot perform now",
        3 => InvalidParameter: "at least one parameter is invalid",
        4 => InitiatedAsync: "acknowledged, completion signalled later",
        5 => AlreadyInCondition: "rejected, already in desired condition",
        6 => InvalidObject: "no such object exists",
    }
}

impl HostCommandAck {
    /// Performed now, or initiated with completion signalled later.
    ///
    /// The later completion event is not awaited.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Performed | Self::InitiatedAsync)
    }
}

ack_enum! {
    /// ACKC7 - reply to process-program send and delete (S7F4, S7F18).
    ProgramAck {
        0 => Accepted: "accepted",
        1 => PermissionDenied: "permission not granted",
        2 => LengthError: "length error",
        3 => MatrixOverflow: "matrix overflow",
        4 => PpidNotFound: "PPID not found",
        5 => ModeUnsupported: "mode unsupported",
        6 => InitiatedAsync: "initiated for asynchronous completion",
        7 => StorageLimit: "storage limit error",
    }
}

ack_enum! {
    /// ONLACK - reply to request on-line (S1F18).
    OnlineAck {
        0 => Accepted: "on-line accepted",
        1 => Refused: "on-line not allowed",
        2 => AlreadyOnline: "equipment already on-line",
    }
}

ack_enum! {
    /// OFLACK - reply to request off-line (S1F16).
    OfflineAck {
        0 => Accepted: "off-line acknowledged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_round_trip() {
        assert_eq!(DefineReportAck::from_code(3), DefineReportAck::DuplicateReport);
        assert_eq!(LinkReportAck::from_code(5).code(), 5);
        assert_eq!(ProgramAck::from_code(7), ProgramAck::StorageLimit);
    }

    #[test]
    fn test_unknown_code_is_never_ok() {
        let ack = EnableEventAck::from_code(9);
        assert_eq!(ack, EnableEventAck::Unknown(9));
        assert!(!ack.is_ok());
        assert_eq!(ack.code(), 9);
    }

    #[test]
    fn test_only_zero_is_ok() {
        assert!(ProgramAck::from_code(0).is_ok());
        assert!(!ProgramAck::from_code(6).is_ok());
        assert!(!HostCommandAck::from_code(4).is_ok());
    }

    #[test]
    fn test_host_command_async_is_accepted() {
        assert!(HostCommandAck::from_code(0).is_accepted());
        assert!(HostCommandAck::from_code(4).is_accepted());
        assert!(!HostCommandAck::from_code(2).is_accepted());
        assert!(!HostCommandAck::from_code(6).is_accepted());
    }

    #[test]
    fn test_display_names_code() {
        assert_eq!(ProgramAck::PpidNotFound.to_string(), "PPID not found (4)");
    }
}
