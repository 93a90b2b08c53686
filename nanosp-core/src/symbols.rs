//! SP constant table.
//!
//! Every numeric constant of the SP API lives here as a compile-time value.
//! The [`symbol`] function enumerates them in a stable order so binding
//! layers can mirror the table without scraping headers.

/// Normal SP socket domain.
pub const AF_SP: i32 = 1;
/// Raw SP socket domain (no filtering, no state machines).
pub const AF_SP_RAW: i32 = 2;

/// Protocol family numbers.
pub const PROTO_PAIR: i32 = 1;
pub const PROTO_PUBSUB: i32 = 2;
pub const PROTO_REQREP: i32 = 3;
pub const PROTO_PIPELINE: i32 = 5;
pub const PROTO_SURVEY: i32 = 6;
pub const PROTO_BUS: i32 = 7;

/// Socket protocols (family * 16 + role).
pub const PAIR: i32 = PROTO_PAIR * 16;
pub const PUB: i32 = PROTO_PUBSUB * 16;
pub const SUB: i32 = PROTO_PUBSUB * 16 + 1;
pub const REQ: i32 = PROTO_REQREP * 16;
pub const REP: i32 = PROTO_REQREP * 16 + 1;
pub const PUSH: i32 = PROTO_PIPELINE * 16;
pub const PULL: i32 = PROTO_PIPELINE * 16 + 1;
pub const SURVEYOR: i32 = PROTO_SURVEY * 16 + 2;
pub const RESPONDENT: i32 = PROTO_SURVEY * 16 + 3;
pub const BUS: i32 = PROTO_BUS * 16;

/// Generic socket option level.
pub const SOL_SOCKET: i32 = 0;
/// Transport option levels.
pub const INPROC: i32 = -1;
pub const IPC: i32 = -2;
pub const TCP: i32 = -3;

/// Generic socket options.
pub const LINGER: i32 = 1;
pub const SNDBUF: i32 = 2;
pub const RCVBUF: i32 = 3;
pub const SNDTIMEO: i32 = 4;
pub const RCVTIMEO: i32 = 5;
pub const RECONNECT_IVL: i32 = 6;
pub const RECONNECT_IVL_MAX: i32 = 7;
pub const SNDPRIO: i32 = 8;
pub const DOMAIN: i32 = 12;
pub const PROTOCOL: i32 = 13;
pub const IPV4ONLY: i32 = 14;
pub const SOCKET_NAME: i32 = 15;
pub const RCVMAXSIZE: i32 = 16;
pub const MAXTTL: i32 = 17;

/// Transport options.
pub const TCP_NODELAY: i32 = 1;

/// Protocol options.
pub const SUB_SUBSCRIBE: i32 = 1;
pub const SUB_UNSUBSCRIBE: i32 = 2;
pub const REQ_RESEND_IVL: i32 = 1;
pub const SURVEYOR_DEADLINE: i32 = 1;

/// Send/recv flags.
pub const DONTWAIT: i32 = 1;

/// Poll masks.
pub const POLLIN: i16 = 1;
pub const POLLOUT: i16 = 2;

/// Ancillary level/type of the protocol header entry.
pub const PROTO_SP: i32 = 1;
pub const SP_HDR: i32 = 1;

/// Statistics.
pub const STAT_ESTABLISHED_CONNECTIONS: i32 = 101;
pub const STAT_ACCEPTED_CONNECTIONS: i32 = 102;
pub const STAT_DROPPED_CONNECTIONS: i32 = 103;
pub const STAT_BROKEN_CONNECTIONS: i32 = 104;
pub const STAT_CONNECT_ERRORS: i32 = 105;
pub const STAT_BIND_ERRORS: i32 = 106;
pub const STAT_ACCEPT_ERRORS: i32 = 107;
pub const STAT_CURRENT_CONNECTIONS: i32 = 201;
pub const STAT_INPROGRESS_CONNECTIONS: i32 = 202;
pub const STAT_CURRENT_EP_ERRORS: i32 = 203;
pub const STAT_MESSAGES_SENT: i32 = 301;
pub const STAT_MESSAGES_RECEIVED: i32 = 302;
pub const STAT_BYTES_SENT: i32 = 303;
pub const STAT_BYTES_RECEIVED: i32 = 304;
pub const STAT_CURRENT_SND_PRIORITY: i32 = 401;

/// Namespace a symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Domain,
    Protocol,
    OptionLevel,
    SocketOption,
    TransportOption,
    ProtocolOption,
    Flag,
    Statistic,
    Event,
}

/// A named constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub name: &'static str,
    pub value: i32,
    pub namespace: Namespace,
}

const fn sym(name: &'static str, value: i32, namespace: Namespace) -> Symbol {
    Symbol {
        name,
        value,
        namespace,
    }
}

/// Full table, in enumeration order.
pub const SYMBOLS: &[Symbol] = &[
    sym("AF_SP", AF_SP, Namespace::Domain),
    sym("AF_SP_RAW", AF_SP_RAW, Namespace::Domain),
    sym("PAIR", PAIR, Namespace::Protocol),
    sym("PUB", PUB, Namespace::Protocol),
    sym("SUB", SUB, Namespace::Protocol),
    sym("REQ", REQ, Namespace::Protocol),
    sym("REP", REP, Namespace::Protocol),
    sym("PUSH", PUSH, Namespace::Protocol),
    sym("PULL", PULL, Namespace::Protocol),
    sym("SURVEYOR", SURVEYOR, Namespace::Protocol),
    sym("RESPONDENT", RESPONDENT, Namespace::Protocol),
    sym("BUS", BUS, Namespace::Protocol),
    sym("SOL_SOCKET", SOL_SOCKET, Namespace::OptionLevel),
    sym("INPROC", INPROC, Namespace::OptionLevel),
    sym("IPC", IPC, Namespace::OptionLevel),
    sym("TCP", TCP, Namespace::OptionLevel),
    sym("LINGER", LINGER, Namespace::SocketOption),
    sym("SNDBUF", SNDBUF, Namespace::SocketOption),
    sym("RCVBUF", RCVBUF, Namespace::SocketOption),
    sym("SNDTIMEO", SNDTIMEO, Namespace::SocketOption),
    sym("RCVTIMEO", RCVTIMEO, Namespace::SocketOption),
    sym("RECONNECT_IVL", RECONNECT_IVL, Namespace::SocketOption),
    sym("RECONNECT_IVL_MAX", RECONNECT_IVL_MAX, Namespace::SocketOption),
    sym("SNDPRIO", SNDPRIO, Namespace::SocketOption),
    sym("DOMAIN", DOMAIN, Namespace::SocketOption),
    sym("PROTOCOL", PROTOCOL, Namespace::SocketOption),
    sym("IPV4ONLY", IPV4ONLY, Namespace::SocketOption),
    sym("SOCKET_NAME", SOCKET_NAME, Namespace::SocketOption),
    sym("RCVMAXSIZE", RCVMAXSIZE, Namespace::SocketOption),
    sym("MAXTTL", MAXTTL, Namespace::SocketOption),
    sym("TCP_NODELAY", TCP_NODELAY, Namespace::TransportOption),
    sym("SUB_SUBSCRIBE", SUB_SUBSCRIBE, Namespace::ProtocolOption),
    sym("SUB_UNSUBSCRIBE", SUB_UNSUBSCRIBE, Namespace::ProtocolOption),
    sym("REQ_RESEND_IVL", REQ_RESEND_IVL, Namespace::ProtocolOption),
    sym("SURVEYOR_DEADLINE", SURVEYOR_DEADLINE, Namespace::ProtocolOption),
    sym("DONTWAIT", DONTWAIT, Namespace::Flag),
    sym("POLLIN", POLLIN as i32, Namespace::Event),
    sym("POLLOUT", POLLOUT as i32, Namespace::Event),
    sym("STAT_ESTABLISHED_CONNECTIONS", STAT_ESTABLISHED_CONNECTIONS, Namespace::Statistic),
    sym("STAT_ACCEPTED_CONNECTIONS", STAT_ACCEPTED_CONNECTIONS, Namespace::Statistic),
    sym("STAT_DROPPED_CONNECTIONS", STAT_DROPPED_CONNECTIONS, Namespace::Statistic),
    sym("STAT_BROKEN_CONNECTIONS", STAT_BROKEN_CONNECTIONS, Namespace::Statistic),
    sym("STAT_CONNECT_ERRORS", STAT_CONNECT_ERRORS, Namespace::Statistic),
    sym("STAT_BIND_ERRORS", STAT_BIND_ERRORS, Namespace::Statistic),
    sym("STAT_ACCEPT_ERRORS", STAT_ACCEPT_ERRORS, Namespace::Statistic),
    sym("STAT_CURRENT_CONNECTIONS", STAT_CURRENT_CONNECTIONS, Namespace::Statistic),
    sym("STAT_INPROGRESS_CONNECTIONS", STAT_INPROGRESS_CONNECTIONS, Namespace::Statistic),
    sym("STAT_CURRENT_EP_ERRORS", STAT_CURRENT_EP_ERRORS, Namespace::Statistic),
    sym("STAT_MESSAGES_SENT", STAT_MESSAGES_SENT, Namespace::Statistic),
    sym("STAT_MESSAGES_RECEIVED", STAT_MESSAGES_RECEIVED, Namespace::Statistic),
    sym("STAT_BYTES_SENT", STAT_BYTES_SENT, Namespace::Statistic),
    sym("STAT_BYTES_RECEIVED", STAT_BYTES_RECEIVED, Namespace::Statistic),
    sym("STAT_CURRENT_SND_PRIORITY", STAT_CURRENT_SND_PRIORITY, Namespace::Statistic),
];

/// Enumerate the constant table; `None` past the end.
#[must_use]
pub fn symbol(index: usize) -> Option<Symbol> {
    SYMBOLS.get(index).copied()
}

/// Look a constant up by name.
#[must_use]
pub fn lookup(name: &str) -> Option<i32> {
    SYMBOLS.iter().find(|s| s.name == name).map(|s| s.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_numbers() {
        assert_eq!(PAIR, 16);
        assert_eq!(PUB, 32);
        assert_eq!(SUB, 33);
        assert_eq!(REQ, 48);
        assert_eq!(REP, 49);
        assert_eq!(PUSH, 80);
        assert_eq!(PULL, 81);
        assert_eq!(SURVEYOR, 98);
        assert_eq!(RESPONDENT, 99);
        assert_eq!(BUS, 112);
    }

    #[test]
    fn test_enumeration_terminates() {
        let count = (0..).take_while(|i| symbol(*i).is_some()).count();
        assert_eq!(count, SYMBOLS.len());
        assert_eq!(symbol(0).map(|s| s.name), Some("AF_SP"));
    }

    #[test]
    fn test_names_are_unique() {
        for (i, a) in SYMBOLS.iter().enumerate() {
            assert!(
                SYMBOLS[i + 1..].iter().all(|b| b.name != a.name),
                "duplicate symbol {}",
                a.name
            );
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("STAT_MESSAGES_SENT"), Some(301));
        assert_eq!(lookup("NOPE"), None);
    }
}
