//! Keyed option access through the option table

use nanosp_core::error::ErrorKind;
use nanosp_core::options::{
    lookup, Applied, OptionKey, OptionValue, SocketOptions, OPTION_TABLE,
};
use nanosp_core::protocol::{Domain, Protocol};
use nanosp_core::symbols;
use std::time::Duration;

fn set(
    opts: &mut SocketOptions,
    protocol: Protocol,
    level: i32,
    name: i32,
    value: OptionValue,
) -> Result<Applied, ErrorKind> {
    let spec = lookup(protocol, level, name).map_err(|e| e.kind())?;
    opts.apply(spec, value).map_err(|e| e.kind())
}

fn get(
    opts: &SocketOptions,
    protocol: Protocol,
    level: i32,
    name: i32,
) -> Result<OptionValue, ErrorKind> {
    let spec = lookup(protocol, level, name).map_err(|e| e.kind())?;
    opts.read(spec, Domain::Sp, protocol).map_err(|e| e.kind())
}

#[test]
fn test_every_readable_option_has_a_value() {
    let opts = SocketOptions::default();
    for spec in OPTION_TABLE {
        let protocol = if spec.level > 0 {
            Protocol::from_raw(spec.level).unwrap()
        } else {
            Protocol::Pair
        };
        let result = opts.read(spec, Domain::Sp, protocol);
        match spec.key {
            OptionKey::Subscribe | OptionKey::Unsubscribe => {
                assert_eq!(result.unwrap_err().kind(), ErrorKind::NotSupported);
            }
            _ => assert!(result.is_ok(), "{} unreadable", spec.label),
        }
    }
}

#[test]
fn test_linger_and_timeouts() {
    let mut opts = SocketOptions::default();
    set(&mut opts, Protocol::Req, symbols::SOL_SOCKET, symbols::LINGER, 0.into()).unwrap();
    assert_eq!(opts.linger, Some(Duration::ZERO));

    set(&mut opts, Protocol::Req, symbols::SOL_SOCKET, symbols::SNDTIMEO, 1500.into()).unwrap();
    assert_eq!(
        get(&opts, Protocol::Req, symbols::SOL_SOCKET, symbols::SNDTIMEO).unwrap(),
        OptionValue::Int(1500)
    );
    assert_eq!(
        get(&opts, Protocol::Req, symbols::SOL_SOCKET, symbols::RCVTIMEO).unwrap(),
        OptionValue::Int(-1)
    );
}

#[test]
fn test_protocol_options() {
    let mut opts = SocketOptions::default();
    set(&mut opts, Protocol::Req, symbols::REQ, symbols::REQ_RESEND_IVL, 250.into()).unwrap();
    assert_eq!(opts.req_resend_ivl, Duration::from_millis(250));

    set(
        &mut opts,
        Protocol::Surveyor,
        symbols::SURVEYOR,
        symbols::SURVEYOR_DEADLINE,
        50.into(),
    )
    .unwrap();
    assert_eq!(opts.surveyor_deadline, Duration::from_millis(50));

    assert_eq!(
        set(&mut opts, Protocol::Rep, symbols::REQ, symbols::REQ_RESEND_IVL, 250.into()),
        Err(ErrorKind::NotFound)
    );
}

#[test]
fn test_socket_name() {
    let mut opts = SocketOptions::default();
    set(
        &mut opts,
        Protocol::Bus,
        symbols::SOL_SOCKET,
        symbols::SOCKET_NAME,
        "bus-a".into(),
    )
    .unwrap();
    assert_eq!(
        get(&opts, Protocol::Bus, symbols::SOL_SOCKET, symbols::SOCKET_NAME).unwrap(),
        OptionValue::from("bus-a")
    );
    assert_eq!(
        set(&mut opts, Protocol::Bus, symbols::SOL_SOCKET, symbols::SOCKET_NAME, 3.into()),
        Err(ErrorKind::InvalidArgument)
    );
}

#[test]
fn test_protocol_option_read_reports_protocol() {
    let opts = SocketOptions::default();
    let spec = lookup(Protocol::Sub, symbols::SOL_SOCKET, symbols::PROTOCOL).unwrap();
    assert_eq!(
        opts.read(spec, Domain::SpRaw, Protocol::Sub).unwrap(),
        OptionValue::Int(i64::from(symbols::SUB))
    );
    let spec = lookup(Protocol::Sub, symbols::SOL_SOCKET, symbols::DOMAIN).unwrap();
    assert_eq!(
        opts.read(spec, Domain::SpRaw, Protocol::Sub).unwrap(),
        OptionValue::Int(2)
    );
}
