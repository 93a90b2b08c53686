//! The same patterns over TCP and IPC, plus reconnection.

use std::thread;
use std::time::{Duration, Instant};

use nanosp_core::message::{Ancillary, Message};
use nanosp_core::protocol::{Domain, Protocol};
use nanosp_core::stats::Statistic;
use nanosp_core::symbols::{RCVTIMEO, RECONNECT_IVL, SNDTIMEO, SOL_SOCKET, SUB, SUB_SUBSCRIBE};
use nanosp_core::transport::EndpointState;
use nanosp_proto::Socket;

fn open(protocol: Protocol) -> Socket {
    let socket = Socket::open(Domain::Sp, protocol).unwrap();
    socket.set_option(SOL_SOCKET, RCVTIMEO, 5000).unwrap();
    socket.set_option(SOL_SOCKET, SNDTIMEO, 5000).unwrap();
    socket.set_option(SOL_SOCKET, RECONNECT_IVL, 20).unwrap();
    socket
}

fn tcp_address() -> String {
    let port = portpicker::pick_unused_port().expect("no free port");
    format!("tcp://127.0.0.1:{port}")
}

/// Poll `cond` until it holds or two seconds pass.
fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn request_reply(address: &str) {
    let rep = open(Protocol::Rep);
    rep.bind(address).unwrap();
    let req = open(Protocol::Req);
    req.connect(address).unwrap();

    for i in 0..3 {
        req.send(format!("request {i}"), 0).unwrap();
        let request = rep.recv(0).unwrap();
        assert_eq!(request, format!("request {i}").as_bytes());
        rep.send(format!("reply {i}"), 0).unwrap();
        assert_eq!(req.recv(0).unwrap(), format!("reply {i}").as_bytes());
    }
}

#[test]
fn test_reqrep_over_tcp() {
    request_reply(&tcp_address());
}

#[cfg(unix)]
#[test]
fn test_reqrep_over_ipc() {
    let path = std::env::temp_dir().join(format!("nanosp-reqrep-{}.ipc", std::process::id()));
    request_reply(&format!("ipc://{}", path.display()));
}

#[test]
fn test_pubsub_over_tcp() {
    let address = tcp_address();
    let publisher = open(Protocol::Pub);
    publisher.bind(&address).unwrap();
    let subscriber = open(Protocol::Sub);
    subscriber.set_option(SUB, SUB_SUBSCRIBE, "news").unwrap();
    subscriber.connect(&address).unwrap();

    assert!(eventually(|| publisher.get_statistic(Statistic::CurrentConnections) == 1));
    publisher.send("weather: sunny", 0).unwrap();
    publisher.send("news: none", 0).unwrap();
    assert_eq!(subscriber.recv(0).unwrap(), "news: none");
}

#[test]
fn test_ancillary_round_trip_over_tcp() {
    let address = tcp_address();
    let a = open(Protocol::Pair);
    a.bind(&address).unwrap();
    let b = open(Protocol::Pair);
    b.connect(&address).unwrap();

    let entries = vec![
        Ancillary::new(7, 1, "first"),
        Ancillary::new(7, 2, ""),
        Ancillary::new(-3, 9, vec![0u8; 13]),
    ];
    let sent = Message::from_parts("body", entries.clone());
    b.send_msg(sent, 0).unwrap();

    let received = a.recv_msg(0).unwrap();
    assert_eq!(received.body(), "body");
    assert_eq!(received.ancillary(), entries.as_slice());
}

#[test]
fn test_connect_before_bind_over_tcp() {
    let address = tcp_address();
    let push = open(Protocol::Push);
    let endpoint = push.connect(&address).unwrap();
    assert!(eventually(|| push.get_statistic(Statistic::ConnectErrors) > 0));
    assert!(eventually(|| push.get_statistic(Statistic::CurrentEndpointErrors) == 1));
    assert_eq!(push.endpoints().unwrap()[0].state, EndpointState::Pending);

    let pull = open(Protocol::Pull);
    pull.bind(&address).unwrap();
    push.send("late", 0).unwrap();
    assert_eq!(pull.recv(0).unwrap(), "late");
    assert!(eventually(|| push.endpoints().unwrap()[0].state == EndpointState::Active));
    assert_eq!(push.get_statistic(Statistic::CurrentEndpointErrors), 0);

    push.shutdown(endpoint).unwrap();
    assert!(eventually(|| pull.get_statistic(Statistic::CurrentConnections) == 0));
}

#[test]
fn test_reconnect_after_binder_restart() {
    let address = tcp_address();
    let push = open(Protocol::Push);
    push.connect(&address).unwrap();

    let pull = open(Protocol::Pull);
    pull.bind(&address).unwrap();
    push.send("one", 0).unwrap();
    assert_eq!(pull.recv(0).unwrap(), "one");

    pull.close().unwrap();
    assert!(eventually(|| push.get_statistic(Statistic::CurrentConnections) == 0));
    assert!(push.get_statistic(Statistic::BrokenConnections) >= 1);

    let restarted = open(Protocol::Pull);
    restarted.bind(&address).unwrap();
    push.send("two", 0).unwrap();
    assert_eq!(restarted.recv(0).unwrap(), "two");
    assert!(push.get_statistic(Statistic::EstablishedConnections) >= 2);
}

#[test]
fn test_incompatible_peer_is_dropped() {
    let address = tcp_address();
    let pull = open(Protocol::Pull);
    pull.bind(&address).unwrap();
    let publisher = open(Protocol::Pub);
    publisher.connect(&address).unwrap();

    assert!(eventually(|| pull.get_statistic(Statistic::DroppedConnections) > 0));
    assert_eq!(pull.get_statistic(Statistic::CurrentConnections), 0);
}
