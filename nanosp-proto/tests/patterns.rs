//! Messaging patterns over the inproc transport.

use std::thread;
use std::time::{Duration, Instant};

use nanosp_core::error::ErrorKind;
use nanosp_core::message::Message;
use nanosp_core::protocol::{Domain, Protocol};
use nanosp_core::stats::Statistic;
use nanosp_core::symbols::{
    DONTWAIT, MAXTTL, RCVTIMEO, REQ, REQ_RESEND_IVL, SOL_SOCKET, SUB, SUB_SUBSCRIBE, SURVEYOR,
    SURVEYOR_DEADLINE,
};
use nanosp_proto::Socket;

fn open(protocol: Protocol) -> Socket {
    let socket = Socket::open(Domain::Sp, protocol).unwrap();
    socket.set_option(SOL_SOCKET, RCVTIMEO, 2000).unwrap();
    socket
}

#[test]
fn test_pubsub_prefix_filtering() {
    let publisher = open(Protocol::Pub);
    publisher.bind("inproc://patterns-pubsub").unwrap();

    let matching = open(Protocol::Sub);
    matching.set_option(SUB, SUB_SUBSCRIBE, "FL").unwrap();
    matching.connect("inproc://patterns-pubsub").unwrap();

    let wildcard = open(Protocol::Sub);
    wildcard.set_option(SUB, SUB_SUBSCRIBE, "").unwrap();
    wildcard.connect("inproc://patterns-pubsub").unwrap();

    let other = open(Protocol::Sub);
    other.set_option(SUB, SUB_SUBSCRIBE, "XY").unwrap();
    other.set_option(SOL_SOCKET, RCVTIMEO, 100).unwrap();
    other.connect("inproc://patterns-pubsub").unwrap();

    let unsubscribed = open(Protocol::Sub);
    unsubscribed.set_option(SOL_SOCKET, RCVTIMEO, 100).unwrap();
    unsubscribed.connect("inproc://patterns-pubsub").unwrap();

    assert_eq!(publisher.send("FLUB", 0).unwrap(), 4);
    assert_eq!(matching.recv(0).unwrap(), "FLUB");
    assert_eq!(wildcard.recv(0).unwrap(), "FLUB");
    assert_eq!(other.recv(0).unwrap_err().kind(), ErrorKind::Timeout);
    assert_eq!(unsubscribed.recv(0).unwrap_err().kind(), ErrorKind::Timeout);

    assert_eq!(publisher.recv(0).unwrap_err().kind(), ErrorKind::NotSupported);
    assert_eq!(matching.send("x", 0).unwrap_err().kind(), ErrorKind::NotSupported);
}

#[test]
fn test_reqrep_round_trip() {
    let rep = open(Protocol::Rep);
    rep.bind("inproc://patterns-reqrep").unwrap();
    let req = open(Protocol::Req);
    req.connect("inproc://patterns-reqrep").unwrap();

    assert_eq!(rep.send("early", 0).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(req.recv(0).unwrap_err().kind(), ErrorKind::InvalidState);

    req.send("ping", 0).unwrap();
    assert_eq!(req.send("again", 0).unwrap_err().kind(), ErrorKind::InvalidState);

    assert_eq!(rep.recv(0).unwrap(), "ping");
    rep.send("pong", 0).unwrap();
    assert_eq!(req.recv(0).unwrap(), "pong");

    // Alternation starts over.
    req.send("ping 2", 0).unwrap();
    assert_eq!(rep.recv(0).unwrap(), "ping 2");
    rep.send("pong 2", 0).unwrap();
    assert_eq!(req.recv(0).unwrap(), "pong 2");
}

#[test]
fn test_request_held_until_peer_appears() {
    let req = open(Protocol::Req);
    req.connect("inproc://patterns-late-rep").unwrap();
    req.send("hello?", 0).unwrap();

    let rep = open(Protocol::Rep);
    rep.bind("inproc://patterns-late-rep").unwrap();
    assert_eq!(rep.recv(0).unwrap(), "hello?");
    rep.send("hi", 0).unwrap();
    assert_eq!(req.recv(0).unwrap(), "hi");
}

#[test]
fn test_request_resent_after_interval() {
    let rep = open(Protocol::Rep);
    rep.bind("inproc://patterns-resend").unwrap();
    let req = open(Protocol::Req);
    req.set_option(REQ, REQ_RESEND_IVL, 100).unwrap();
    req.connect("inproc://patterns-resend").unwrap();

    req.send("job", 0).unwrap();
    thread::scope(|s| {
        let waiter = s.spawn(|| req.recv(0));

        assert_eq!(rep.recv(0).unwrap(), "job");
        // Not answered: the request comes again.
        assert_eq!(rep.recv(0).unwrap(), "job");
        rep.send("done", 0).unwrap();

        assert_eq!(waiter.join().unwrap().unwrap(), "done");
    });
}

#[test]
fn test_request_resent_while_polling_nonblocking() {
    let rep = open(Protocol::Rep);
    rep.set_option(SOL_SOCKET, RCVTIMEO, 500).unwrap();
    rep.bind("inproc://patterns-resend-dontwait").unwrap();
    let req = open(Protocol::Req);
    req.set_option(REQ, REQ_RESEND_IVL, 50).unwrap();
    req.connect("inproc://patterns-resend-dontwait").unwrap();

    req.send("job", 0).unwrap();
    assert_eq!(rep.recv(0).unwrap(), "job");

    let until = Instant::now() + Duration::from_millis(300);
    while Instant::now() < until {
        assert_eq!(req.recv(DONTWAIT).unwrap_err().kind(), ErrorKind::TryAgain);
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(rep.recv(0).unwrap(), "job");
}

#[test]
fn test_direct_request_within_ttl_of_one() {
    let rep = open(Protocol::Rep);
    rep.set_option(SOL_SOCKET, MAXTTL, 1).unwrap();
    rep.bind("inproc://patterns-ttl-one").unwrap();
    let req = open(Protocol::Req);
    req.connect("inproc://patterns-ttl-one").unwrap();

    req.send("direct", 0).unwrap();
    assert_eq!(rep.recv(0).unwrap(), "direct");
    rep.send("back", 0).unwrap();
    assert_eq!(req.recv(0).unwrap(), "back");
}

#[test]
fn test_pipeline_round_robin() {
    let push = open(Protocol::Push);
    push.bind("inproc://patterns-pipeline").unwrap();
    let first = open(Protocol::Pull);
    let second = open(Protocol::Pull);
    first.connect("inproc://patterns-pipeline").unwrap();
    second.connect("inproc://patterns-pipeline").unwrap();

    for i in 0..4u8 {
        push.send(vec![i], 0).unwrap();
    }
    let a: Vec<u8> = (0..2).map(|_| first.recv(0).unwrap()[0]).collect();
    let b: Vec<u8> = (0..2).map(|_| second.recv(0).unwrap()[0]).collect();
    assert_eq!(a, vec![0, 2]);
    assert_eq!(b, vec![1, 3]);

    assert_eq!(push.recv(0).unwrap_err().kind(), ErrorKind::NotSupported);
    assert_eq!(first.send("x", 0).unwrap_err().kind(), ErrorKind::NotSupported);
}

#[test]
fn test_push_blocks_without_peer() {
    let push = open(Protocol::Push);
    push.bind("inproc://patterns-push-alone").unwrap();
    assert_eq!(push.send("x", DONTWAIT).unwrap_err().kind(), ErrorKind::TryAgain);

    push.set_option(SOL_SOCKET, nanosp_core::symbols::SNDTIMEO, 50).unwrap();
    let started = Instant::now();
    assert_eq!(push.send("x", 0).unwrap_err().kind(), ErrorKind::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[test]
fn test_bus_reaches_direct_peers_only() {
    let hub = open(Protocol::Bus);
    hub.bind("inproc://patterns-bus").unwrap();
    let left = open(Protocol::Bus);
    let right = open(Protocol::Bus);
    left.connect("inproc://patterns-bus").unwrap();
    right.connect("inproc://patterns-bus").unwrap();

    hub.send("from hub", 0).unwrap();
    assert_eq!(left.recv(0).unwrap(), "from hub");
    assert_eq!(right.recv(0).unwrap(), "from hub");

    left.send("from left", 0).unwrap();
    assert_eq!(hub.recv(0).unwrap(), "from left");
    right.set_option(SOL_SOCKET, RCVTIMEO, 100).unwrap();
    assert_eq!(right.recv(0).unwrap_err().kind(), ErrorKind::Timeout);
}

#[test]
fn test_pair_exchange_and_empty_message() {
    let a = open(Protocol::Pair);
    a.bind("inproc://patterns-pair").unwrap();
    let b = open(Protocol::Pair);
    b.connect("inproc://patterns-pair").unwrap();

    a.send("to b", 0).unwrap();
    assert_eq!(b.recv(0).unwrap(), "to b");
    b.send("to a", 0).unwrap();
    assert_eq!(a.recv(0).unwrap(), "to a");

    assert_eq!(a.send(Vec::<u8>::new(), 0).unwrap(), 0);
    assert!(b.recv(0).unwrap().is_empty());
}

#[test]
fn test_nonblocking_recv_on_empty_socket() {
    let pull = open(Protocol::Pull);
    let started = Instant::now();
    assert_eq!(pull.recv(DONTWAIT).unwrap_err().kind(), ErrorKind::TryAgain);
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[test]
fn test_survey_collects_until_deadline() {
    let surveyor = open(Protocol::Surveyor);
    surveyor.set_option(SURVEYOR, SURVEYOR_DEADLINE, 200).unwrap();
    surveyor.bind("inproc://patterns-survey").unwrap();
    let respondent = open(Protocol::Respondent);
    respondent.connect("inproc://patterns-survey").unwrap();

    assert_eq!(surveyor.recv(0).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(respondent.send("x", 0).unwrap_err().kind(), ErrorKind::InvalidState);

    surveyor.send("lunch?", 0).unwrap();
    assert_eq!(respondent.recv(0).unwrap(), "lunch?");
    respondent.send("yes", 0).unwrap();
    assert_eq!(surveyor.recv(0).unwrap(), "yes");

    assert_eq!(surveyor.recv(0).unwrap_err().kind(), ErrorKind::Timeout);
    // The survey is over.
    assert_eq!(surveyor.recv(0).unwrap_err().kind(), ErrorKind::InvalidState);
}

#[test]
fn test_survey_without_respondents_times_out() {
    let surveyor = open(Protocol::Surveyor);
    surveyor.set_option(SURVEYOR, SURVEYOR_DEADLINE, 100).unwrap();
    surveyor.send("anyone?", 0).unwrap();

    let started = Instant::now();
    assert_eq!(surveyor.recv(0).unwrap_err().kind(), ErrorKind::Timeout);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(80), "{waited:?}");
    assert!(waited < Duration::from_millis(1000), "{waited:?}");
}

#[test]
fn test_raw_rep_exposes_backtrace() {
    let rep = Socket::open(Domain::SpRaw, Protocol::Rep).unwrap();
    rep.set_option(SOL_SOCKET, RCVTIMEO, 2000).unwrap();
    rep.bind("inproc://patterns-raw-rep").unwrap();
    let req = open(Protocol::Req);
    req.connect("inproc://patterns-raw-rep").unwrap();

    req.send("q", 0).unwrap();
    let request = rep.recv_msg(0).unwrap();
    let header = request.sp_header().unwrap().clone();
    // One hop plus the request id.
    assert_eq!(header.len(), 8);
    assert_eq!(header[4] & 0x80, 0x80);

    rep.send_msg(Message::new("a").with_ancillary(
        nanosp_core::message::Ancillary::sp_header(header),
    ), 0)
    .unwrap();
    assert_eq!(req.recv(0).unwrap(), "a");
}

#[test]
fn test_message_statistics() {
    let a = open(Protocol::Pair);
    a.bind("inproc://patterns-stats").unwrap();
    let b = open(Protocol::Pair);
    b.connect("inproc://patterns-stats").unwrap();

    a.send("12345", 0).unwrap();
    b.recv(0).unwrap();

    assert_eq!(a.get_statistic(Statistic::MessagesSent), 1);
    assert_eq!(a.get_statistic(Statistic::BytesSent), 5);
    assert_eq!(b.get_statistic(Statistic::MessagesReceived), 1);
    assert_eq!(b.get_statistic(Statistic::BytesReceived), 5);
    assert_eq!(a.get_statistic(Statistic::AcceptedConnections), 1);
    assert_eq!(b.get_statistic(Statistic::EstablishedConnections), 1);
}

#[test]
fn test_close_wakes_blocked_recv() {
    let pull = open(Protocol::Pull);
    pull.set_option(SOL_SOCKET, RCVTIMEO, -1).unwrap();
    thread::scope(|s| {
        let waiter = s.spawn(|| pull.recv(0));
        thread::sleep(Duration::from_millis(50));
        pull.close().unwrap();
        assert_eq!(waiter.join().unwrap().unwrap_err().kind(), ErrorKind::Closed);
    });
}
