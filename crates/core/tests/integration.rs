//! Integration test: publisher handshake OPTIONS → ANNOUNCE → SETUP → GET_PARAMETER.
//!
//! Starts the server on an ephemeral loopback port, connects with a TCP
//! client, and verifies each response.

use std::io::{BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use rtsp_signal::Server;
use rtsp_signal::protocol::{Method, RtspRequest, RtspResponse, StatusCode};

fn exchange(stream: &mut TcpStream, request: &RtspRequest) -> rtsp_signal::Result<RtspResponse> {
    stream.write_all(&request.serialize())?;
    stream.flush()?;
    RtspResponse::read_from(&mut BufReader::new(&*stream))
}

fn connect(server: &Server) -> TcpStream {
    let addr = server.local_addr().expect("server bound");
    let stream =
        TcpStream::connect_timeout(&addr, Duration::from_secs(2)).expect("connect to server");
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    stream
        .set_write_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    stream
}

const SDP: &str = "v=0\r\n\
o=- 0 0 IN IP4 127.0.0.1\r\n\
s=Integration\r\n\
c=IN IP4 127.0.0.1\r\n\
t=0 0\r\n\
m=video 0 RTP/AVP 96\r\n\
a=rtpmap:96 H264/90000\r\n\
a=control:trackID=1\r\n";

#[test]
fn publisher_handshake() {
    let mut server = Server::new("127.0.0.1:0");
    server.start().expect("server start");
    let mut stream = connect(&server);
    let base_uri = format!("rtsp://{}/live/cam", server.local_addr().unwrap());

    // OPTIONS
    let resp = exchange(&mut stream, &RtspRequest::new(Method::Options, &base_uri, "1"))
        .expect("OPTIONS response");
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.headers[0].0, "CSeq");
    assert_eq!(resp.headers[1].0, "Date");
    assert_eq!(resp.get_header("CSeq"), Some("1"));
    assert_eq!(
        resp.get_header("Public"),
        Some("OPTIONS,ANNOUNCE,DESCRIBE,SETUP,TEARDOWN,PLAY,PAUSE,RECORD,REDIRECT,GET_PARAMETER,SET_PARAMETER")
    );
    assert!(resp.get_header("Server").unwrap().starts_with("rtsp-signal "));

    // ANNOUNCE
    let announce = RtspRequest::new(Method::Announce, &base_uri, "2")
        .with_header("Content-Type", "application/sdp")
        .with_body(SDP);
    let resp = exchange(&mut stream, &announce).expect("ANNOUNCE response");
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.get_header("CSeq"), Some("2"));

    // SETUP on a track the description does not contain
    let setup = RtspRequest::new(Method::Setup, &format!("{base_uri}/trackID=5"), "3")
        .with_header("Transport", "RTP/AVP;unicast;client_port=5000-5001");
    let resp = exchange(&mut stream, &setup).expect("SETUP response");
    assert_eq!(resp.status, StatusCode::STREAM_NOT_FOUND);

    // SETUP on the announced track
    let setup = RtspRequest::new(Method::Setup, &format!("{base_uri}/trackID=1"), "4")
        .with_header("Transport", "RTP/AVP;unicast;client_port=5000-5001");
    let resp = exchange(&mut stream, &setup).expect("SETUP response");
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.get_header("CSeq"), Some("4"));
    let session_id = resp.get_header("Session").expect("Session header").to_string();
    assert_eq!(session_id.len(), 8);
    assert!(server.registry().contains(&session_id));

    // GET_PARAMETER keepalive on that session
    let keepalive = RtspRequest::new(Method::GetParameter, &base_uri, "5")
        .with_header("Session", &session_id);
    let resp = exchange(&mut stream, &keepalive).expect("GET_PARAMETER response");
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.get_header("Session"), Some(session_id.as_str()));

    // Closing the connection releases the session.
    drop(stream);
    let mut released = false;
    for _ in 0..40 {
        if !server.registry().contains(&session_id) {
            released = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(released, "session {session_id} still registered");

    server.stop();
}

#[test]
fn unknown_session_and_interleaved_transport_are_rejected() {
    let mut server = Server::new("127.0.0.1:0");
    server.start().expect("server start");
    let mut stream = connect(&server);
    let base_uri = format!("rtsp://{}/live", server.local_addr().unwrap());
    let track_uri = format!("{base_uri}/trackID=1");

    let setup = RtspRequest::new(Method::Setup, &track_uri, "1").with_header("Session", "00000000");
    let resp = exchange(&mut stream, &setup).expect("SETUP response");
    assert_eq!(resp.status, StatusCode::SESSION_NOT_FOUND);
    assert_eq!(resp.get_header("CSeq"), Some("1"));
    assert!(server.registry().is_empty());

    let setup = RtspRequest::new(Method::Setup, &track_uri, "2")
        .with_header("Transport", "RTP/AVP/TCP;unicast;interleaved=0-1");
    let resp = exchange(&mut stream, &setup).expect("SETUP response");
    assert_eq!(resp.status, StatusCode::UNSUPPORTED_TRANSPORT);

    // No handler for PLAY: nothing comes back, the next request still works.
    stream
        .write_all(&RtspRequest::new(Method::Play, &base_uri, "3").serialize())
        .unwrap();
    std::thread::sleep(Duration::from_millis(100));
    let resp = exchange(&mut stream, &RtspRequest::new(Method::Options, &base_uri, "4"))
        .expect("OPTIONS response");
    assert_eq!(resp.get_header("CSeq"), Some("4"));

    server.stop();
}
