//! S1: a single accepted connection echoes back exactly what it reads.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;

use blocktcp::Listener;

#[test]
fn echo_roundtrip() {
    let _ = env_logger::try_init();
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        let n = conn.read(&mut buf).unwrap();
        conn.write_all(&buf[..n]).unwrap();
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"hello").unwrap();

    let mut reply = [0u8; 5];
    client.read_exact(&mut reply).unwrap();
    assert_eq!(&reply, b"hello");

    server.join().unwrap();
}

#[test]
fn multiple_writes_arrive_concatenated_in_order() {
    let _ = env_logger::try_init();
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        while received.len() < 14 {
            let n = conn.read(&mut buf).unwrap();
            assert_ne!(n, 0, "peer closed before sending all bytes");
            received.extend_from_slice(&buf[..n]);
        }
        received
    });

    let mut client = TcpStream::connect(addr).unwrap();
    for chunk in [b"one".as_slice(), b"two2".as_slice(), b"three3.".as_slice()] {
        client.write_all(chunk).unwrap();
    }
    drop(client);

    let received = server.join().unwrap();
    assert_eq!(received, b"onetwo2three3.".to_vec());
}
