//! Invariant 1 (spec.md §8): for any sequence of writes on a single
//! connection, the peer receives the concatenation, byte-exact and in
//! order. Exercised here with randomly sized chunks over a real socket.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;

use blocktcp::Listener;
use rand::Rng;

#[test]
fn randomly_sized_writes_arrive_concatenated_in_order() {
    let _ = env_logger::try_init();

    let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr();

    let mut rng = rand::rng();
    let chunks: Vec<Vec<u8>> = (0..40)
        .map(|_| {
            let len = rng.random_range(1..=2048);
            (0..len).map(|_| rng.random::<u8>()).collect()
        })
        .collect();
    let expected: Vec<u8> = chunks.concat();
    let total_len = expected.len();

    let server_chunks = chunks.clone();
    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        for chunk in &server_chunks {
            conn.write_all(chunk).unwrap();
        }
    });

    let mut client = TcpStream::connect(addr).unwrap();
    let mut received = vec![0u8; total_len];
    client.read_exact(&mut received).unwrap();

    assert_eq!(received, expected);
    server.join().unwrap();
}
