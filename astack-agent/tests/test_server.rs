mod common;

use std::io::{self, BufWriter, Read};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use astack_agent::domain::EnvHandle;
use astack_agent::dump::write_dump;
use astack_agent::sampling::Sampler;
use astack_agent::server::DumpServer;
use astack_common::{parse_dump, FrameLine, ThreadStatus};
use common::{leaked_buffer, FakeVm, InlineSender, ENV_DEEP, ENV_PARKED, ENV_SLEEPER, PARKED, RUNNABLE, SLEEPING};

fn fetch(addr: SocketAddr) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).expect("connect to listener");
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        let mut text = String::new();
        stream.read_to_string(&mut text).expect("read until the server closes");
        text
    })
}

#[test]
fn test_dump_over_tcp() {
    let buffer = leaked_buffer();
    let sender = InlineSender::new(buffer);
    let sampler = Sampler::new(buffer, &sender, Duration::from_millis(50));
    let vm = FakeVm::new();

    let main = vm.add_thread("main", false, SLEEPING);
    let pool = vm.add_thread("pool-1-thread-1", true, PARKED);
    let _untracked = vm.add_thread("Attach Listener", true, RUNNABLE);
    sampler.on_thread_start(&vm, &main, EnvHandle(ENV_SLEEPER));
    sampler.on_thread_start(&vm, &pool, EnvHandle(ENV_PARKED));

    let server = DumpServer::bind(0).expect("bind an ephemeral port");
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, server.local_addr().unwrap().port()));

    let client = fetch(addr);
    server
        .serve_one(&mut |out: &mut BufWriter<TcpStream>| write_dump(&vm, &sampler, out).map(drop))
        .expect("serve one dump");
    let text = client.join().unwrap();

    assert!(text.ends_with("\n\n"), "dump must end with a blank separator line");

    let records = parse_dump(&text);
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["main", "pool-1-thread-1"]);

    assert_eq!(records[0].status, ThreadStatus::Sleeping);
    assert_eq!(records[0].frames[1].line, FrameLine::Line(4));
    assert_eq!(records[0].frames[1].source_file.as_deref(), Some("Sleeper.java"));
    assert!(records[1].daemon);
    assert_eq!(records[1].frames[0].line, FrameLine::Native);
}

#[test]
fn test_every_connection_gets_a_fresh_dump() {
    let buffer = leaked_buffer();
    let sender = InlineSender::new(buffer);
    let sampler = Sampler::new(buffer, &sender, Duration::from_millis(50));
    let vm = FakeVm::new();

    let main = vm.add_thread("main", false, SLEEPING);
    sampler.on_thread_start(&vm, &main, EnvHandle(ENV_SLEEPER));

    let server = DumpServer::bind(0).unwrap();
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, server.local_addr().unwrap().port()));
    let mut handler = |out: &mut BufWriter<TcpStream>| write_dump(&vm, &sampler, out).map(drop);

    let first = fetch(addr);
    server.serve_one(&mut handler).unwrap();
    assert_eq!(parse_dump(&first.join().unwrap()).len(), 1);

    // A thread that started in between shows up in the next dump
    let late = vm.add_thread("late", false, SLEEPING);
    sampler.on_thread_start(&vm, &late, EnvHandle(ENV_SLEEPER));

    let second = fetch(addr);
    server.serve_one(&mut handler).unwrap();
    assert_eq!(parse_dump(&second.join().unwrap()).len(), 2);
}

#[test]
fn test_stalled_client_does_not_block_the_listener() {
    const THREADS: usize = 2000;

    let buffer = leaked_buffer();
    let sender = InlineSender::new(buffer);
    let sampler = Sampler::new(buffer, &sender, Duration::from_millis(50));
    let vm = FakeVm::new();

    // Deep stacks make the dump far larger than the socket buffers
    for i in 0..THREADS {
        let thread = vm.add_thread(&format!("recursive-{i}"), false, RUNNABLE);
        sampler.on_thread_start(&vm, &thread, EnvHandle(ENV_DEEP));
    }

    let server = DumpServer::bind(0).unwrap().with_write_timeout(Duration::from_millis(250));
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, server.local_addr().unwrap().port()));
    let mut handler = |out: &mut BufWriter<TcpStream>| write_dump(&vm, &sampler, out).map(drop);

    let silent = TcpStream::connect(addr).unwrap();
    let start = Instant::now();
    let err = server.serve_one(&mut handler).unwrap_err();
    println!("Stalled client abandoned after {:?}: {err}", start.elapsed());
    assert!(
        matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut),
        "unexpected error: {err}"
    );
    assert!(start.elapsed() < Duration::from_secs(10));
    drop(silent);

    // The next client gets a complete dump
    let reader = fetch(addr);
    server.serve_one(&mut handler).unwrap();
    assert_eq!(parse_dump(&reader.join().unwrap()).len(), THREADS);
}
