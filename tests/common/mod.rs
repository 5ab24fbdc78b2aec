// Shared test helpers: a scripted gpsd on a loopback port

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BANNER: &str =
    r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#;

pub const ONE_DEVICE: &str = r#"{"class":"DEVICES","devices":[{"class":"DEVICE","path":"/dev/ttyUSB0","driver":"u-blox","bps":9600,"activated":"2024-01-01T00:00:00.000Z","flags":1}]}"#;

pub const NO_DEVICES: &str = r#"{"class":"DEVICES","devices":[]}"#;

pub const NO_FIX_YET: &str = r#"{"class":"POLL","time":"2024-01-01T00:00:00.000Z","active":0,"tpv":[],"sky":[]}"#;

pub const FIX_3D: &str = r#"{"class":"POLL","time":"2024-01-01T00:00:00.000Z","active":1,"tpv":[{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2024-01-01T00:00:00.000Z","lat":45.0,"lon":-93.0,"alt":300.0,"track":10.0,"speed":1.2,"climb":0.1,"epx":2.0,"epy":3.0}],"sky":[{"class":"SKY","device":"/dev/ttyUSB0","satellites":[{"PRN":1,"used":true},{"PRN":2,"used":true},{"PRN":3,"used":false}]}]}"#;

/// A 2D fix whose latitude tells successive replies apart
pub fn fix_at(lat: f64) -> String {
    format!(
        r#"{{"class":"POLL","active":1,"tpv":[{{"class":"TPV","mode":2,"lat":{lat:?},"lon":0.0}}],"sky":[]}}"#
    )
}

pub const FIX_2D: &str = r#"{"class":"POLL","active":1,"tpv":[{"class":"TPV","mode":2,"lat":1.0,"lon":2.0,"time":"2024-01-01T00:00:00Z"}],"sky":[]}"#;

/// What the fake daemon answers
#[derive(Clone)]
pub struct Script {
    pub banner: String,
    pub devices: String,
    /// Replies to successive `?POLL;` requests; the last one repeats
    pub polls: Vec<String>,
    /// Holds back the reply to the daemon's first `?POLL;`
    pub first_poll_delay: Option<Duration>,
    /// Closes the connection right after confirming WATCH
    pub hang_up_after_watch: bool,
}

impl Script {
    pub fn new(polls: &[&str]) -> Self {
        Script {
            banner: BANNER.into(),
            devices: ONE_DEVICE.into(),
            polls: polls.iter().map(|p| p.to_string()).collect(),
            first_poll_delay: None,
            hang_up_after_watch: false,
        }
    }

    pub fn first_poll_delay(mut self, delay: Duration) -> Self {
        self.first_poll_delay = Some(delay);
        self
    }

    pub fn hang_up_after_watch(mut self) -> Self {
        self.hang_up_after_watch = true;
        self
    }

    pub fn banner(mut self, banner: &str) -> Self {
        self.banner = banner.into();
        self
    }

    pub fn devices(mut self, devices: &str) -> Self {
        self.devices = devices.into();
        self
    }
}

pub struct FakeGpsd {
    pub port: u16,
    connections: Arc<AtomicUsize>,
}

impl FakeGpsd {
    /// Serves `script` to every client until the test process exits
    pub fn spawn(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake gpsd");
        let port = listener.local_addr().expect("local addr").port();
        let connections = Arc::new(AtomicUsize::new(0));
        let polls = Arc::new(Mutex::new(script.polls.iter().cloned().collect::<VecDeque<_>>()));
        let polls_served = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                let script = script.clone();
                let polls = polls.clone();
                let polls_served = polls_served.clone();
                std::thread::spawn(move || serve(stream, &script, &polls, &polls_served));
            }
        });

        FakeGpsd { port, connections }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

fn serve(
    stream: TcpStream,
    script: &Script,
    polls: &Mutex<VecDeque<String>>,
    polls_served: &AtomicUsize,
) {
    let mut writer = stream.try_clone().expect("clone stream");
    let mut reader = BufReader::new(stream);

    if writeln!(writer, "{}", script.banner).is_err() {
        return;
    }

    let mut command = Vec::new();
    loop {
        command.clear();
        match reader.read_until(b';', &mut command) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = String::from_utf8_lossy(&command).trim().to_string();

        let reply = if command.starts_with("?WATCH") {
            let enable = !command.contains("\"enable\":false");
            let reply = format!(
                "{}\n{{\"class\":\"WATCH\",\"enable\":{}}}",
                script.devices, enable
            );
            if script.hang_up_after_watch {
                let _ = writeln!(writer, "{}", reply);
                return;
            }
            reply
        } else if command.starts_with("?DEVICES") {
            script.devices.clone()
        } else if command.starts_with("?POLL") {
            let reply = {
                let mut queue = polls.lock().expect("poll queue");
                if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                }
            };
            if polls_served.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(delay) = script.first_poll_delay {
                    std::thread::sleep(delay);
                }
            }
            reply
        } else {
            r#"{"class":"ERROR","message":"Unrecognized request"}"#.to_string()
        };

        if writeln!(writer, "{}", reply).is_err() {
            return;
        }
    }
}

/// Port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr").port()
}

/// Accepts connections and never says anything
pub fn silent_listener() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    std::thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            held.push(stream);
        }
    });
    port
}
