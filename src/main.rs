//! fair_buffer daemon
//!
//! Pulls frames off one or more NFQUEUE queues, buffers them per peer and
//! releases them back to the kernel in fair order. Admin commands are
//! read from stdin, one per line:
//!
//! - `read <handler>` / `write <handler> <value>`
//! - `admit <addr>` / `release <addr>`
//! - `quit` flushes every queue and exits

mod nfq_message;

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use nfq::{Queue, Verdict};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fair_buffer::admin::{read_handler, write_handler};
use fair_buffer::config::{DEFAULT_CAPACITY, DEFAULT_QUANTUM, DEFAULT_SLEEPINESS_TRIGGER};
use fair_buffer::{
    CreditPolicy, FairBuffer, FairBufferOptions, FrameFormat, PacketContext, PeerAddr, Qdisc,
    SleepPolicy, UnknownPeerPolicy,
};

use crate::nfq_message::NfqMessage as Message;

const BATCH_LIMIT: usize = 10000;
const KERNEL_QUEUE_MAX_LEN: u32 = 10000;

#[derive(Parser, Debug)]
#[command(name = "fair_buffer", about = "Per-peer fair packet buffer on NFQUEUE")]
struct Cli {
    /// NFQUEUE numbers to bind (repeatable).
    #[arg(long = "queue", default_values_t = vec![0u16])]
    queues: Vec<u16>,

    /// Packet capacity of each peer queue.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// DRR quantum in bytes.
    #[arg(long, default_value_t = DEFAULT_QUANTUM)]
    quantum: u64,

    /// Unproductive pulls before the buffer reports itself empty.
    #[arg(long, default_value_t = DEFAULT_SLEEPINESS_TRIGGER)]
    sleepiness: u32,

    /// Link-layer header the payload starts with (wifi or ether).
    #[arg(long, default_value = "wifi")]
    frame: FrameFormat,

    /// Admit peers on their first packet instead of dropping it.
    #[arg(long, default_value_t = false)]
    auto_admit: bool,

    /// Credit a peer once per round instead of on every visit.
    #[arg(long, default_value_t = false)]
    per_round: bool,

    /// Peers to admit at startup (repeatable).
    #[arg(long = "peer")]
    peers: Vec<PeerAddr>,

    /// Seconds between queue reports on stdout, 0 disables.
    #[arg(long, default_value_t = 0)]
    report_interval: u64,
}

impl Cli {
    fn options(&self) -> FairBufferOptions {
        FairBufferOptions::default()
            .capacity(self.capacity)
            .quantum(self.quantum)
            .sleepiness_trigger(self.sleepiness)
            .frame_format(self.frame)
            // the drain loop stops on "empty", so it must not come early
            .sleep(SleepPolicy::WhenIdle)
            .unknown_peer(if self.auto_admit {
                UnknownPeerPolicy::Admit
            } else {
                UnknownPeerPolicy::Drop
            })
            .credit(if self.per_round {
                CreditPolicy::PerRound
            } else {
                CreditPolicy::PerVisit
            })
    }
}

enum Command {
    Read(String),
    Write(String, String),
    Admit(PeerAddr),
    Release(PeerAddr),
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or("empty command")?;
        if verb == "quit" {
            return Ok(Command::Quit);
        }
        let arg = words.next().ok_or_else(|| format!("{verb}: missing argument"))?;

        match verb {
            "read" => Ok(Command::Read(arg.to_string())),
            "write" => {
                let value: Vec<&str> = words.collect();
                Ok(Command::Write(arg.to_string(), value.join(" ")))
            }
            "admit" => arg.parse().map(Command::Admit).map_err(|e| e.to_string()),
            "release" => arg.parse().map(Command::Release).map_err(|e| e.to_string()),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

fn make_queue(queue_num: u16) -> Result<Queue, std::io::Error> {
    let mut q = Queue::open()?;
    q.bind(queue_num)?;
    q.set_copy_range(queue_num, 0xFFFF)?;
    q.set_queue_max_len(queue_num, KERNEL_QUEUE_MAX_LEN)?;
    q.set_nonblocking(true);
    Ok(q)
}

// stdin is blocking, so it gets its own thread; commands are applied
// by the main loop between scheduling steps
fn spawn_admin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Returns false once the operator asked to quit.
fn apply_command(buffer: &mut FairBuffer<Message, PeerAddr>, line: &str) -> bool {
    let mut keep_running = true;
    let result = Command::parse(line).and_then(|cmd| match cmd {
        Command::Read(name) => read_handler(buffer, &name).map_err(|e| e.to_string()),
        Command::Write(name, value) => write_handler(buffer, &name, &value)
            .map(|()| "ok\n".to_string())
            .map_err(|e| e.to_string()),
        Command::Admit(peer) => {
            buffer.admit(peer);
            Ok("ok\n".to_string())
        }
        Command::Release(peer) => match buffer.release(&peer) {
            true => Ok("ok\n".to_string()),
            false => Err(format!("no queue for {peer}")),
        },
        Command::Quit => {
            keep_running = false;
            Ok("bye\n".to_string())
        }
    });

    match result {
        Ok(reply) => print!("{reply}"),
        Err(e) => println!("error: {e}"),
    }
    keep_running
}

fn report(buffer: &FairBuffer<Message, PeerAddr>) {
    let now_str = Local::now().format("%H:%M:%S").to_string();
    println!("\n[{}] fair buffer", now_str);
    println!("------------------------------------------------------------");
    println!(
        "drops {} ({} bytes) | malformed {} | unknown peer {} | backlog {}",
        buffer.drops(),
        buffer.byte_drops(),
        buffer.malformed_drops(),
        buffer.unknown_peer_drops(),
        buffer.backlog()
    );
    println!(
        "{:<18} | {:<10} | {:<10} | {:<10}",
        "Peer", "Capacity", "Packets", "Bytes"
    );
    for info in buffer.list() {
        println!(
            "{:<18} | {:<10} | {:<10} | {:<10}",
            info.peer.to_string(),
            info.capacity,
            info.packets,
            info.bytes
        );
    }
    println!("============================================================");
}

fn finish(queues: &mut [Queue], ctx: PacketContext<Message, PeerAddr>, verdict: Verdict) {
    let Some(queue) = queues.get_mut(ctx.queue_num) else {
        return;
    };
    if let Err(e) = queue.verdict(ctx.msg.with_verdict(verdict)) {
        error!(queue = ctx.queue_num, "failed to issue verdict: {e}");
    }
}

// Drop verdicts for everything the buffer discarded on its own
fn flush_dropped(buffer: &mut FairBuffer<Message, PeerAddr>, queues: &mut [Queue]) -> bool {
    let flushed = buffer.collect_dropped();
    let any = !flushed.is_empty();
    for ctx in flushed {
        finish(queues, ctx, Verdict::Drop);
    }
    any
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut buffer: FairBuffer<Message, PeerAddr> = FairBuffer::new(cli.options());
    for peer in &cli.peers {
        buffer.admit(*peer);
    }

    let mut queues = cli
        .queues
        .iter()
        .map(|&n| make_queue(n).with_context(|| format!("failed to open NFQUEUE {n}")))
        .collect::<anyhow::Result<Vec<Queue>>>()?;

    info!(
        queues = ?cli.queues,
        capacity = cli.capacity,
        quantum = cli.quantum,
        frame = ?cli.frame,
        peers = cli.peers.len(),
        "fair_buffer starting"
    );

    let commands = spawn_admin_reader();
    let report_every = Duration::from_secs(cli.report_interval);
    let mut last_report = Instant::now();

    let mut running = true;
    while running {
        let mut working = false;

        let mut packet_count = 0;
        loop {
            if packet_count >= BATCH_LIMIT {
                break;
            }
            let mut no_packet = true;
            for i in 0..queues.len() {
                let Ok(msg) = queues[i].recv() else {
                    continue;
                };
                working = true;
                packet_count += 1;
                no_packet = false;

                if let Err(rejected) = buffer.push_raw(Message::from(msg), i) {
                    finish(&mut queues, rejected.into_packet(), Verdict::Drop);
                }
            }
            if no_packet {
                break;
            }
        }

        // a None from pull only means the cursor moved; keep going until
        // the buffer says it is empty
        let mut attempts = 0;
        while buffer.is_active() && attempts < BATCH_LIMIT {
            attempts += 1;
            if let Some(ctx) = buffer.dequeue() {
                working = true;
                finish(&mut queues, ctx, Verdict::Accept);
            }
        }

        if flush_dropped(&mut buffer, &mut queues) {
            working = true;
        }

        while let Ok(line) = commands.try_recv() {
            working = true;
            running &= apply_command(&mut buffer, &line);
        }

        if !report_every.is_zero() && last_report.elapsed() >= report_every {
            report(&buffer);
            last_report = Instant::now();
        }

        if !working {
            std::thread::sleep(Duration::from_micros(100));
        }
    }

    buffer.release_all();
    flush_dropped(&mut buffer, &mut queues);
    info!(
        drops = buffer.drops(),
        byte_drops = buffer.byte_drops(),
        "fair_buffer stopped"
    );
    Ok(())
}
